//! Box (pod) inspection handlers

use super::validate_name;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use box_types::{Identity, Pod, OWNER_LABEL_KEY};
use serde::Serialize;

/// Condensed view of one box
#[derive(Debug, Serialize)]
pub struct PodView {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&Pod> for PodView {
    fn from(pod: &Pod) -> Self {
        Self {
            name: pod.name().to_string(),
            namespace: pod.namespace().to_string(),
            id: pod.identity(),
            owner: pod.metadata.labels.get(OWNER_LABEL_KEY).cloned(),
            image: pod.spec.containers.first().map(|c| c.image.clone()),
        }
    }
}

/// List every pod in a namespace, managed or not
pub async fn list_pods(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<PodView>>> {
    validate_name("namespace", &namespace)?;

    let pods = state.cluster.units_in(&namespace).await;
    Ok(Json(pods.iter().map(PodView::from).collect()))
}
