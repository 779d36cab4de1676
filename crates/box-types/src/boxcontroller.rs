//! BoxController parent resource
//!
//! One BoxController declares a population of boxes in its namespace. The
//! spec carries the desired replica count; the status is written back by the
//! controller after every pass and is advisory only.

use crate::{Condition, Identity, ObjectKey, ObjectMeta};
use serde::{Deserialize, Serialize};

/// Parent resource for a managed box population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxController {
    pub metadata: ObjectMeta,

    pub spec: BoxControllerSpec,

    #[serde(default)]
    pub status: BoxControllerStatus,
}

/// Desired state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxControllerSpec {
    /// Desired number of boxes
    pub replicas: u32,
}

/// Observed state, as of the last reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxControllerStatus {
    /// Identified live boxes and their identities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pods: Vec<PodIdStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<u64>,
}

/// One observed box
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodIdStatus {
    pub name: String,
    pub id: Identity,
}

impl BoxController {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, replicas: u32) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: BoxControllerSpec { replicas },
            status: BoxControllerStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn replicas(&self) -> u32 {
        self.spec.replicas
    }
}
