//! Unit factory
//!
//! The reconciler only decides *which* identities get a box. What a box looks
//! like is delegated to a `UnitFactory`.

use box_types::{
    unit_name, BoxController, Container, EnvVar, Identity, ObjectMeta, Pod, PodSpec,
    APP_LABEL_KEY, APP_LABEL_VALUE, IDENTITY_ENV, OWNER_LABEL_KEY,
};

/// Default container image for boxes
pub const DEFAULT_IMAGE: &str = "alpine:latest";

/// Builds the unit that will carry a given identity
pub trait UnitFactory: Send + Sync {
    /// Build the unit for `id`, owned by `owner`.
    ///
    /// The returned pod must carry the managed-box label and `id` in the
    /// first container's environment, or the next pass will not recognise it.
    fn build(&self, owner: &BoxController, id: Identity) -> Pod;
}

/// Factory for the conventional `box-<id>` pod
#[derive(Debug, Clone)]
pub struct BoxPodFactory {
    image: String,
    command: Vec<String>,
    args: Vec<String>,
}

impl Default for BoxPodFactory {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            command: vec!["/bin/sh".to_string(), "-c".to_string()],
            args: vec!["echo \"id=$id\" && sleep 3600".to_string()],
        }
    }
}

impl BoxPodFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_command(mut self, command: Vec<String>, args: Vec<String>) -> Self {
        self.command = command;
        self.args = args;
        self
    }
}

impl UnitFactory for BoxPodFactory {
    fn build(&self, owner: &BoxController, id: Identity) -> Pod {
        Pod {
            metadata: ObjectMeta::new(&owner.metadata.namespace, unit_name(id))
                .with_label(APP_LABEL_KEY, APP_LABEL_VALUE)
                .with_label(OWNER_LABEL_KEY, &owner.metadata.name),
            spec: PodSpec {
                containers: vec![Container {
                    name: APP_LABEL_VALUE.to_string(),
                    image: self.image.clone(),
                    command: self.command.clone(),
                    args: self.args.clone(),
                    env: vec![EnvVar::new(IDENTITY_ENV, id.to_string())],
                }],
            },
        }
    }
}
