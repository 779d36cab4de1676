//! Managed unit (pod) types

use crate::{Identity, ObjectMeta, IDENTITY_ENV};
use serde::{Deserialize, Serialize};

/// A managed worker unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

/// Pod specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// A single container in a pod
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,

    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Environment entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Pod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Identity carried by the first container's `id` entry.
    ///
    /// Returns `None` when the pod has no containers, no `id` entry, or a
    /// value that is not a decimal integer. When several `id` entries are
    /// present the last parseable one wins and the earlier values reserve
    /// nothing: a box holds exactly one identity, so an identity named only by
    /// a shadowed entry stays free for allocation.
    pub fn identity(&self) -> Option<Identity> {
        self.spec
            .containers
            .first()?
            .env
            .iter()
            .filter(|env| env.name == IDENTITY_ENV)
            .filter_map(|env| env.value.parse::<Identity>().ok())
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_with_env(env: Vec<EnvVar>) -> Pod {
        Pod {
            metadata: ObjectMeta::new("default", "p"),
            spec: PodSpec {
                containers: vec![Container {
                    name: "box".to_string(),
                    image: "alpine:latest".to_string(),
                    env,
                    ..Default::default()
                }],
            },
        }
    }

    #[test]
    fn test_identity_from_env() {
        let pod = pod_with_env(vec![EnvVar::new("other", "x"), EnvVar::new("id", "3")]);
        assert_eq!(pod.identity(), Some(Identity::new(3)));
    }

    #[test]
    fn test_identity_missing_or_invalid() {
        assert_eq!(pod_with_env(vec![]).identity(), None);
        assert_eq!(pod_with_env(vec![EnvVar::new("id", "three")]).identity(), None);

        let bare = Pod {
            metadata: ObjectMeta::new("default", "bare"),
            spec: PodSpec::default(),
        };
        assert_eq!(bare.identity(), None);
    }

    #[test]
    fn test_identity_only_reads_first_container() {
        let mut pod = pod_with_env(vec![]);
        pod.spec.containers.push(Container {
            name: "sidecar".to_string(),
            env: vec![EnvVar::new("id", "9")],
            ..Default::default()
        });
        assert_eq!(pod.identity(), None);
    }

    #[test]
    fn test_last_parseable_identity_wins() {
        let pod = pod_with_env(vec![
            EnvVar::new("id", "1"),
            EnvVar::new("id", "bad"),
            EnvVar::new("id", "5"),
        ]);
        assert_eq!(pod.identity(), Some(Identity::new(5)));
    }
}
