//! Box Types - Resource schema for managed box populations
//!
//! A `BoxController` is the parent resource declaring how many boxes should
//! exist. Boxes are pods labelled `app=box`, each carrying a small integer
//! identity in the `id` environment entry of its first container.
//!
//! ## Key Concepts
//!
//! - **BoxController**: Parent resource with desired replicas and observed status
//! - **Pod**: A managed unit (one box)
//! - **Identity**: Integer identity carried by a box, unique among live boxes
//! - **Condition**: Informational status condition on the parent
//! - **ObjectKey**: Namespace/name addressing of a parent resource

#![deny(unsafe_code)]

pub mod boxcontroller;
pub mod condition;
pub mod error;
pub mod identity;
pub mod meta;
pub mod pod;

pub use boxcontroller::{BoxController, BoxControllerSpec, BoxControllerStatus, PodIdStatus};
pub use condition::{find_condition, set_condition, Condition, ConditionStatus};
pub use error::TypeError;
pub use identity::Identity;
pub use meta::{LabelSelector, ObjectKey, ObjectMeta};
pub use pod::{Container, EnvVar, Pod, PodSpec};

/// Label key marking a pod as a managed box
pub const APP_LABEL_KEY: &str = "app";

/// Label value marking a pod as a managed box
pub const APP_LABEL_VALUE: &str = "box";

/// Label recording which parent resource owns a box
pub const OWNER_LABEL_KEY: &str = "box.io/owner";

/// Environment entry carrying the box identity
pub const IDENTITY_ENV: &str = "id";

/// Prefix of deterministic box names (`box-<id>`)
pub const UNIT_NAME_PREFIX: &str = "box";

/// Selector matching every managed box
pub fn managed_selector() -> LabelSelector {
    LabelSelector::new().with(APP_LABEL_KEY, APP_LABEL_VALUE)
}

/// Deterministic name for the box holding `id`
pub fn unit_name(id: Identity) -> String {
    format!("{}-{}", UNIT_NAME_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_name_from_identity() {
        assert_eq!(unit_name(Identity::new(1)), "box-1");
        assert_eq!(unit_name(Identity::new(42)), "box-42");
    }

    #[test]
    fn test_managed_selector() {
        let selector = managed_selector();
        assert_eq!(selector.to_string(), "app=box");
    }
}
