//! Cluster collaborator
//!
//! The controller never owns state: it reads and mutates parents and units
//! through these traits. `InMemoryCluster` is the reference backend.

mod memory;
mod traits;

pub use memory::{InMemoryCluster, WatchEvent};
pub use traits::{Cluster, ParentStore, UnitStore};
