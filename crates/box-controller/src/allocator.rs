//! Identity allocation
//!
//! Identities are re-derived from the live boxes on every pass. Nothing is
//! cached between passes, so a box removed out-of-band simply frees its
//! identity the next time the allocator runs.

use box_types::{Identity, Pod};
use std::collections::{BTreeMap, BTreeSet};

/// Identity bookkeeping for one snapshot of live boxes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Identities carried by live boxes, including any outside `[1, desired]`
    pub used: BTreeSet<Identity>,

    /// Box name to identity, for identified boxes only
    pub assignments: BTreeMap<String, Identity>,

    /// Identities in `[1, desired]` not carried by any live box, ascending
    pub free: Vec<Identity>,

    /// Names of live boxes without a parseable identity, sorted
    pub unidentified: Vec<String>,
}

impl Allocation {
    pub fn identified_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn has_unidentified(&self) -> bool {
        !self.unidentified.is_empty()
    }
}

/// Compute used and free identities for a snapshot of live boxes
pub fn allocate(live: &[Pod], desired: u32) -> Allocation {
    let mut allocation = Allocation::default();

    for pod in live {
        match pod.identity() {
            Some(id) => {
                allocation.used.insert(id);
                allocation.assignments.insert(pod.name().to_string(), id);
            }
            None => {
                tracing::trace!(pod = %pod.name(), "Box carries no identity");
                allocation.unidentified.push(pod.name().to_string());
            }
        }
    }
    allocation.unidentified.sort();

    allocation.free = Identity::range(desired)
        .filter(|id| !allocation.used.contains(id))
        .collect();

    allocation
}
