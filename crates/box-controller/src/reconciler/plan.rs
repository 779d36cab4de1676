//! Desired-vs-actual diff
//!
//! Scale-up hands out the smallest free identities first, which keeps the
//! live identity set packed towards `1`. Scale-down removes the largest
//! identities first, so the longest-lived boxes survive.

use crate::allocator::Allocation;
use box_types::Identity;
use serde::{Deserialize, Serialize};

/// What to do with live boxes that carry no identity when scaling down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnidentifiedPolicy {
    /// Remove unidentified boxes before any identified box
    #[default]
    RemoveFirst,

    /// Never target unidentified boxes; they keep occupying a slot until
    /// something else clears them
    Ignore,
}

/// Create/remove decisions for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Identities to create boxes for, ascending
    pub create: Vec<Identity>,

    /// Names of boxes to remove, in removal order
    pub remove: Vec<String>,

    /// Missing boxes that cannot be created because no identity is free
    pub shortfall: usize,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.remove.is_empty()
    }
}

/// Decide which boxes to create and which to remove.
///
/// `live` is the raw number of live boxes, identified or not.
pub fn diff(live: usize, desired: u32, allocation: &Allocation, policy: UnidentifiedPolicy) -> Plan {
    let desired = desired as usize;
    let mut plan = Plan::default();

    if live < desired {
        let need = desired - live;
        plan.create = allocation.free.iter().copied().take(need).collect();
        plan.shortfall = need - plan.create.len();
    } else if live > desired {
        let excess = live - desired;

        let mut identified: Vec<(&String, Identity)> = allocation
            .assignments
            .iter()
            .map(|(name, id)| (name, *id))
            .collect();
        identified.sort_by(|(a_name, a_id), (b_name, b_id)| {
            b_id.cmp(a_id).then_with(|| a_name.cmp(b_name))
        });

        let unidentified: &[String] = match policy {
            UnidentifiedPolicy::RemoveFirst => &allocation.unidentified,
            UnidentifiedPolicy::Ignore => &[],
        };

        plan.remove = unidentified
            .iter()
            .chain(identified.into_iter().map(|(name, _)| name))
            .take(excess)
            .cloned()
            .collect();
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn allocation(assigned: &[(&str, i64)], unidentified: &[&str], desired: u32) -> Allocation {
        let assignments: BTreeMap<String, Identity> = assigned
            .iter()
            .map(|(n, id)| (n.to_string(), Identity::new(*id)))
            .collect();
        let used: BTreeSet<Identity> = assignments.values().copied().collect();
        let free = Identity::range(desired).filter(|id| !used.contains(id)).collect();
        Allocation {
            used,
            assignments,
            free,
            unidentified: unidentified.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(values: &[i64]) -> Vec<Identity> {
        values.iter().copied().map(Identity::new).collect()
    }

    #[test]
    fn test_scale_up_from_empty() {
        let alloc = allocation(&[], &[], 3);
        let plan = diff(0, 3, &alloc, UnidentifiedPolicy::default());
        assert_eq!(plan.create, ids(&[1, 2, 3]));
        assert!(plan.remove.is_empty());
        assert_eq!(plan.shortfall, 0);
    }

    #[test]
    fn test_scale_up_fills_gap() {
        let alloc = allocation(&[("box-1", 1), ("box-3", 3)], &[], 3);
        let plan = diff(2, 3, &alloc, UnidentifiedPolicy::default());
        assert_eq!(plan.create, ids(&[2]));
    }

    #[test]
    fn test_scale_down_removes_largest_identity() {
        let alloc = allocation(&[("box-1", 1), ("box-2", 2), ("box-3", 3)], &[], 2);
        let plan = diff(3, 2, &alloc, UnidentifiedPolicy::default());
        assert_eq!(plan.remove, vec!["box-3"]);
        assert!(plan.create.is_empty());
    }

    #[test]
    fn test_scale_to_zero_removes_everything() {
        let alloc = allocation(&[("box-1", 1), ("box-2", 2)], &[], 0);
        let plan = diff(2, 0, &alloc, UnidentifiedPolicy::default());
        assert_eq!(plan.remove, vec!["box-2", "box-1"]);
    }

    #[test]
    fn test_unidentified_counts_toward_live() {
        let alloc = allocation(&[("box-1", 1)], &["mystery"], 2);
        let plan = diff(2, 2, &alloc, UnidentifiedPolicy::default());
        assert!(plan.is_empty());
        assert_eq!(plan.shortfall, 0);
    }

    #[test]
    fn test_unidentified_boxes_shrink_need() {
        let alloc = allocation(&[("box-1", 1)], &["x"], 4);
        let plan = diff(2, 4, &alloc, UnidentifiedPolicy::default());
        assert_eq!(plan.create, ids(&[2, 3]));
        assert_eq!(plan.shortfall, 0);
    }

    #[test]
    fn test_need_exceeding_free_identities_is_not_filled() {
        // Live count taken from a smaller snapshot than the allocation.
        let alloc = allocation(&[("box-1", 1), ("box-2", 2)], &[], 2);
        let plan = diff(1, 2, &alloc, UnidentifiedPolicy::default());
        assert!(plan.create.is_empty());
        assert_eq!(plan.shortfall, 1);
    }

    #[test]
    fn test_remove_first_targets_unidentified() {
        let alloc = allocation(&[("box-1", 1), ("box-2", 2)], &["alpha", "zeta"], 2);
        let plan = diff(4, 2, &alloc, UnidentifiedPolicy::RemoveFirst);
        assert_eq!(plan.remove, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_ignore_policy_only_targets_identified() {
        let alloc = allocation(&[("box-1", 1), ("box-2", 2)], &["mystery"], 1);
        let plan = diff(3, 1, &alloc, UnidentifiedPolicy::Ignore);
        assert_eq!(plan.remove, vec!["box-2", "box-1"]);
    }

    #[test]
    fn test_ignore_policy_can_leave_excess() {
        let alloc = allocation(&[("box-1", 1)], &["a", "b"], 0);
        let plan = diff(3, 0, &alloc, UnidentifiedPolicy::Ignore);
        assert_eq!(plan.remove, vec!["box-1"]);
    }

    #[test]
    fn test_duplicate_identities_break_ties_by_name() {
        let alloc = allocation(&[("box-2", 2), ("copy-of-2", 2), ("box-1", 1)], &[], 1);
        let plan = diff(3, 1, &alloc, UnidentifiedPolicy::default());
        assert_eq!(plan.remove, vec!["box-2", "copy-of-2"]);
    }

    #[test]
    fn test_policy_wire_names() {
        assert_eq!(
            serde_json::to_string(&UnidentifiedPolicy::RemoveFirst).unwrap(),
            "\"remove-first\""
        );
        let parsed: UnidentifiedPolicy = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(parsed, UnidentifiedPolicy::Ignore);
    }
}
