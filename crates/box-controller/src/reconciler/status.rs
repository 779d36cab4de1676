//! Status projection onto the parent resource

use super::plan::Plan;
use crate::allocator::Allocation;
use box_types::{set_condition, unit_name, BoxController, BoxControllerStatus, Condition, PodIdStatus};

pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_PROGRESSING: &str = "Progressing";
pub const CONDITION_DEGRADED: &str = "Degraded";

/// Build the status to persist for this pass.
///
/// `pods` mirrors the identified boxes observed *before* the pass acts, so it
/// is exactly the snapshot the decisions were made from.
pub fn project_status(
    parent: &BoxController,
    allocation: &Allocation,
    live: usize,
    plan: &Plan,
) -> BoxControllerStatus {
    let mut pods: Vec<PodIdStatus> = allocation
        .assignments
        .iter()
        .map(|(name, id)| PodIdStatus {
            name: name.clone(),
            id: *id,
        })
        .collect();
    pods.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));

    let mut conditions = parent.status.conditions.clone();
    for condition in conditions_for(parent.replicas(), allocation, live, plan) {
        set_condition(&mut conditions, condition);
    }

    BoxControllerStatus {
        pods,
        conditions,
        observed_generation: Some(parent.metadata.generation),
    }
}

fn conditions_for(desired: u32, allocation: &Allocation, live: usize, plan: &Plan) -> Vec<Condition> {
    let desired_count = desired as usize;
    let unidentified = allocation.has_unidentified();

    let available = if live == desired_count && !unidentified {
        Condition::new(
            CONDITION_AVAILABLE,
            true,
            "AllReplicasReady",
            format!("{}/{} boxes running", live, desired),
        )
    } else {
        let reason = if unidentified {
            "UnidentifiedUnits"
        } else if live < desired_count {
            "ScalingUp"
        } else {
            "ScalingDown"
        };
        Condition::new(
            CONDITION_AVAILABLE,
            false,
            reason,
            format!(
                "{} live boxes ({} identified), {} desired",
                live,
                allocation.identified_count(),
                desired
            ),
        )
    };

    let progressing = if !plan.create.is_empty() {
        Condition::new(
            CONDITION_PROGRESSING,
            true,
            "ScalingUp",
            format!("creating {} boxes", plan.create.len()),
        )
    } else if !plan.remove.is_empty() {
        Condition::new(
            CONDITION_PROGRESSING,
            true,
            "ScalingDown",
            format!("removing {} boxes", plan.remove.len()),
        )
    } else {
        Condition::new(CONDITION_PROGRESSING, false, "Stable", "")
    };

    let degraded = if unidentified {
        let mut message = format!("boxes without identity: {}", allocation.unidentified.join(", "));
        let blocking = name_collisions(allocation, plan);
        if !blocking.is_empty() {
            message.push_str(&format!(
                "; name collision blocks creating {}",
                blocking.join(", ")
            ));
        }
        Condition::new(CONDITION_DEGRADED, true, "UnidentifiedUnits", message)
    } else if plan.shortfall > 0 {
        Condition::new(
            CONDITION_DEGRADED,
            true,
            "IdentityShortfall",
            format!("{} boxes missing with no free identity", plan.shortfall),
        )
    } else {
        Condition::new(CONDITION_DEGRADED, false, "AsExpected", "")
    };

    vec![available, progressing, degraded]
}

/// Unidentified boxes squatting on the name of a box this pass must create
fn name_collisions<'a>(allocation: &'a Allocation, plan: &Plan) -> Vec<&'a str> {
    allocation
        .unidentified
        .iter()
        .filter(|name| plan.create.iter().any(|id| unit_name(*id) == **name))
        .map(String::as_str)
        .collect()
}
