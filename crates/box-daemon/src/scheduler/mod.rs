//! Scheduling of reconcile passes

mod locks;
mod runner;

pub use locks::KeyLocks;
pub use runner::{Scheduler, SchedulerStats, Trigger, TriggerReason};
