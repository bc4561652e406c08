//! Process-wide instance numbering.
//!
//! The counter is created on first use and lives until the process exits; it is never reset.
//! Every [`crate::Workflow`] takes one id from it, which becomes the instance part of its
//! [`crate::ReloadId`] and [`crate::CycleId`]s.

use core::sync::atomic::{AtomicU32, Ordering};

static INSTANCES: AtomicU32 = AtomicU32::new(0);

pub struct Registry;

impl Registry {
    /// Allocates the next instance id, starting at 1.
    pub fn next_instance() -> u32 {
        INSTANCES.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of instances created so far.
    pub fn instance_count() -> u32 {
        INSTANCES.load(Ordering::Relaxed)
    }
}
