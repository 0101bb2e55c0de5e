//! Capacity Allocator
//!
//! Baseline diskgroup policy. Walks the canonical devices in enumeration
//! order and places each one in the first pool of the platform's policy
//! table that still has room for a device of its size.

use super::policy::{AllocatorProfile, PoolCounters};
use crate::domain::ports::{
    AllocationOutcome, DiskgroupAssignment, DiskgroupLabel, DiskgroupPolicy, Exclusion,
    ExclusionReason, ResolvedDevice,
};
use crate::error::Result;
use tracing::{debug, info};

// =============================================================================
// Capacity Policy
// =============================================================================

/// Size-threshold diskgroup policy driven by an [`AllocatorProfile`]
pub struct CapacityPolicy<'a> {
    profile: &'a AllocatorProfile,
}

impl<'a> CapacityPolicy<'a> {
    pub fn new(profile: &'a AllocatorProfile) -> Self {
        Self { profile }
    }
}

impl DiskgroupPolicy for CapacityPolicy<'_> {
    fn name(&self) -> &'static str {
        "capacity"
    }

    fn assign(
        &self,
        devices: &[ResolvedDevice],
        assignment: &mut DiskgroupAssignment,
    ) -> Result<AllocationOutcome> {
        let table = &self.profile.table;
        let mut counters = PoolCounters::new();
        let mut outcome = AllocationOutcome::default();

        for device in devices {
            if self.profile.is_reserved(&device.kernel_name) {
                outcome
                    .exclusions
                    .push(Exclusion::new(&device.kernel_name, ExclusionReason::Reserved));
                continue;
            }

            let pool = table.select(device.size_kib, &counters).to_string();
            let label = DiskgroupLabel::new(pool.as_str(), counters.next(&pool));
            debug!(
                "{} ({} KiB) -> {}",
                device.kernel_name, device.size_kib, label
            );

            assignment.assign(&device.kernel_name, label);
            outcome.assigned.push(device.kernel_name.clone());
        }

        info!(
            "Capacity policy assigned {} devices ({} reserved)",
            outcome.assigned.len(),
            outcome.exclusions.len()
        );

        Ok(outcome)
    }
}
