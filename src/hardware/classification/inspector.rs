//! Content Inspection Policy
//!
//! Reads the first 128 bytes of every canonical device through `od` and
//! assigns the diskgroup whose label is stamped in the header.

use super::fingerprint::{SignatureDatabase, UNLABELED_POOL};
use crate::domain::ports::{
    AllocationOutcome, DiskgroupAssignment, DiskgroupLabel, DiskgroupPolicy, Exclusion,
    ExclusionReason, ResolvedDevice, ToolRunner,
};
use crate::error::Result;
use crate::hardware::allocation::PoolCounters;
use tracing::{debug, info};

/// Bytes read from the start of each device
pub const HEADER_BYTES: usize = 128;

/// Diskgroup policy that classifies devices by header content
pub struct ContentPolicy<'a> {
    runner: &'a dyn ToolRunner,
    od: &'a str,
    reserved: &'a [String],
}

impl<'a> ContentPolicy<'a> {
    pub fn new(runner: &'a dyn ToolRunner, od: &'a str, reserved: &'a [String]) -> Self {
        Self {
            runner,
            od,
            reserved,
        }
    }

    /// Dump the device header as characters
    fn read_header(&self, kernel_name: &str) -> Result<String> {
        let read_bytes = format!("--read-bytes={}", HEADER_BYTES);
        let device = format!("/dev/{}", kernel_name);
        self.runner
            .run(self.od, &[read_bytes.as_str(), "--format=c", device.as_str()])
    }
}

impl DiskgroupPolicy for ContentPolicy<'_> {
    fn name(&self) -> &'static str {
        "content"
    }

    fn assign(
        &self,
        devices: &[ResolvedDevice],
        assignment: &mut DiskgroupAssignment,
    ) -> Result<AllocationOutcome> {
        let mut seen = PoolCounters::new();
        let mut outcome = AllocationOutcome::default();

        for device in devices {
            if self.reserved.iter().any(|r| *r == device.kernel_name) {
                outcome
                    .exclusions
                    .push(Exclusion::new(&device.kernel_name, ExclusionReason::Reserved));
                continue;
            }

            let dump = self.read_header(&device.kernel_name)?;
            let pool = SignatureDatabase::identify(&dump).unwrap_or(UNLABELED_POOL);
            let label = DiskgroupLabel::new(pool, seen.next(pool));
            debug!("{} header -> {}", device.kernel_name, label);

            assignment.assign(&device.kernel_name, label);
            outcome.assigned.push(device.kernel_name.clone());
        }

        info!("Content policy assigned {} devices", outcome.assigned.len());
        Ok(outcome)
    }
}
