//! Domain Ports - Core types and trait definitions for diskmap
//!
//! These traits define the boundaries between the correlation/allocation
//! logic and the host. Adapters implement them to run real utilities, tests
//! implement them with canned output.

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Platform
// =============================================================================

/// Host platform, decided once per run by the platform detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Guest of a hypervisor; SCSI topology identity is canonical
    Virtualized,
    /// Bare metal with multipath; device-mapper identity is canonical
    Physical,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Virtualized => write!(f, "virtualized"),
            Platform::Physical => write!(f, "physical"),
        }
    }
}

// =============================================================================
// Device Identity
// =============================================================================

/// Everything known about one kernel device after correlation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Kernel name (e.g., sdc, dm-3); not stable across reboots
    pub kernel_name: String,
    /// SCSI generic name (e.g., sg2)
    pub generic_name: Option<String>,
    /// SCSI address as host:channel:target:lun:type
    pub target_address: Option<String>,
    /// Reboot-invariant identifier (serial or WWID)
    pub stable_id: Option<String>,
    /// Device-mapper kernel name when multipathed
    pub dm_name: Option<String>,
    /// Size in KiB from the partition table
    pub size_kib: Option<u64>,
}

/// A canonical device with complete identity, ready for allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDevice {
    /// Kernel name used as the assignment key
    pub kernel_name: String,
    /// Reboot-invariant identifier used in rules
    pub stable_id: String,
    /// Size in KiB
    pub size_kib: u64,
    /// Target address (virtualized) or device-mapper name (physical)
    pub locator: Option<String>,
}

// =============================================================================
// Exclusions
// =============================================================================

/// Why a device was left out of allocation or emission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionReason {
    /// Reserved boot/system device
    Reserved,
    /// No size in the partition table
    MissingSize,
    /// Identifier query returned nothing
    MissingStableId,
    /// Named by a policy input but not a canonical device
    UnknownDevice,
    /// No policy produced a label
    Unassigned,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Reserved => write!(f, "reserved device"),
            ExclusionReason::MissingSize => write!(f, "missing size"),
            ExclusionReason::MissingStableId => write!(f, "missing stable identifier"),
            ExclusionReason::UnknownDevice => write!(f, "unknown device"),
            ExclusionReason::Unassigned => write!(f, "no diskgroup assigned"),
        }
    }
}

/// A device dropped from a stage, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub kernel_name: String,
    pub reason: ExclusionReason,
}

impl Exclusion {
    pub fn new(kernel_name: impl Into<String>, reason: ExclusionReason) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            reason,
        }
    }
}

// =============================================================================
// Diskgroup Assignment
// =============================================================================

/// Pool label with its instance number, rendered as `<pool>_<instance>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiskgroupLabel {
    pub pool: String,
    pub instance: u32,
}

impl DiskgroupLabel {
    pub fn new(pool: impl Into<String>, instance: u32) -> Self {
        Self {
            pool: pool.into(),
            instance,
        }
    }
}

impl fmt::Display for DiskgroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.pool, self.instance)
    }
}

/// Kernel name to diskgroup label, owned by a single run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskgroupAssignment {
    labels: IndexMap<String, DiskgroupLabel>,
}

impl DiskgroupAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or reassign) a device, returning the label it replaced
    pub fn assign(&mut self, kernel_name: &str, label: DiskgroupLabel) -> Option<DiskgroupLabel> {
        self.labels.insert(kernel_name.to_string(), label)
    }

    pub fn get(&self, kernel_name: &str) -> Option<&DiskgroupLabel> {
        self.labels.get(kernel_name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiskgroupLabel)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Highest instance number currently held by each pool
    pub fn highest_instances(&self) -> HashMap<String, u32> {
        let mut seen: HashMap<String, u32> = HashMap::new();
        for label in self.labels.values() {
            let entry = seen.entry(label.pool.clone()).or_insert(0);
            *entry = (*entry).max(label.instance);
        }
        seen
    }
}

/// Result of running one diskgroup policy
#[derive(Debug, Clone, Default)]
pub struct AllocationOutcome {
    /// Kernel names labeled by this policy, in order
    pub assigned: Vec<String>,
    /// Devices the policy passed over
    pub exclusions: Vec<Exclusion>,
}

// =============================================================================
// Tool Runner Port
// =============================================================================

/// Port for invoking external text-producing utilities
pub trait ToolRunner {
    /// Run a program to completion and return its stdout.
    ///
    /// A program that cannot be spawned or exits non-zero is an
    /// [`crate::Error::UtilityUnavailable`].
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

// =============================================================================
// Diskgroup Policy Port
// =============================================================================

/// Port for the interchangeable diskgroup allocation policies
pub trait DiskgroupPolicy {
    /// Short policy name used in logs
    fn name(&self) -> &'static str;

    /// Label devices, writing into the run's assignment
    fn assign(
        &self,
        devices: &[ResolvedDevice],
        assignment: &mut DiskgroupAssignment,
    ) -> Result<AllocationOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display() {
        assert_eq!(format!("{}", Platform::Virtualized), "virtualized");
        assert_eq!(format!("{}", Platform::Physical), "physical");
    }

    #[test]
    fn test_label_display() {
        assert_eq!(DiskgroupLabel::new("REDO02", 1).to_string(), "REDO02_1");
        assert_eq!(DiskgroupLabel::new("my_pool", 3).to_string(), "my_pool_3");
    }

    #[test]
    fn test_highest_instances() {
        let mut assignment = DiskgroupAssignment::new();
        assignment.assign("sdd", DiskgroupLabel::new("DATA01", 1));
        assignment.assign("sde", DiskgroupLabel::new("DATA01", 3));
        assignment.assign("sdf", DiskgroupLabel::new("ORAC01", 2));

        let seen = assignment.highest_instances();
        assert_eq!(seen.get("DATA01"), Some(&3));
        assert_eq!(seen.get("ORAC01"), Some(&2));
        assert_eq!(seen.get("REDO01"), None);
    }

    #[test]
    fn test_reassign_replaces_label() {
        let mut assignment = DiskgroupAssignment::new();
        assert!(assignment.assign("sdd", DiskgroupLabel::new("DATA01", 1)).is_none());
        let previous = assignment.assign("sdd", DiskgroupLabel::new("ARCH01", 1));
        assert_eq!(previous, Some(DiskgroupLabel::new("DATA01", 1)));
        assert_eq!(assignment.len(), 1);
    }
}
