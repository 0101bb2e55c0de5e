//! Identity Correlator
//!
//! Merges the multipath listing, the partition table and the SCSI topology
//! listing into one [`CorrelationMap`], then picks the canonical device set
//! for the detected platform.

use super::sources::{
    first_token, parse_multipath_line, parse_partition_line, parse_topology_line, ScanReport,
};
use crate::config::DiskmapConfig;
use crate::domain::ports::{
    DeviceIdentity, Exclusion, ExclusionReason, Platform, ResolvedDevice, ToolRunner,
};
use crate::error::{Error, Result};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use tracing::{debug, info, warn};

// =============================================================================
// Correlation Map
// =============================================================================

/// Run-scoped lookups between the names a device goes by
///
/// Maps keep enumeration order, so iterating the same input always yields
/// the same device order. The first mapping seen for a key wins.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationMap {
    kernel_to_generic: IndexMap<String, String>,
    kernel_to_target: IndexMap<String, String>,
    kernel_to_stable: IndexMap<String, String>,
    stable_to_kernel: IndexMap<String, String>,
    dm_to_stable: IndexMap<String, String>,
    kernel_to_size: IndexMap<String, u64>,
}

/// Insert unless the key is taken; returns true on a conflicting value
fn insert_once(map: &mut IndexMap<String, String>, key: &str, value: &str, what: &str) -> bool {
    match map.entry(key.to_string()) {
        Entry::Vacant(slot) => {
            slot.insert(value.to_string());
            false
        }
        Entry::Occupied(existing) if existing.get() != value => {
            warn!(
                "Conflicting {} for {}: keeping {}, ignoring {}",
                what,
                key,
                existing.get(),
                value
            );
            true
        }
        Entry::Occupied(_) => false,
    }
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest the device-mapper listing (dm name ↔ WWID)
    pub fn ingest_multipath(&mut self, text: &str) -> ScanReport {
        let mut report = ScanReport::new("multipath");
        for (lineno, line) in text.lines().enumerate() {
            if let Some(row) = report.record(lineno, parse_multipath_line(line)) {
                let mut conflict =
                    insert_once(&mut self.dm_to_stable, &row.dm_name, &row.stable_id, "WWID");
                conflict |=
                    insert_once(&mut self.stable_to_kernel, &row.stable_id, &row.dm_name, "device");
                if conflict {
                    report.conflicts += 1;
                }
            }
        }
        report
    }

    /// Ingest the partition table (kernel name → KiB)
    pub fn ingest_partitions(&mut self, text: &str) -> ScanReport {
        let mut report = ScanReport::new("partitions");
        for (lineno, line) in text.lines().enumerate() {
            if let Some(row) = report.record(lineno, parse_partition_line(line)) {
                match self.kernel_to_size.entry(row.kernel_name) {
                    Entry::Vacant(slot) => {
                        slot.insert(row.size_kib);
                    }
                    Entry::Occupied(existing) => {
                        warn!("Duplicate partition entry for {}", existing.key());
                        report.conflicts += 1;
                    }
                }
            }
        }
        report
    }

    /// Ingest the SCSI topology listing, querying each device's identifier
    ///
    /// Malformed rows are skipped; a failing identifier query aborts.
    pub fn ingest_topology<F>(&mut self, text: &str, mut query_id: F) -> Result<ScanReport>
    where
        F: FnMut(&str) -> Result<Option<String>>,
    {
        let mut report = ScanReport::new("topology");
        for (lineno, line) in text.lines().enumerate() {
            let Some(row) = report.record(lineno, parse_topology_line(line)) else {
                continue;
            };

            let stable_id = query_id(&row.kernel_name)?;

            let mut conflict = insert_once(
                &mut self.kernel_to_generic,
                &row.kernel_name,
                &row.generic_name,
                "generic name",
            );
            conflict |= insert_once(
                &mut self.kernel_to_target,
                &row.kernel_name,
                &row.target_address,
                "target",
            );

            match stable_id {
                Some(id) => {
                    conflict |= insert_once(
                        &mut self.kernel_to_stable,
                        &row.kernel_name,
                        &id,
                        "identifier",
                    );
                    match self.multipath_owner(&id).map(str::to_string) {
                        // One path of a multipath LUN; the dm device stays the owner
                        Some(dm_name) => {
                            debug!("{} is a path of {} ({})", row.kernel_name, dm_name, id)
                        }
                        None => {
                            conflict |= insert_once(
                                &mut self.stable_to_kernel,
                                &id,
                                &row.kernel_name,
                                "device",
                            );
                        }
                    }
                }
                None => debug!("{} reported no stable identifier", row.kernel_name),
            }
            if conflict {
                report.conflicts += 1;
            }
        }
        Ok(report)
    }

    /// Device-mapper device already holding a WWID
    fn multipath_owner(&self, stable_id: &str) -> Option<&str> {
        self.stable_to_kernel
            .get(stable_id)
            .filter(|owner| self.dm_to_stable.contains_key(owner.as_str()))
            .map(String::as_str)
    }

    pub fn size_kib(&self, kernel_name: &str) -> Option<u64> {
        self.kernel_to_size.get(kernel_name).copied()
    }

    pub fn stable_id(&self, kernel_name: &str) -> Option<&str> {
        self.kernel_to_stable.get(kernel_name).map(String::as_str)
    }

    /// Kernel (or dm) name holding a stable identifier
    pub fn kernel_for_stable(&self, stable_id: &str) -> Option<&str> {
        self.stable_to_kernel.get(stable_id).map(String::as_str)
    }

    pub fn generic_name(&self, kernel_name: &str) -> Option<&str> {
        self.kernel_to_generic.get(kernel_name).map(String::as_str)
    }

    pub fn target_address(&self, kernel_name: &str) -> Option<&str> {
        self.kernel_to_target.get(kernel_name).map(String::as_str)
    }

    /// WWID of a multipath device-mapper device
    pub fn dm_stable_id(&self, dm_name: &str) -> Option<&str> {
        self.dm_to_stable.get(dm_name).map(String::as_str)
    }

    /// Everything known about one name
    pub fn identity(&self, kernel_name: &str) -> DeviceIdentity {
        let dm_id = self.dm_stable_id(kernel_name);
        DeviceIdentity {
            kernel_name: kernel_name.to_string(),
            generic_name: self.generic_name(kernel_name).map(str::to_string),
            target_address: self.target_address(kernel_name).map(str::to_string),
            stable_id: self.stable_id(kernel_name).or(dm_id).map(str::to_string),
            dm_name: dm_id.map(|_| kernel_name.to_string()),
            size_kib: self.size_kib(kernel_name),
        }
    }

    /// Devices of the platform's authoritative source with complete identity
    ///
    /// Virtualized hosts use the topology maps; physical hosts use the
    /// device-mapper map. Sizes always come from the partition table.
    pub fn canonical_devices(&self, platform: Platform) -> CanonicalSet {
        let mut set = CanonicalSet::default();

        let candidates: Vec<(&str, Option<&str>, &str)> = match platform {
            Platform::Virtualized => self
                .kernel_to_target
                .iter()
                .map(|(kernel, target)| {
                    (kernel.as_str(), self.stable_id(kernel), target.as_str())
                })
                .collect(),
            Platform::Physical => self
                .dm_to_stable
                .iter()
                .map(|(dm, wwid)| (dm.as_str(), Some(wwid.as_str()), dm.as_str()))
                .collect(),
        };

        for (kernel_name, stable_id, locator) in candidates {
            let Some(stable_id) = stable_id else {
                set.exclusions
                    .push(Exclusion::new(kernel_name, ExclusionReason::MissingStableId));
                continue;
            };
            let Some(size_kib) = self.size_kib(kernel_name) else {
                set.exclusions
                    .push(Exclusion::new(kernel_name, ExclusionReason::MissingSize));
                continue;
            };

            set.devices.push(ResolvedDevice {
                kernel_name: kernel_name.to_string(),
                stable_id: stable_id.to_string(),
                size_kib,
                locator: Some(locator.to_string()),
            });
        }

        set
    }
}

/// Canonical devices plus those dropped for incomplete identity
#[derive(Debug, Clone, Default)]
pub struct CanonicalSet {
    pub devices: Vec<ResolvedDevice>,
    pub exclusions: Vec<Exclusion>,
}

// =============================================================================
// Identity Correlator
// =============================================================================

/// Correlation map with the per-source scan reports
#[derive(Debug, Clone)]
pub struct Correlation {
    pub map: CorrelationMap,
    pub reports: Vec<ScanReport>,
}

/// Runs the enumeration sources in order and builds the correlation map
pub struct IdentityCorrelator<'a> {
    runner: &'a dyn ToolRunner,
    config: &'a DiskmapConfig,
}

impl<'a> IdentityCorrelator<'a> {
    pub fn new(runner: &'a dyn ToolRunner, config: &'a DiskmapConfig) -> Self {
        Self { runner, config }
    }

    /// Stable identifier of a device, or `None` if the query prints nothing
    fn query_stable_id(&self, kernel_name: &str) -> Result<Option<String>> {
        let device = format!("/dev/{}", kernel_name);
        let output = self
            .runner
            .run(&self.config.tools.scsi_id, &["-g", "-u", "-d", device.as_str()])?;
        Ok(first_token(&output))
    }

    /// Build the correlation map for a platform
    pub fn correlate(&self, platform: Platform) -> Result<Correlation> {
        let tools = &self.config.tools;
        let mut map = CorrelationMap::new();
        let mut reports = Vec::new();

        if platform == Platform::Physical {
            let listing = self.runner.run(&tools.dmsetup, &["ls", "-o", "blkdevname"])?;
            reports.push(map.ingest_multipath(&listing));
        }

        let path = &self.config.partitions_path;
        let partitions = fs::read_to_string(path).map_err(|source| Error::PartitionTable {
            path: path.clone(),
            source,
        })?;
        reports.push(map.ingest_partitions(&partitions));

        let topology = self.runner.run(&tools.sg_map, &["-x"])?;
        reports.push(map.ingest_topology(&topology, |kernel| self.query_stable_id(kernel))?);

        for report in &reports {
            report.log_summary();
        }
        info!("Correlated identities for {} platform", platform);

        Ok(Correlation { map, reports })
    }
}
