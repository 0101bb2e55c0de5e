//! Allocation Policies
//!
//! Capacity policy tables: ordered `{pool, threshold, quota}` rules that
//! decide which diskgroup a device of a given size joins. The tables are
//! plain data so thresholds and quotas can be tuned from configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label given to devices no rule accepts
pub const DEFAULT_OVERFLOW_POOL: &str = "ASMDISK";

// =============================================================================
// Pool Rule
// =============================================================================

/// One entry of a capacity policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRule {
    /// Diskgroup name (e.g., DATA01)
    pub pool: String,
    /// Largest device size accepted, in KiB
    pub threshold_kib: u64,
    /// Maximum members; `None` is unbounded
    #[serde(default)]
    pub quota: Option<u32>,
}

impl PoolRule {
    pub fn new(pool: &str, threshold_kib: u64, quota: Option<u32>) -> Self {
        Self {
            pool: pool.to_string(),
            threshold_kib,
            quota,
        }
    }

    /// Check if a device fits this rule given the pool's current count
    pub fn accepts(&self, size_kib: u64, count: u32) -> bool {
        size_kib <= self.threshold_kib && self.quota.map_or(true, |q| count < q)
    }
}

// =============================================================================
// Pool Counters
// =============================================================================

/// Running member count per pool
#[derive(Debug, Clone, Default)]
pub struct PoolCounters {
    counts: HashMap<String, u32>,
}

impl PoolCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pool: &str) -> u32 {
        self.counts.get(pool).copied().unwrap_or(0)
    }

    /// Increment and return the new count, which is the next instance number
    pub fn next(&mut self, pool: &str) -> u32 {
        let count = self.counts.entry(pool.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Raise a pool's count to at least `floor`
    pub fn seed(&mut self, pool: &str, floor: u32) {
        let count = self.counts.entry(pool.to_string()).or_insert(0);
        *count = (*count).max(floor);
    }
}

// =============================================================================
// Policy Table
// =============================================================================

fn default_overflow_pool() -> String {
    DEFAULT_OVERFLOW_POOL.to_string()
}

/// Ordered rule table; the first accepting rule wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Rules in priority order
    pub rules: Vec<PoolRule>,
    /// Pool for devices no rule accepts
    #[serde(default = "default_overflow_pool")]
    pub overflow_pool: String,
}

impl PolicyTable {
    pub fn new(rules: Vec<PoolRule>) -> Self {
        Self {
            rules,
            overflow_pool: default_overflow_pool(),
        }
    }

    /// Pool a device of `size_kib` joins; the overflow pool if no rule accepts
    pub fn select(&self, size_kib: u64, counters: &PoolCounters) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.accepts(size_kib, counters.count(&rule.pool)))
            .map(|rule| rule.pool.as_str())
            .unwrap_or(self.overflow_pool.as_str())
    }

    /// Guest table: small OCR disks, single TEMP/REDO/ARCH disks, unbounded DATA
    pub fn virtualized() -> Self {
        Self::new(vec![
            PoolRule::new("ORAC01", 2_097_152, Some(5)),
            PoolRule::new("TEMP01", 16_777_216, Some(1)),
            PoolRule::new("REDO01", 16_777_216, Some(1)),
            PoolRule::new("REDO02", 16_777_216, Some(1)),
            PoolRule::new("ARCH01", 33_554_432, Some(1)),
            PoolRule::new("ARCH02", 33_554_432, Some(1)),
            PoolRule::new("DATA01", 67_108_864, None),
        ])
    }

    /// Bare-metal table sized for multipath LUNs
    pub fn physical() -> Self {
        Self::new(vec![
            PoolRule::new("ORAC01", 1_049_280, Some(5)),
            PoolRule::new("REDO01", 16_777_920, Some(8)),
            PoolRule::new("REDO02", 16_777_920, Some(8)),
            PoolRule::new("TEMP01", 134_218_560, Some(4)),
            PoolRule::new("ARCH01", 134_218_560, Some(4)),
            PoolRule::new("ARCH02", 134_218_560, Some(4)),
            PoolRule::new("DATA01", 134_218_560, Some(12)),
        ])
    }

    fn validate(&self, profile: &str) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::Configuration(format!(
                "{} policy table has no rules",
                profile
            )));
        }
        check_pool_name(profile, &self.overflow_pool)?;
        for rule in &self.rules {
            check_pool_name(profile, &rule.pool)?;
            if rule.threshold_kib == 0 {
                return Err(Error::Configuration(format!(
                    "{} rule {} has a zero threshold",
                    profile, rule.pool
                )));
            }
            if rule.quota == Some(0) {
                return Err(Error::Configuration(format!(
                    "{} rule {} has a zero quota",
                    profile, rule.pool
                )));
            }
        }
        Ok(())
    }
}

/// Whether a name can be embedded in a quoted udev `SYMLINK` value
pub fn is_link_component(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == '"')
}

fn check_pool_name(profile: &str, pool: &str) -> Result<()> {
    if !is_link_component(pool) {
        return Err(Error::Configuration(format!(
            "{} policy table has invalid pool name {:?}",
            profile, pool
        )));
    }
    Ok(())
}

// =============================================================================
// Allocator Profile
// =============================================================================

/// Platform parameter set for the capacity allocator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorProfile {
    /// Boot/system devices never allocated
    #[serde(default)]
    pub reserved: Vec<String>,
    /// Ordered capacity rules
    #[serde(flatten)]
    pub table: PolicyTable,
}

impl AllocatorProfile {
    pub fn virtualized() -> Self {
        Self {
            reserved: vec!["sda".to_string(), "sdb".to_string(), "sdc".to_string()],
            table: PolicyTable::virtualized(),
        }
    }

    pub fn physical() -> Self {
        Self {
            reserved: Vec::new(),
            table: PolicyTable::physical(),
        }
    }

    pub fn is_reserved(&self, kernel_name: &str) -> bool {
        self.reserved.iter().any(|r| r == kernel_name)
    }

    pub(crate) fn validate(&self, profile: &str) -> Result<()> {
        if self.reserved.len() > 3 {
            return Err(Error::Configuration(format!(
                "{} profile reserves more than three devices",
                profile
            )));
        }
        self.table.validate(profile)
    }
}
