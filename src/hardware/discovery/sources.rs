//! Enumeration Source Parsers
//!
//! Line parsers for the three identity sources: the device-mapper listing,
//! the kernel partition table and the SCSI generic topology listing. Each
//! line yields a [`RowOutcome`] so skipped rows are counted, not lost.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

// =============================================================================
// Row Outcomes
// =============================================================================

/// Why a source line produced no mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty or whitespace-only line
    Blank,
    /// Line does not have the shape this source expects (headers, banners)
    Unmatched,
    /// Fewer columns than the row shape needs
    TooFewColumns { found: usize, needed: usize },
    /// Size column is not an integer
    InvalidSize(String),
    /// Column expected to be a /dev path is not one
    NotDevicePath(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blank => write!(f, "blank line"),
            SkipReason::Unmatched => write!(f, "unrecognized line"),
            SkipReason::TooFewColumns { found, needed } => {
                write!(f, "{} columns, expected {}", found, needed)
            }
            SkipReason::InvalidSize(size) => write!(f, "invalid size {:?}", size),
            SkipReason::NotDevicePath(path) => write!(f, "not a device path {:?}", path),
        }
    }
}

/// Result of parsing one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome<T> {
    /// The line produced a mapping
    Mapped(T),
    /// The line was malformed or irrelevant
    Skipped(SkipReason),
    /// The line named a device that is never mapped (optical drives)
    Excluded(String),
}

/// Per-source tally of row outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub source: &'static str,
    pub mapped: usize,
    pub skipped: usize,
    pub excluded: usize,
    /// Rows whose mapping disagreed with an earlier one
    pub conflicts: usize,
}

impl ScanReport {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// Count an outcome, handing back the mapped row if there is one
    pub fn record<T>(&mut self, lineno: usize, outcome: RowOutcome<T>) -> Option<T> {
        match outcome {
            RowOutcome::Mapped(row) => {
                self.mapped += 1;
                Some(row)
            }
            RowOutcome::Skipped(SkipReason::Blank) => None,
            RowOutcome::Skipped(reason) => {
                debug!("{} line {} skipped: {}", self.source, lineno + 1, reason);
                self.skipped += 1;
                None
            }
            RowOutcome::Excluded(name) => {
                debug!("{} line {} excluded device {}", self.source, lineno + 1, name);
                self.excluded += 1;
                None
            }
        }
    }

    pub fn log_summary(&self) {
        info!(
            "{}: {} mapped, {} skipped, {} excluded, {} conflicting",
            self.source, self.mapped, self.skipped, self.excluded, self.conflicts
        );
    }
}

// =============================================================================
// Multipath Listing
// =============================================================================

/// `<wwid> (<dm-kernel-name>)` from `dmsetup ls -o blkdevname`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipathRow {
    pub stable_id: String,
    pub dm_name: String,
}

/// Parse a multipath line; only maps whose name starts with a digit qualify
pub fn parse_multipath_line(line: &str) -> RowOutcome<MultipathRow> {
    if line.trim().is_empty() {
        return RowOutcome::Skipped(SkipReason::Blank);
    }
    if !line.starts_with(|c: char| c.is_ascii_digit()) {
        return RowOutcome::Skipped(SkipReason::Unmatched);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return RowOutcome::Skipped(SkipReason::TooFewColumns {
            found: fields.len(),
            needed: 2,
        });
    }

    let dm_name = fields[1].trim_start_matches('(').trim_end_matches(')');
    if dm_name.is_empty() {
        return RowOutcome::Skipped(SkipReason::Unmatched);
    }

    RowOutcome::Mapped(MultipathRow {
        stable_id: fields[0].to_string(),
        dm_name: dm_name.to_string(),
    })
}

// =============================================================================
// Partition Table
// =============================================================================

/// `<major> <minor> <#blocks> <name>` from /proc/partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRow {
    pub kernel_name: String,
    pub size_kib: u64,
}

/// Parse a partition table line; rows must start with a numeric field
pub fn parse_partition_line(line: &str) -> RowOutcome<PartitionRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = fields.first() else {
        return RowOutcome::Skipped(SkipReason::Blank);
    };
    if !first.chars().all(|c| c.is_ascii_digit()) {
        return RowOutcome::Skipped(SkipReason::Unmatched);
    }
    if fields.len() < 4 {
        return RowOutcome::Skipped(SkipReason::TooFewColumns {
            found: fields.len(),
            needed: 4,
        });
    }

    match fields[2].parse::<u64>() {
        Ok(size_kib) => RowOutcome::Mapped(PartitionRow {
            kernel_name: fields[3].to_string(),
            size_kib,
        }),
        Err(_) => RowOutcome::Skipped(SkipReason::InvalidSize(fields[2].to_string())),
    }
}

// =============================================================================
// SCSI Topology Listing
// =============================================================================

/// `<sg> <host> <chan> <target> <lun> <type> <sd>` from `sg_map -x`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRow {
    pub generic_name: String,
    pub kernel_name: String,
    /// host:channel:target:lun:type
    pub target_address: String,
}

/// Check if a kernel name is an optical drive
pub fn is_optical(kernel_name: &str) -> bool {
    ["sr", "scd"].iter().any(|prefix| {
        kernel_name
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    })
}

fn strip_dev(path: &str) -> Option<&str> {
    path.strip_prefix("/dev/").filter(|name| !name.is_empty())
}

/// Parse a topology row; rows without a block device are skipped
pub fn parse_topology_line(line: &str) -> RowOutcome<TopologyRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return RowOutcome::Skipped(SkipReason::Blank);
    }
    if fields.len() < 7 {
        return RowOutcome::Skipped(SkipReason::TooFewColumns {
            found: fields.len(),
            needed: 7,
        });
    }

    let Some(generic_name) = strip_dev(fields[0]) else {
        return RowOutcome::Skipped(SkipReason::NotDevicePath(fields[0].to_string()));
    };
    let Some(kernel_name) = strip_dev(fields[6]) else {
        return RowOutcome::Skipped(SkipReason::NotDevicePath(fields[6].to_string()));
    };

    if is_optical(kernel_name) {
        return RowOutcome::Excluded(kernel_name.to_string());
    }

    RowOutcome::Mapped(TopologyRow {
        generic_name: generic_name.to_string(),
        kernel_name: kernel_name.to_string(),
        target_address: fields[1..6].join(":"),
    })
}

/// First token of an identifier query, or `None` for empty output
pub fn first_token(output: &str) -> Option<String> {
    output.split_whitespace().next().map(str::to_string)
}
