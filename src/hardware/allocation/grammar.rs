//! Grammar File Policy
//!
//! Operator-supplied `<kernel-name> <pool-name>` lines override the
//! baseline assignment. Numbering continues from the highest instance each
//! pool already holds in the run's assignment.

use super::policy::{is_link_component, PoolCounters};
use crate::domain::ports::{
    AllocationOutcome, DiskgroupAssignment, DiskgroupLabel, DiskgroupPolicy, Exclusion,
    ExclusionReason, ResolvedDevice,
};
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// One parsed grammar line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarEntry {
    pub kernel_name: String,
    pub pool: String,
}

/// Parsed grammar file
#[derive(Debug, Clone, Default)]
pub struct GrammarPolicy {
    entries: Vec<GrammarEntry>,
}

impl GrammarPolicy {
    /// Parse grammar text; comments, blanks and short lines are skipped
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(_), Some(pool)) if !is_link_component(pool) => {
                    warn!("Skipping grammar line {} with invalid pool {:?}", lineno + 1, pool)
                }
                (Some(kernel_name), Some(pool)) => entries.push(GrammarEntry {
                    kernel_name: kernel_name.trim_start_matches("/dev/").to_string(),
                    pool: pool.to_string(),
                }),
                _ => warn!("Skipping malformed grammar line {}: {:?}", lineno + 1, line),
            }
        }

        Self { entries }
    }

    /// Read and parse a grammar file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::GrammarFile {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = Self::parse(&text);
        debug!(
            "Loaded {} grammar entries from {}",
            policy.entries.len(),
            path.display()
        );
        Ok(policy)
    }

    pub fn entries(&self) -> &[GrammarEntry] {
        &self.entries
    }
}

impl DiskgroupPolicy for GrammarPolicy {
    fn name(&self) -> &'static str {
        "grammar"
    }

    fn assign(
        &self,
        devices: &[ResolvedDevice],
        assignment: &mut DiskgroupAssignment,
    ) -> Result<AllocationOutcome> {
        let mut seen = PoolCounters::new();
        for (pool, highest) in assignment.highest_instances() {
            seen.seed(&pool, highest);
        }

        let mut outcome = AllocationOutcome::default();

        for entry in &self.entries {
            let instance = seen.next(&entry.pool);
            let label = DiskgroupLabel::new(entry.pool.as_str(), instance);

            let canonical = devices.iter().any(|d| d.kernel_name == entry.kernel_name);
            if !canonical {
                outcome.exclusions.push(Exclusion::new(
                    &entry.kernel_name,
                    ExclusionReason::UnknownDevice,
                ));
            }

            if let Some(previous) = assignment.assign(&entry.kernel_name, label.clone()) {
                debug!("{}: {} -> {}", entry.kernel_name, previous, label);
            }
            if canonical {
                outcome.assigned.push(entry.kernel_name.clone());
            }
        }

        info!("Grammar policy assigned {} devices", outcome.assigned.len());
        Ok(outcome)
    }
}
