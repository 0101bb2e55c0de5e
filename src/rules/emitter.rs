//! Rule Emitter
//!
//! Writes a diagnostic comment and a rule line for every assigned canonical
//! device. In delta mode, identifiers already present in the persisted rules
//! are left out, so the output can be appended to the rules file as is.

use super::persisted::PersistedRules;
use super::template::RuleTemplate;
use crate::domain::ports::{DiskgroupAssignment, ResolvedDevice};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

/// Which devices get a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// One rule per assigned device
    #[default]
    Full,
    /// Only devices whose identifier is not yet persisted
    Delta,
}

/// What an emission wrote and left out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmitSummary {
    /// Rules written
    pub emitted: usize,
    /// Rules suppressed because the identifier is already persisted
    pub suppressed: usize,
    /// Canonical devices without a diskgroup
    pub unassigned: Vec<String>,
}

/// Emits rules through a platform template
pub struct RuleEmitter<'a> {
    template: &'a RuleTemplate,
}

impl<'a> RuleEmitter<'a> {
    pub fn new(template: &'a RuleTemplate) -> Self {
        Self { template }
    }

    /// Provenance comment placed before a batch of rules
    pub fn write_header<W: Write>(&self, out: &mut W, generated_at: DateTime<Utc>) -> Result<()> {
        writeln!(
            out,
            "# diskmap {} {} ({}) {}",
            crate::VERSION,
            self.template.hostname(),
            self.template.platform(),
            generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        Ok(())
    }

    /// Write comment and rule lines for assigned devices
    pub fn emit<W: Write>(
        &self,
        out: &mut W,
        devices: &[ResolvedDevice],
        assignment: &DiskgroupAssignment,
        persisted: &PersistedRules,
        mode: EmitMode,
    ) -> Result<EmitSummary> {
        let mut summary = EmitSummary::default();

        for device in devices {
            let Some(label) = assignment.get(&device.kernel_name) else {
                debug!("{} has no diskgroup, no rule emitted", device.kernel_name);
                summary.unassigned.push(device.kernel_name.clone());
                continue;
            };

            if mode == EmitMode::Delta && persisted.contains(&device.stable_id) {
                debug!("{} already persisted, skipping", device.stable_id);
                summary.suppressed += 1;
                continue;
            }

            let link = self.template.link_name(label);
            writeln!(
                out,
                "# {} {} {} {}",
                device.stable_id,
                device.kernel_name,
                device.locator.as_deref().unwrap_or("-"),
                device.size_kib
            )?;
            writeln!(out, "{}", self.template.render(&device.stable_id, &link))?;
            summary.emitted += 1;
        }

        info!(
            "Emitted {} rules ({} already persisted, {} unassigned)",
            summary.emitted,
            summary.suppressed,
            summary.unassigned.len()
        );
        Ok(summary)
    }
}
