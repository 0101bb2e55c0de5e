//! Platform Detection
//!
//! Decides once per run whether the host is a hypervisor guest, by looking
//! for the hypervisor vendor in the PCI inventory.

use crate::domain::ports::{Platform, ToolRunner};
use crate::error::Result;
use tracing::info;

/// Classify an inventory listing; the first line naming the vendor decides
pub fn detect_platform(inventory: &str, signature: &str) -> Platform {
    if inventory.lines().any(|line| line.contains(signature)) {
        Platform::Virtualized
    } else {
        Platform::Physical
    }
}

/// Runs the inventory listing and classifies the host
pub struct PlatformDetector<'a> {
    runner: &'a dyn ToolRunner,
    lspci: &'a str,
    signature: &'a str,
}

impl<'a> PlatformDetector<'a> {
    pub fn new(runner: &'a dyn ToolRunner, lspci: &'a str, signature: &'a str) -> Self {
        Self {
            runner,
            lspci,
            signature,
        }
    }

    /// Detect the platform; a failed listing aborts the run
    pub fn detect(&self) -> Result<Platform> {
        let inventory = self.runner.run(self.lspci, &[])?;
        let platform = detect_platform(&inventory, self.signature);
        info!("Detected {} platform", platform);
        Ok(platform)
    }
}
