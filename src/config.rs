//! Configuration
//!
//! All host paths, rule ownership and allocator tables in one serde
//! structure. Every field has a default, so a YAML file only needs to name
//! what it changes.

use crate::domain::ports::Platform;
use crate::error::{Error, Result};
use crate::hardware::allocation::{is_link_component, AllocatorProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Tool Paths
// =============================================================================

/// Locations of the external utilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Hardware inventory listing
    pub lspci: String,
    /// Device-mapper listing
    pub dmsetup: String,
    /// SCSI generic topology listing
    pub sg_map: String,
    /// Per-device stable identifier query
    pub scsi_id: String,
    /// Raw content dump
    pub od: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            lspci: "/sbin/lspci".to_string(),
            dmsetup: "/sbin/dmsetup".to_string(),
            sg_map: "/usr/bin/sg_map".to_string(),
            scsi_id: "/sbin/scsi_id".to_string(),
            od: "/usr/bin/od".to_string(),
        }
    }
}

// =============================================================================
// Rule Ownership
// =============================================================================

/// Ownership and mode stamped on every generated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOwnership {
    pub owner: String,
    pub group: String,
    pub mode: String,
}

impl Default for RuleOwnership {
    fn default() -> Self {
        Self {
            owner: "oracle".to_string(),
            group: "dba".to_string(),
            mode: "0660".to_string(),
        }
    }
}

// =============================================================================
// Diskmap Configuration
// =============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskmapConfig {
    /// External utility locations
    pub tools: ToolPaths,
    /// Kernel partition table
    pub partitions_path: PathBuf,
    /// Persisted udev rules used for delta and map dump
    pub rules_path: PathBuf,
    /// Inventory substring that marks a virtualized host
    pub hypervisor_signature: String,
    /// Directory prefix of generated symlinks, relative to /dev
    pub link_dir: String,
    /// Host name embedded in links; defaults to the system host name
    pub hostname: Option<String>,
    /// Ownership of generated device nodes
    pub ownership: RuleOwnership,
    /// Capacity allocator for virtualized hosts
    pub virtualized: AllocatorProfile,
    /// Capacity allocator for physical hosts
    pub physical: AllocatorProfile,
    /// Devices never read by content inspection
    pub content_reserved: Vec<String>,
}

impl Default for DiskmapConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            partitions_path: PathBuf::from("/proc/partitions"),
            rules_path: PathBuf::from("/etc/udev/rules.d/99-asmdisk.rules"),
            hypervisor_signature: "VMware".to_string(),
            link_dir: "udevlinks".to_string(),
            hostname: None,
            ownership: RuleOwnership::default(),
            virtualized: AllocatorProfile::virtualized(),
            physical: AllocatorProfile::physical(),
            content_reserved: vec!["sda".to_string(), "sdb".to_string()],
        }
    }
}

impl DiskmapConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Reject configurations the allocator cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.hypervisor_signature.trim().is_empty() {
            return Err(Error::Configuration(
                "hypervisor_signature must not be empty".into(),
            ));
        }
        if !is_link_component(&self.link_dir) {
            return Err(Error::Configuration(format!(
                "Invalid link_dir: {:?}",
                self.link_dir
            )));
        }
        if let Some(hostname) = &self.hostname {
            if !is_link_component(hostname) {
                return Err(Error::Configuration(format!(
                    "Invalid hostname: {:?}",
                    hostname
                )));
            }
        }
        if self.content_reserved.len() > 2 {
            return Err(Error::Configuration(
                "content_reserved may name at most two devices".into(),
            ));
        }
        self.virtualized.validate("virtualized")?;
        self.physical.validate("physical")?;
        Ok(())
    }

    /// Allocator profile for a platform
    pub fn profile(&self, platform: Platform) -> &AllocatorProfile {
        match platform {
            Platform::Virtualized => &self.virtualized,
            Platform::Physical => &self.physical,
        }
    }
}
