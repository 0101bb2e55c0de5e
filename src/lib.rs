//! diskmap - Persistent Device Naming for ASM Disks
//!
//! Discovers the block devices of a database host, assigns each one a
//! diskgroup label and emits udev rules that give it a stable symbolic
//! link under `/dev`.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Pipeline                             │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐  │
//! │  │   Platform   │──▶│     Identity     │──▶│   Diskgroup    │  │
//! │  │   Detector   │   │    Correlator    │   │   Allocator    │  │
//! │  └──────────────┘   └──────────────────┘   └───────┬────────┘  │
//! │                                                    ▼           │
//! │                     ┌──────────────────────────────────────┐   │
//! │                     │  Rule Reconciler / Map Dump Report   │   │
//! │                     └──────────────────────────────────────┘   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`hardware`]: platform detection, identity correlation, allocation
//!   policies and content classification
//! - [`rules`]: persisted rule loading and rule emission
//! - [`pipeline`]: runs the stages for one invocation
//! - [`report`]: map-dump table
//! - [`config`]: YAML configuration
//! - [`domain`]: core domain types and ports
//! - [`error`]: error types and handling

pub mod config;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod pipeline;
pub mod report;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{DiskmapConfig, RuleOwnership, ToolPaths};

pub use domain::ports::{
    AllocationOutcome, DeviceIdentity, DiskgroupAssignment, DiskgroupLabel, DiskgroupPolicy,
    Exclusion, ExclusionReason, Platform, ResolvedDevice, ToolRunner,
};

pub use error::{Error, Result};

pub use hardware::{
    AllocatorProfile, CapacityPolicy, ContentPolicy, CorrelationMap, GrammarPolicy,
    IdentityCorrelator, PlatformDetector, PolicyTable, PoolRule, SystemRunner,
};

pub use pipeline::{OutputMode, Pipeline, PolicyChoice, RunOptions, RunSummary};

pub use rules::{EmitMode, EmitSummary, PersistedRules, RuleEmitter, RuleTemplate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
