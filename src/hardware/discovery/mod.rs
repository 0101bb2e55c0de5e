//! Device Discovery Module
//!
//! Detects the host platform and correlates block device identity from
//! the multipath listing, the partition table and the SCSI topology.

pub mod correlator;
pub mod platform;
pub mod runner;
pub mod sources;

pub use correlator::*;
pub use platform::*;
pub use runner::*;
pub use sources::*;
