//! Domain layer - Core data model and port definitions
//!
//! This module defines the run-scoped data model and the traits (ports)
//! that host adapters and diskgroup policies implement.

pub mod ports;

pub use ports::*;
