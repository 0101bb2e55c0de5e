//! Content Classification Module
//!
//! Classifies devices by the diskgroup label found in their on-disk
//! header.

pub mod fingerprint;
pub mod inspector;

pub use fingerprint::*;
pub use inspector::*;
