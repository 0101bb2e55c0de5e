//! Hardware Module
//!
//! Provides device discovery, identity correlation, content
//! classification and diskgroup allocation.

pub mod allocation;
pub mod classification;
pub mod discovery;

pub use allocation::*;
pub use classification::*;
pub use discovery::*;
