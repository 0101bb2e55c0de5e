//! Allocation Module
//!
//! Provides the diskgroup policies: the capacity baseline driven by
//! per-platform policy tables, and the operator grammar override.

pub mod allocator;
pub mod grammar;
pub mod policy;

pub use allocator::*;
pub use grammar::*;
pub use policy::*;
