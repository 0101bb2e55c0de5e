//! Rules Module
//!
//! Loads persisted udev rules and emits new ones, optionally only the
//! delta against what is already on disk.

pub mod emitter;
pub mod persisted;
pub mod template;

pub use emitter::*;
pub use persisted::*;
pub use template::*;
