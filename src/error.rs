//! Error types for diskmap
//!
//! Only conditions that abort a run are errors. Malformed input lines and
//! devices with incomplete identity are recovered locally and reported
//! through [`crate::hardware::RowOutcome`] and [`crate::domain::Exclusion`].

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for diskmap
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // External Utility Errors
    // =========================================================================
    #[error("Utility unavailable: {utility} - {reason}")]
    UtilityUnavailable { utility: String, reason: String },

    // =========================================================================
    // Input File Errors
    // =========================================================================
    #[error("Failed to read partition table {path}: {source}")]
    PartitionTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read grammar file {path}: {source}")]
    GrammarFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read rules file {path}: {source}")]
    RulesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::UtilityUnavailable`] for a program
    pub fn utility(utility: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UtilityUnavailable {
            utility: utility.into(),
            reason: reason.into(),
        }
    }

    /// Process exit status to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_) | Error::YamlParse(_) => 2,
            Error::UtilityUnavailable { .. } => 3,
            _ => 1,
        }
    }

    /// Check if this error came from an external program
    pub fn is_utility_failure(&self) -> bool {
        matches!(self, Error::UtilityUnavailable { .. })
    }
}

/// Result type alias for diskmap
pub type Result<T> = std::result::Result<T, Error>;
