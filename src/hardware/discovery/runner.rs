//! System Tool Runner
//!
//! Runs host utilities with `std::process::Command` and turns spawn
//! failures and non-zero exits into [`Error::UtilityUnavailable`].

use crate::domain::ports::ToolRunner;
use crate::error::{Error, Result};
use std::process::Command;
use tracing::trace;

/// [`ToolRunner`] backed by real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        trace!("Executing {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::utility(program, format!("failed to execute: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = match output.status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(Error::utility(
                program,
                format!("{}: {}", status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
