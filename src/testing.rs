//! Test doubles shared by unit tests

use crate::domain::ports::ToolRunner;
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// [`ToolRunner`] serving canned stdout; unknown invocations fail like a
/// missing utility
#[derive(Debug, Default)]
pub struct FakeRunner {
    exact: HashMap<(String, Vec<String>), String>,
    any_args: HashMap<String, String>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `output` for this exact program and argument list
    pub fn with_output(mut self, program: &str, args: Vec<String>, output: &str) -> Self {
        self.exact
            .insert((program.to_string(), args), output.to_string());
        self
    }

    /// Serve `output` for any invocation of `program`
    pub fn with_any_args(mut self, program: &str, output: &str) -> Self {
        self.any_args
            .insert(program.to_string(), output.to_string());
        self
    }

    /// Invocations seen so far, in order
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.calls
            .borrow_mut()
            .push((program.to_string(), args.clone()));

        self.exact
            .get(&(program.to_string(), args))
            .or_else(|| self.any_args.get(program))
            .cloned()
            .ok_or_else(|| Error::utility(program, "failed to execute: No such file or directory"))
    }
}
