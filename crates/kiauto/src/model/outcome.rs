//! What a completed operation reports back.

use crate::model::{violation_exit_code, Tool};
use serde::Serialize;
use std::path::PathBuf;

/// Result of an operation that ran to completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Tool that produced the result.
    pub tool: Tool,
    /// Errors found by the check (0 for exports).
    pub errors: u32,
    /// Warnings found by the check (0 for exports).
    pub warnings: u32,
    /// Number of problems that fail the run under the requested options.
    pub failing: u32,
    /// File produced by the tool (report or export).
    pub artifact: PathBuf,
}

impl Outcome {
    /// Process exit status for this result: 0 or a violation code.
    pub fn exit_status(&self) -> i32 {
        violation_exit_code(self.failing)
    }
}
