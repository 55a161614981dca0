//! Process execution helpers.
//!
//! External commands go through the HAL so scripts can be tested without spawning
//! real processes.

use crate::HalResult;
use std::process::Output;
use std::time::Duration;

/// Process execution trait (external command runner).
pub trait ProcessOps {
    /// Run `argv[0]` with the remaining arguments and block until it exits, with no
    /// timeout. Returns the raw wait status.
    fn run_program(&self, argv: &[String]) -> HalResult<i32>;

    /// Run a helper command, killing it after `timeout`.
    fn command_output(&self, program: &str, args: &[&str], timeout: Duration)
        -> HalResult<Output>;

    /// Like [`ProcessOps::command_output`] but fails on a non-zero exit.
    fn command_status(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<()>;
}
