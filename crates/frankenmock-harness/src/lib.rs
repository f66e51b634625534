//! Group runner for frankenmock.
//!
//! This crate provides:
//! - [`TestRunner`]: runs [`TestGroup`]s with group and per-test fixtures,
//!   honours the process-wide filter hooks and reports per-group counts.
//! - [`structured_log`]: the JSONL run log the runner writes when an emitter
//!   is attached or `FRANKENMOCK_LOG_PATH` is set.

#![forbid(unsafe_code)]

pub mod runner;
pub mod structured_log;

pub use frankenmock_membrane::{TestFn, TestReport, TestState, TestStatus};
pub use runner::{
    GroupReport, TestGroup, TestRunner, UnitTest, clear_skip_filter, clear_test_filter,
    exit_code, set_skip_filter, set_test_filter,
};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, SharedBuffer};
