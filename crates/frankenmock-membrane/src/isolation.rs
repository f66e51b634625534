//! Isolated execution of one test.
//!
//! [`run_case`] gives a test its own expectation context and heap scope,
//! runs setup, body and teardown each inside a [`RecoveryBoundary`], then
//! sweeps leftover expectations and leaked blocks into the report.

use std::any::Any;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use frankenmock_core::SourceLocation;

use crate::allocator;
use crate::boundary::{Completion, Interrupt, RecoveryBoundary, panic_message};
use crate::config;
use crate::context::{self, record_failure, with_context};
use crate::signals::{SignalTraps, signal_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    NotStarted,
    Running,
    Passed,
    Failed,
    Error,
    Skipped,
}

impl TestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Failed and errored tests both count against the run.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one isolated test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    pub status: TestStatus,
    /// Accumulated failure text, one message per line. Empty on a clean pass.
    pub error: String,
    pub duration_ns: u64,
}

impl TestReport {
    #[must_use]
    pub fn new(name: impl Into<String>, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            status,
            error: String::new(),
            duration_ns: 0,
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Opaque state threaded through setup, body and teardown.
pub type TestState = Option<Box<dyn Any>>;

/// Fixture signature shared by setup and teardown.
pub type TestFn = fn(&mut TestState);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseEnd {
    Completed,
    Stopped,
    Skipped,
    Failed,
}

fn run_phase(phase: &str, f: impl FnOnce()) -> PhaseEnd {
    match RecoveryBoundary::new().run(f) {
        Completion::Returned(()) => PhaseEnd::Completed,
        Completion::Interrupted(Interrupt::Stopped) => PhaseEnd::Stopped,
        Completion::Interrupted(Interrupt::Skipped) => PhaseEnd::Skipped,
        Completion::Interrupted(Interrupt::Failed) => PhaseEnd::Failed,
        Completion::Interrupted(Interrupt::Signal(sig)) => {
            record_failure(format!("{phase}: received {} ({sig})", signal_name(sig)));
            PhaseEnd::Failed
        }
        Completion::Interrupted(Interrupt::AssertTrapped(expression)) => {
            record_failure(format!(
                "{phase}: assertion `{expression}` escaped expect_assert_failure"
            ));
            PhaseEnd::Failed
        }
        Completion::Panicked(payload) => {
            record_failure(format!(
                "{phase}: panicked: {}",
                panic_message(payload.as_ref())
            ));
            PhaseEnd::Failed
        }
    }
}

/// Run a test body with no fixtures.
pub fn run_test(name: &str, body: impl FnOnce()) -> TestReport {
    let mut state = None;
    run_case(name, &mut state, None, |_| body(), None)
}

/// Run one test with optional setup and teardown.
///
/// A setup that skips marks the test skipped. Any other setup failure marks
/// it errored, and neither body nor teardown runs. A teardown failure also
/// marks the test errored. Leftover expectations and leaked heap blocks turn
/// a passing or skipped test into a failed one.
pub fn run_case(
    name: &str,
    state: &mut TestState,
    setup: Option<TestFn>,
    body: impl FnOnce(&mut TestState),
    teardown: Option<TestFn>,
) -> TestReport {
    run_isolated(name, state, setup, body, teardown, HeapScope::Owned)
}

/// Run a group fixture in its own expectation context and boundary.
///
/// Heap blocks the fixture allocates stay live. The caller owns their scope,
/// usually from a checkpoint taken before the group setup until after the
/// group teardown.
pub fn run_fixture(name: &str, state: &mut TestState, fixture: TestFn) -> TestReport {
    run_isolated(name, state, None, fixture, None, HeapScope::Inherited)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeapScope {
    Owned,
    Inherited,
}

fn run_isolated(
    name: &str,
    state: &mut TestState,
    setup: Option<TestFn>,
    body: impl FnOnce(&mut TestState),
    teardown: Option<TestFn>,
    heap_scope: HeapScope,
) -> TestReport {
    let started = Instant::now();
    let previous = context::begin_test();
    let checkpoint = allocator::checkpoint();
    let mut status = TestStatus::Running;

    let traps = if config::signal_mode().traps_enabled() {
        match SignalTraps::install() {
            Ok(traps) => Some(traps),
            Err(err) => {
                record_failure(format!("failed to install signal handlers: {err}"));
                status = TestStatus::Error;
                None
            }
        }
    } else {
        None
    };

    if status == TestStatus::Running {
        let setup_ok = match setup {
            None => true,
            Some(setup) => match run_phase("setup", || setup(state)) {
                PhaseEnd::Completed | PhaseEnd::Stopped if !context::has_failed() => true,
                PhaseEnd::Skipped => {
                    status = TestStatus::Skipped;
                    false
                }
                _ => {
                    status = TestStatus::Error;
                    false
                }
            },
        };

        if setup_ok {
            status = match run_phase("test", || body(state)) {
                PhaseEnd::Skipped => TestStatus::Skipped,
                PhaseEnd::Failed => TestStatus::Failed,
                PhaseEnd::Completed | PhaseEnd::Stopped if context::has_failed() => {
                    TestStatus::Failed
                }
                PhaseEnd::Completed | PhaseEnd::Stopped => TestStatus::Passed,
            };

            if status == TestStatus::Skipped {
                with_context(|ctx| ctx.discard_expectations());
            } else {
                let leftovers = with_context(|ctx| ctx.sweep());
                if !leftovers.is_empty() {
                    with_context(|ctx| {
                        for leftover in &leftovers {
                            ctx.record(leftover.to_string());
                        }
                    });
                    status = TestStatus::Failed;
                }
            }

            if let Some(teardown) = teardown {
                let before = context::failure_count();
                match run_phase("teardown", || teardown(state)) {
                    PhaseEnd::Completed | PhaseEnd::Stopped | PhaseEnd::Skipped
                        if context::failure_count() == before => {}
                    _ => status = TestStatus::Error,
                }
            }
        } else {
            with_context(|ctx| ctx.discard_expectations());
        }
    }

    drop(traps);

    let leaks = match heap_scope {
        HeapScope::Owned => allocator::release_leaks(checkpoint, SourceLocation::unknown()),
        HeapScope::Inherited => Vec::new(),
    };
    if !leaks.is_empty() {
        with_context(|ctx| {
            for leak in &leaks {
                ctx.record(leak.to_string());
            }
        });
        if status != TestStatus::Error {
            status = TestStatus::Failed;
        }
    }

    let finished = context::end_test(previous);
    TestReport {
        name: name.to_string(),
        status,
        error: finished.error_text(),
        duration_ns: u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX),
    }
}
