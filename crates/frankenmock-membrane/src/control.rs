//! Explicit control calls available to test bodies and code under test.

use std::cell::Cell;
use std::panic;

use frankenmock_core::SourceLocation;

use crate::boundary::{self, Completion, Interrupt, RecoveryBoundary};
use crate::context::fail_with;

thread_local! {
    static ASSERT_TRAP: Cell<usize> = const { Cell::new(0) };
}

/// Fail the current test.
#[track_caller]
pub fn fail() -> ! {
    fail_with(format!("{}: test failed", SourceLocation::caller()))
}

/// Fail the current test with a message.
#[track_caller]
pub fn fail_msg(message: impl AsRef<str>) -> ! {
    fail_with(format!("{}: {}", SourceLocation::caller(), message.as_ref()))
}

/// Skip the current test. Leftover expectations are discarded.
pub fn skip() -> ! {
    boundary::trigger(Interrupt::Skipped)
}

/// End the current test now. It passes unless a failure was already recorded.
pub fn stop() -> ! {
    boundary::trigger(Interrupt::Stopped)
}

/// True while [`expect_assert_failure`] is waiting for an assertion.
#[must_use]
pub fn assert_trap_armed() -> bool {
    ASSERT_TRAP.with(Cell::get) > 0
}

/// Invariant check for code under test.
///
/// Inside [`expect_assert_failure`] a false `result` jumps back to the
/// trap. Anywhere else it fails the test.
#[track_caller]
pub fn mock_assert(result: bool, expression: &str) {
    if result {
        return;
    }
    if assert_trap_armed() {
        boundary::trigger(Interrupt::AssertTrapped(expression.to_string()));
    }
    fail_with(format!(
        "{}: assertion `{expression}` failed",
        SourceLocation::caller()
    ))
}

struct TrapArmed;

impl TrapArmed {
    fn new() -> Self {
        ASSERT_TRAP.with(|t| t.set(t.get() + 1));
        Self
    }
}

impl Drop for TrapArmed {
    fn drop(&mut self) {
        ASSERT_TRAP.with(|t| t.set(t.get().saturating_sub(1)));
    }
}

/// Run `f`, requiring it to trip [`mock_assert`]. Returns the text of the
/// assertion that fired. Anything else that interrupts `f` is passed on to
/// the enclosing boundary.
#[track_caller]
pub fn expect_assert_failure(f: impl FnOnce()) -> String {
    let site = SourceLocation::caller();
    let done = {
        let _armed = TrapArmed::new();
        RecoveryBoundary::new().run(f)
    };
    match done {
        Completion::Interrupted(Interrupt::AssertTrapped(expression)) => expression,
        Completion::Returned(()) => fail_with(format!("{site}: expected assertion not raised")),
        Completion::Interrupted(other) => boundary::trigger(other),
        Completion::Panicked(payload) => panic::resume_unwind(payload),
    }
}
