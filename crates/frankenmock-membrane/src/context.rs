//! Per-test context.
//!
//! Each thread has one current [`TestContext`] holding the expectation book,
//! the call-ordering queue and the accumulated failure text. The isolation
//! runtime swaps in a fresh context when a test starts and swaps the previous
//! one back when it ends, so nested runs never see each other's state.
//!
//! Borrows of the context are always released before control leaves through
//! the recovery boundary.

use std::cell::RefCell;
use std::io::Write;

use frankenmock_core::{CallOrderQueue, ExpectationBook, MockError};

use crate::boundary::{self, Interrupt};
use crate::config;

#[derive(Debug, Default)]
pub struct TestContext {
    pub(crate) book: ExpectationBook,
    pub(crate) calls: CallOrderQueue,
    errors: Vec<String>,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any failure has been recorded.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.errors.len()
    }

    /// All recorded failure messages, one per line.
    #[must_use]
    pub fn error_text(&self) -> String {
        self.errors.join("\n")
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Drain both expectation stores and return what was left over.
    pub fn sweep(&mut self) -> Vec<MockError> {
        let mut leftovers = self.book.finish();
        leftovers.extend(self.calls.finish());
        leftovers
    }

    /// Drop all queued expectations without reporting them.
    pub fn discard_expectations(&mut self) {
        self.book.clear();
        self.calls.clear();
    }
}

thread_local! {
    static CURRENT: RefCell<TestContext> = RefCell::new(TestContext::new());
}

/// Run `f` against the current context.
pub fn with_context<R>(f: impl FnOnce(&mut TestContext) -> R) -> R {
    CURRENT.with(|c| f(&mut c.borrow_mut()))
}

/// Install a fresh context, returning the one it replaces.
#[must_use]
pub fn begin_test() -> TestContext {
    CURRENT.with(|c| std::mem::take(&mut *c.borrow_mut()))
}

/// Reinstate `previous`, returning the context of the test that just ended.
pub fn end_test(previous: TestContext) -> TestContext {
    CURRENT.with(|c| std::mem::replace(&mut *c.borrow_mut(), previous))
}

/// Append a failure message to the current test without interrupting it.
pub fn record_failure(message: impl Into<String>) {
    with_context(|ctx| ctx.record(message));
}

#[must_use]
pub fn has_failed() -> bool {
    with_context(|ctx| ctx.has_failed())
}

#[must_use]
pub fn failure_count() -> usize {
    with_context(|ctx| ctx.failure_count())
}

/// Record `message` and abandon the current test.
///
/// With abort-on-failure enabled the accumulated text is written to stderr
/// and the process aborts. Outside any recovery boundary the failure
/// surfaces as an ordinary panic.
pub fn fail_with(message: impl Into<String>) -> ! {
    let message = message.into();
    record_failure(message.clone());
    if config::abort_on_failure() {
        let text = with_context(|ctx| ctx.error_text());
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{text}");
        let _ = stderr.flush();
        std::process::abort();
    }
    if boundary::is_armed() {
        boundary::trigger(Interrupt::Failed);
    }
    panic!("{message}");
}

/// Unwrap an engine result, failing the test on `Err`.
pub fn check<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fail_with(err.to_string()),
    }
}
