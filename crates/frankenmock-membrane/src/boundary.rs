//! Single-shot recovery boundary.
//!
//! A boundary brackets one closure. Anything inside that wants to abandon the
//! closure (a failed expectation, `skip()`, `stop()`, a trapped signal, an
//! assertion caught by the assertion trap) calls [`trigger`], which unwinds
//! with an [`Interrupt`] payload straight back to the innermost boundary on
//! this thread. The unwind uses `resume_unwind`, so the panic hook never sees
//! it and nothing is printed.
//!
//! Boundaries nest. Each thread tracks how many are armed so signal handlers
//! and failure primitives can tell whether a recovery point exists at all.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use crate::signals::SignalMask;

/// Why control left the bracketed closure early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// A failure was recorded; the test cannot continue.
    Failed,
    /// The test asked to be skipped.
    Skipped,
    /// The test asked to end now with its current verdict.
    Stopped,
    /// A fatal signal was trapped.
    Signal(i32),
    /// An invariant check fired while the assertion trap was armed.
    AssertTrapped(String),
}

/// How a boundary ended.
pub enum Completion<R> {
    Returned(R),
    Interrupted(Interrupt),
    /// An ordinary panic escaped the closure.
    Panicked(Box<dyn Any + Send>),
}

impl<R> std::fmt::Debug for Completion<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Returned(_) => f.write_str("Returned(..)"),
            Self::Interrupted(i) => f.debug_tuple("Interrupted").field(i).finish(),
            Self::Panicked(p) => f
                .debug_tuple("Panicked")
                .field(&panic_message(p.as_ref()))
                .finish(),
        }
    }
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// True when at least one boundary is armed on this thread.
#[must_use]
pub fn is_armed() -> bool {
    DEPTH.with(Cell::get) > 0
}

/// Unwind to the innermost boundary on this thread.
///
/// Must only be called while a boundary is armed; with none armed the
/// interrupt surfaces as an ordinary panic payload.
pub fn trigger(interrupt: Interrupt) -> ! {
    panic::resume_unwind(Box::new(interrupt))
}

/// Extract a printable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(interrupt) = payload.downcast_ref::<Interrupt>() {
        return format!("unhandled interrupt {interrupt:?}");
    }
    "<non-string panic payload>".to_string()
}

struct Armed;

impl Armed {
    fn new() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// A recovery point that can be entered exactly once.
#[derive(Debug, Default)]
pub struct RecoveryBoundary {
    _private: (),
}

impl RecoveryBoundary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with this boundary armed.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> Completion<R> {
        let mask = SignalMask::current();
        let outcome = {
            let _armed = Armed::new();
            panic::catch_unwind(AssertUnwindSafe(f))
        };
        match outcome {
            Ok(value) => Completion::Returned(value),
            Err(payload) => match payload.downcast::<Interrupt>() {
                Ok(interrupt) => {
                    if matches!(*interrupt, Interrupt::Signal(_))
                        && let Some(mask) = mask
                    {
                        mask.restore();
                    }
                    Completion::Interrupted(*interrupt)
                }
                Err(other) => Completion::Panicked(other),
            },
        }
    }
}
