//! Parameter checker framework.
//!
//! A checker validates one actual parameter against whatever expectation it
//! captured at registration time. Every built-in checker goes through the same
//! [`ParameterChecker`] interface, so the consumption engine never needs to
//! know which comparison it is running.
//!
//! Checkers receive an [`Argument`]: the parameter's capsule plus, for memory
//! and string parameters, a borrowed byte view supplied by the shim. The
//! engine itself never dereferences the capsule's pointer.

pub mod builtin;
pub mod float;

pub use builtin::{
    AnyChecker, FloatChecker, FloatRangeChecker, FloatSetChecker, MemoryChecker,
    PredicateChecker, RangeChecker, SetChecker, StringChecker, ValueChecker,
};
pub use float::{double_compare, float_compare};

use crate::value::Value;

/// Outcome of a single check. `Err` carries a human readable reason.
pub type CheckResult = Result<(), String>;

/// The actual value of a parameter as seen by a checker.
#[derive(Debug, Clone, Copy)]
pub struct Argument<'a> {
    pub value: Value,
    pub bytes: Option<&'a [u8]>,
}

impl<'a> Argument<'a> {
    #[must_use]
    pub const fn scalar(value: Value) -> Self {
        Self { value, bytes: None }
    }

    /// A buffer parameter: the capsule holds its address, `bytes` its contents.
    #[must_use]
    pub fn bytes(bytes: &'a [u8]) -> Self {
        Self {
            value: Value::Pointer(bytes.as_ptr().cast()),
            bytes: Some(bytes),
        }
    }

    #[must_use]
    pub fn text(text: &'a str) -> Self {
        Self::bytes(text.as_bytes())
    }
}

/// A predicate over one actual parameter.
pub trait ParameterChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult;
}

impl<F> ParameterChecker for F
where
    F: Fn(&Argument<'_>) -> CheckResult,
{
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        self(actual)
    }
}
