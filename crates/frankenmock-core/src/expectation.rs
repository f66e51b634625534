//! Consumption engine.
//!
//! [`ExpectationBook`] owns the three stores a test registers into:
//!
//! | Store | Key | Payload |
//! |-------|-----|---------|
//! | returns | `[function]` | value handed back by the mock |
//! | outputs | `[function, name]` | value written through an output parameter |
//! | checks | `[function, parameter]` | checker run against the actual argument |
//!
//! Return and output values carry an optional type label. Consumption with a
//! requested label compares it against the stored one before anything is
//! consumed, so a mismatch leaves the queue untouched and names the site that
//! registered the offending value.

use std::fmt;
use std::rc::Rc;

use crate::checker::{Argument, ParameterChecker};
use crate::error::{LeftoverKind, MockError};
use crate::location::SourceLocation;
use crate::multiplicity::Multiplicity;
use crate::symbol_store::{Consumed, SymbolStore, symbol_name};
use crate::value::{FromValue, IntoValue, Value};

/// A capsule plus the type label of the value it was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledValue {
    pub value: Value,
    pub label: Option<&'static str>,
}

impl LabeledValue {
    pub fn of<T: IntoValue>(value: T) -> Self {
        Self {
            value: value.into_value(),
            label: Some(T::type_label()),
        }
    }

    #[must_use]
    pub const fn untyped(value: Value) -> Self {
        Self { value, label: None }
    }
}

fn check_label(
    symbol: &[&str],
    stored: &LabeledValue,
    requested: Option<&str>,
    location: SourceLocation,
) -> Result<(), MockError> {
    match (requested, stored.label) {
        (Some(requested), Some(registered)) if requested != registered => {
            Err(MockError::TypeMismatch {
                symbol: symbol_name(symbol),
                requested: requested.to_string(),
                registered: registered.to_string(),
                location,
            })
        }
        _ => Ok(()),
    }
}

/// Decode a consumed value into `T`, failing when the capsule cannot hold it.
pub fn decode<T: FromValue>(
    symbol: &[&str],
    consumed: &Consumed<LabeledValue>,
) -> Result<T, MockError> {
    T::from_value(consumed.value.value).ok_or_else(|| MockError::Undecodable {
        symbol: symbol_name(symbol),
        requested: T::type_label().to_string(),
        location: consumed.location,
    })
}

/// A checker taken off the queue, ready to run against an argument.
#[derive(Clone)]
pub struct PendingCheck {
    pub checker: Rc<dyn ParameterChecker>,
    pub location: SourceLocation,
}

impl fmt::Debug for PendingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCheck")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl PendingCheck {
    /// Run the checker. `site` is where the argument was checked.
    pub fn run(
        &self,
        function: &str,
        parameter: &str,
        actual: &Argument<'_>,
        site: SourceLocation,
    ) -> Result<(), MockError> {
        self.checker
            .check(actual)
            .map_err(|detail| MockError::CheckFailed {
                function: function.to_string(),
                parameter: parameter.to_string(),
                detail,
                site,
                location: self.location,
            })
    }
}

/// The per-test set of return, output and check queues.
#[derive(Default)]
pub struct ExpectationBook {
    returns: SymbolStore<LabeledValue>,
    outputs: SymbolStore<LabeledValue>,
    checks: SymbolStore<Rc<dyn ParameterChecker>>,
}

impl fmt::Debug for ExpectationBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationBook")
            .field("returns", &self.returns.queued())
            .field("outputs", &self.outputs.queued())
            .field("checks", &self.checks.queued())
            .finish()
    }
}

impl ExpectationBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty() && self.outputs.is_empty() && self.checks.is_empty()
    }

    pub fn will_return(
        &mut self,
        function: &str,
        value: LabeledValue,
        multiplicity: Multiplicity,
        location: SourceLocation,
    ) -> Result<(), MockError> {
        self.returns
            .insert(&[function], value, multiplicity, location)
    }

    pub fn next_return(
        &mut self,
        function: &str,
        label: Option<&str>,
    ) -> Result<Consumed<LabeledValue>, MockError> {
        Self::take_labeled(&mut self.returns, &[function], label)
    }

    pub fn will_set_parameter(
        &mut self,
        function: &str,
        name: &str,
        value: LabeledValue,
        multiplicity: Multiplicity,
        location: SourceLocation,
    ) -> Result<(), MockError> {
        self.outputs
            .insert(&[function, name], value, multiplicity, location)
    }

    pub fn next_parameter(
        &mut self,
        function: &str,
        name: &str,
        label: Option<&str>,
    ) -> Result<Consumed<LabeledValue>, MockError> {
        Self::take_labeled(&mut self.outputs, &[function, name], label)
    }

    pub fn expect_check(
        &mut self,
        function: &str,
        parameter: &str,
        checker: Rc<dyn ParameterChecker>,
        multiplicity: Multiplicity,
        location: SourceLocation,
    ) -> Result<(), MockError> {
        self.checks
            .insert(&[function, parameter], checker, multiplicity, location)
    }

    /// Dequeue the next checker for `function.parameter`. The book is not
    /// borrowed while the returned check runs, so checkers may register
    /// further expectations.
    pub fn next_check(&mut self, function: &str, parameter: &str) -> Result<PendingCheck, MockError> {
        let consumed = self.checks.consume(&[function, parameter])?;
        Ok(PendingCheck {
            checker: consumed.value,
            location: consumed.location,
        })
    }

    fn take_labeled(
        store: &mut SymbolStore<LabeledValue>,
        path: &[&str],
        label: Option<&str>,
    ) -> Result<Consumed<LabeledValue>, MockError> {
        if let Some(front) = store.peek(path) {
            check_label(path, &front.value, label, front.location)?;
        }
        store.consume(path)
    }

    /// Teardown sweep over all three stores. Every store is drained whether
    /// or not leftovers were found.
    pub fn finish(&mut self) -> Vec<MockError> {
        let mut errors = Vec::new();
        errors.extend(
            self.returns
                .sweep()
                .into_iter()
                .map(|l| l.into_error(LeftoverKind::ReturnValue)),
        );
        errors.extend(
            self.outputs
                .sweep()
                .into_iter()
                .map(|l| l.into_error(LeftoverKind::OutputParameter)),
        );
        errors.extend(
            self.checks
                .sweep()
                .into_iter()
                .map(|l| l.into_error(LeftoverKind::ParameterCheck)),
        );
        errors
    }

    pub fn clear(&mut self) {
        self.returns.clear();
        self.outputs.clear();
        self.checks.clear();
    }
}
