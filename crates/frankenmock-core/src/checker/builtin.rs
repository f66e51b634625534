//! Built-in checkers.
//!
//! Integer checkers work in the `i128` domain so signed and unsigned capsules
//! compare by numeric value. Float checkers go through the two-tier epsilon
//! compare in [`super::float`]. Memory and string checkers own a snapshot of
//! the expected bytes taken when they were constructed.

use std::fmt;

use super::float::{double_compare, float_compare};
use super::{Argument, CheckResult, ParameterChecker};
use crate::value::Value;

/// Generic form: `predicate(actual, expected)` must hold.
#[derive(Clone, Copy)]
pub struct PredicateChecker {
    pub expected: Value,
    pub predicate: fn(Value, Value) -> bool,
    pub describe: &'static str,
}

impl fmt::Debug for PredicateChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateChecker")
            .field("expected", &self.expected)
            .field("describe", &self.describe)
            .finish()
    }
}

impl ParameterChecker for PredicateChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        if (self.predicate)(actual.value, self.expected) {
            Ok(())
        } else {
            Err(format!(
                "{} does not satisfy {} {}",
                actual.value, self.describe, self.expected
            ))
        }
    }
}

/// Numeric identity for integers, address identity for pointers.
fn values_match(actual: Value, expected: Value) -> Option<bool> {
    match (actual, expected) {
        (Value::Pointer(a), Value::Pointer(b)) => Some(std::ptr::eq(a, b)),
        (Value::Float(_) | Value::Double(_), Value::Float(_) | Value::Double(_)) => {
            Some(actual.bit_eq(&expected))
        }
        _ => Some(actual.as_i128()? == expected.as_i128()?),
    }
}

/// Exact (or negated exact) comparison for integers and pointers.
#[derive(Debug, Clone, Copy)]
pub struct ValueChecker {
    pub expected: Value,
    pub equal: bool,
}

impl ValueChecker {
    #[must_use]
    pub const fn equal(expected: Value) -> Self {
        Self {
            expected,
            equal: true,
        }
    }

    #[must_use]
    pub const fn not_equal(expected: Value) -> Self {
        Self {
            expected,
            equal: false,
        }
    }
}

impl ParameterChecker for ValueChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let Some(same) = values_match(actual.value, self.expected) else {
            return Err(format!(
                "{:?} value {} cannot be compared with {:?} value {}",
                actual.value.kind(),
                actual.value,
                self.expected.kind(),
                self.expected
            ));
        };
        match (same, self.equal) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!("{} != {}", actual.value, self.expected)),
            (true, false) => Err(format!("{} == {}", actual.value, self.expected)),
        }
    }
}

fn float_operand(value: Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("{:?} value {} is not a float", value.kind(), value))
}

/// Epsilon comparison. Single precision expectations compare in `f32`.
#[derive(Debug, Clone, Copy)]
pub struct FloatChecker {
    pub expected: Value,
    pub epsilon: f64,
    pub equal: bool,
}

impl FloatChecker {
    #[must_use]
    pub fn float(expected: f32, epsilon: f32, equal: bool) -> Self {
        Self {
            expected: Value::Float(expected),
            epsilon: f64::from(epsilon),
            equal,
        }
    }

    #[must_use]
    pub const fn double(expected: f64, epsilon: f64, equal: bool) -> Self {
        Self {
            expected: Value::Double(expected),
            epsilon,
            equal,
        }
    }

    fn close(&self, actual: Value) -> Result<bool, String> {
        match (actual, self.expected) {
            (Value::Float(a), Value::Float(e)) => Ok(float_compare(a, e, self.epsilon as f32)),
            _ => {
                let a = float_operand(actual)?;
                let e = float_operand(self.expected)?;
                Ok(double_compare(a, e, self.epsilon))
            }
        }
    }
}

impl ParameterChecker for FloatChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let close = self.close(actual.value)?;
        match (close, self.equal) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!(
                "{} != {} (epsilon {})",
                actual.value, self.expected, self.epsilon
            )),
            (true, false) => Err(format!(
                "{} == {} (epsilon {})",
                actual.value, self.expected, self.epsilon
            )),
        }
    }
}

/// Integer range, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct RangeChecker {
    pub minimum: i128,
    pub maximum: i128,
    pub inside: bool,
}

impl RangeChecker {
    #[must_use]
    pub const fn in_range(minimum: i128, maximum: i128) -> Self {
        Self {
            minimum,
            maximum,
            inside: true,
        }
    }

    #[must_use]
    pub const fn not_in_range(minimum: i128, maximum: i128) -> Self {
        Self {
            minimum,
            maximum,
            inside: false,
        }
    }
}

impl ParameterChecker for RangeChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let v = actual
            .value
            .as_i128()
            .ok_or_else(|| format!("{} is not an integer", actual.value))?;
        let within = (self.minimum..=self.maximum).contains(&v);
        match (within, self.inside) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!(
                "{v} is not within the range [{}, {}]",
                self.minimum, self.maximum
            )),
            (true, false) => Err(format!(
                "{v} is within the range [{}, {}]",
                self.minimum, self.maximum
            )),
        }
    }
}

/// Float range, inclusive on both ends with epsilon slack at the bounds.
#[derive(Debug, Clone, Copy)]
pub struct FloatRangeChecker {
    pub minimum: f64,
    pub maximum: f64,
    pub epsilon: f64,
    pub inside: bool,
}

impl ParameterChecker for FloatRangeChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let v = float_operand(actual.value)?;
        let above_min = v >= self.minimum || double_compare(v, self.minimum, self.epsilon);
        let below_max = v <= self.maximum || double_compare(v, self.maximum, self.epsilon);
        let within = above_min && below_max;
        match (within, self.inside) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!(
                "{v} is not within the range [{}, {}] (epsilon {})",
                self.minimum, self.maximum, self.epsilon
            )),
            (true, false) => Err(format!(
                "{v} is within the range [{}, {}] (epsilon {})",
                self.minimum, self.maximum, self.epsilon
            )),
        }
    }
}

fn render_set<T: fmt::Display>(set: &[T]) -> String {
    let items: Vec<String> = set.iter().map(ToString::to_string).collect();
    format!("{{{}}}", items.join(", "))
}

/// Integer set membership.
#[derive(Debug, Clone)]
pub struct SetChecker {
    pub set: Vec<i128>,
    pub member: bool,
}

impl SetChecker {
    pub fn in_set<I: IntoIterator<Item = i128>>(set: I) -> Self {
        Self {
            set: set.into_iter().collect(),
            member: true,
        }
    }

    pub fn not_in_set<I: IntoIterator<Item = i128>>(set: I) -> Self {
        Self {
            set: set.into_iter().collect(),
            member: false,
        }
    }
}

impl ParameterChecker for SetChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let v = actual
            .value
            .as_i128()
            .ok_or_else(|| format!("{} is not an integer", actual.value))?;
        let found = self.set.contains(&v);
        match (found, self.member) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!("{v} is not in the set {}", render_set(&self.set))),
            (true, false) => Err(format!("{v} is in the set {}", render_set(&self.set))),
        }
    }
}

/// Float set membership with epsilon.
#[derive(Debug, Clone)]
pub struct FloatSetChecker {
    pub set: Vec<f64>,
    pub epsilon: f64,
    pub member: bool,
}

impl ParameterChecker for FloatSetChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let v = float_operand(actual.value)?;
        let found = self.set.iter().any(|e| double_compare(v, *e, self.epsilon));
        match (found, self.member) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!(
                "{v} is not in the set {} (epsilon {})",
                render_set(&self.set),
                self.epsilon
            )),
            (true, false) => Err(format!(
                "{v} is in the set {} (epsilon {})",
                render_set(&self.set),
                self.epsilon
            )),
        }
    }
}

/// Byte-range comparison against a snapshot of the expected buffer.
#[derive(Debug, Clone)]
pub struct MemoryChecker {
    snapshot: Vec<u8>,
    equal: bool,
}

impl MemoryChecker {
    #[must_use]
    pub fn equal(expected: &[u8]) -> Self {
        Self {
            snapshot: expected.to_vec(),
            equal: true,
        }
    }

    #[must_use]
    pub fn not_equal(expected: &[u8]) -> Self {
        Self {
            snapshot: expected.to_vec(),
            equal: false,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }
}

impl ParameterChecker for MemoryChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let bytes = actual
            .bytes
            .ok_or_else(|| format!("{} has no byte view to compare", actual.value))?;
        let expected = self.snapshot.as_slice();
        let window = bytes.get(..expected.len());

        if self.equal {
            let Some(window) = window else {
                return Err(format!(
                    "buffer is {} bytes, expected at least {}",
                    bytes.len(),
                    expected.len()
                ));
            };
            let differing: Vec<usize> = window
                .iter()
                .zip(expected)
                .enumerate()
                .filter(|(_, (a, e))| a != e)
                .map(|(i, _)| i)
                .collect();
            match differing.first() {
                None => Ok(()),
                Some(&first) => Err(format!(
                    "{} of {} bytes differ, first at offset {first}: {:#04x} != {:#04x}",
                    differing.len(),
                    expected.len(),
                    window[first],
                    expected[first]
                )),
            }
        } else if window == Some(expected) {
            Err(format!("{} bytes are identical", expected.len()))
        } else {
            Ok(())
        }
    }
}

/// Exact string comparison.
#[derive(Debug, Clone)]
pub struct StringChecker {
    expected: String,
    equal: bool,
}

impl StringChecker {
    pub fn equal(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            equal: true,
        }
    }

    pub fn not_equal(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            equal: false,
        }
    }
}

impl ParameterChecker for StringChecker {
    fn check(&self, actual: &Argument<'_>) -> CheckResult {
        let bytes = actual
            .bytes
            .ok_or_else(|| format!("{} has no string view to compare", actual.value))?;
        let text = String::from_utf8_lossy(bytes);
        let same = bytes == self.expected.as_bytes();
        match (same, self.equal) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => Err(format!("{text:?} != {:?}", self.expected)),
            (true, false) => Err(format!("{text:?} == {:?}", self.expected)),
        }
    }
}

/// Accepts every argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyChecker;

impl ParameterChecker for AnyChecker {
    fn check(&self, _actual: &Argument<'_>) -> CheckResult {
        Ok(())
    }
}
