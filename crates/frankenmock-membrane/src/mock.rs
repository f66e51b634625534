//! Mock-shim API.
//!
//! Test bodies register expectations with the `will_*` / `expect_*`
//! functions; mock implementations consume them with [`mock`],
//! [`mock_parameter`], the `check_expected*` family and [`function_called`].
//! Every function records the caller's location, and any engine error
//! becomes a failure of the current test.
//!
//! ```ignore
//! fn read_sensor(channel: u8) -> i32 {
//!     check_expected("read_sensor", "channel", channel);
//!     function_called("read_sensor");
//!     mock("read_sensor")
//! }
//!
//! expect_function_call("read_sensor");
//! expect_in_range("read_sensor", "channel", 0, 3);
//! will_return("read_sensor", 42_i32);
//! assert_eq!(read_sensor(2), 42);
//! ```

use std::rc::Rc;

use frankenmock_core::checker::{
    AnyChecker, FloatChecker, FloatRangeChecker, FloatSetChecker, MemoryChecker, RangeChecker,
    SetChecker, StringChecker, ValueChecker,
};
use frankenmock_core::expectation::decode;
use frankenmock_core::{
    Argument, FromValue, IntoValue, LabeledValue, Multiplicity, ParameterChecker, SourceLocation,
    Value,
};

use crate::context::{check, fail_with, with_context};

// ---------------------------------------------------------------------------
// Return values
// ---------------------------------------------------------------------------

#[track_caller]
pub fn will_return<T: IntoValue>(function: &str, value: T) {
    will_return_count(function, value, Multiplicity::ONCE);
}

#[track_caller]
pub fn will_return_count<T: IntoValue>(function: &str, value: T, count: Multiplicity) {
    let at = SourceLocation::caller();
    check(with_context(|ctx| {
        ctx.book
            .will_return(function, LabeledValue::of(value), count, at)
    }));
}

/// Return `value` on every call; at least one call is required.
#[track_caller]
pub fn will_return_always<T: IntoValue>(function: &str, value: T) {
    will_return_count(function, value, Multiplicity::Always);
}

/// Return `value` on every call; calls are optional.
#[track_caller]
pub fn will_return_maybe<T: IntoValue>(function: &str, value: T) {
    will_return_count(function, value, Multiplicity::Maybe);
}

/// Queue an untyped capsule; consumers skip the type-label check.
#[track_caller]
pub fn will_return_value(function: &str, value: Value, count: Multiplicity) {
    let at = SourceLocation::caller();
    check(with_context(|ctx| {
        ctx.book
            .will_return(function, LabeledValue::untyped(value), count, at)
    }));
}

/// Next queued return value for `function`, checked against `T`'s label.
#[track_caller]
pub fn mock<T: FromValue>(function: &str) -> T {
    let consumed = check(with_context(|ctx| {
        ctx.book.next_return(function, Some(T::type_label()))
    }));
    check(decode(&[function], &consumed))
}

/// Next queued return value for `function`, as a raw capsule.
#[track_caller]
pub fn mock_value(function: &str) -> Value {
    let consumed = check(with_context(|ctx| ctx.book.next_return(function, None)));
    consumed.value.value
}

// ---------------------------------------------------------------------------
// Output parameters
// ---------------------------------------------------------------------------

#[track_caller]
pub fn will_set_parameter<T: IntoValue>(function: &str, name: &str, value: T) {
    will_set_parameter_count(function, name, value, Multiplicity::ONCE);
}

#[track_caller]
pub fn will_set_parameter_count<T: IntoValue>(
    function: &str,
    name: &str,
    value: T,
    count: Multiplicity,
) {
    let at = SourceLocation::caller();
    check(with_context(|ctx| {
        ctx.book
            .will_set_parameter(function, name, LabeledValue::of(value), count, at)
    }));
}

#[track_caller]
pub fn mock_parameter<T: FromValue>(function: &str, name: &str) -> T {
    let consumed = check(with_context(|ctx| {
        ctx.book
            .next_parameter(function, name, Some(T::type_label()))
    }));
    check(decode(&[function, name], &consumed))
}

// ---------------------------------------------------------------------------
// Parameter checks
// ---------------------------------------------------------------------------

/// Register any checker (closures included) for `function.parameter`.
#[track_caller]
pub fn expect_check<C>(function: &str, parameter: &str, checker: C, count: Multiplicity)
where
    C: ParameterChecker + 'static,
{
    let at = SourceLocation::caller();
    check(with_context(|ctx| {
        ctx.book
            .expect_check(function, parameter, Rc::new(checker), count, at)
    }));
}

#[track_caller]
pub fn expect_value<T: IntoValue>(function: &str, parameter: &str, value: T) {
    expect_value_count(function, parameter, value, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_value_count<T: IntoValue>(
    function: &str,
    parameter: &str,
    value: T,
    count: Multiplicity,
) {
    let checker = ValueChecker::equal(value.into_value());
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_not_value<T: IntoValue>(function: &str, parameter: &str, value: T) {
    expect_not_value_count(function, parameter, value, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_value_count<T: IntoValue>(
    function: &str,
    parameter: &str,
    value: T,
    count: Multiplicity,
) {
    let checker = ValueChecker::not_equal(value.into_value());
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_in_range(
    function: &str,
    parameter: &str,
    minimum: impl Into<i128>,
    maximum: impl Into<i128>,
) {
    expect_in_range_count(function, parameter, minimum, maximum, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_in_range_count(
    function: &str,
    parameter: &str,
    minimum: impl Into<i128>,
    maximum: impl Into<i128>,
    count: Multiplicity,
) {
    let checker = RangeChecker::in_range(minimum.into(), maximum.into());
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_not_in_range(
    function: &str,
    parameter: &str,
    minimum: impl Into<i128>,
    maximum: impl Into<i128>,
) {
    expect_not_in_range_count(function, parameter, minimum, maximum, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_in_range_count(
    function: &str,
    parameter: &str,
    minimum: impl Into<i128>,
    maximum: impl Into<i128>,
    count: Multiplicity,
) {
    let checker = RangeChecker::not_in_range(minimum.into(), maximum.into());
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_in_set<I>(function: &str, parameter: &str, values: I)
where
    I: IntoIterator,
    I::Item: Into<i128>,
{
    expect_in_set_count(function, parameter, values, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_in_set_count<I>(function: &str, parameter: &str, values: I, count: Multiplicity)
where
    I: IntoIterator,
    I::Item: Into<i128>,
{
    let checker = SetChecker::in_set(values.into_iter().map(Into::into));
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_not_in_set<I>(function: &str, parameter: &str, values: I)
where
    I: IntoIterator,
    I::Item: Into<i128>,
{
    expect_not_in_set_count(function, parameter, values, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_in_set_count<I>(function: &str, parameter: &str, values: I, count: Multiplicity)
where
    I: IntoIterator,
    I::Item: Into<i128>,
{
    let checker = SetChecker::not_in_set(values.into_iter().map(Into::into));
    expect_check(function, parameter, checker, count);
}

// ---------------------------------------------------------------------------
// Floating point
// ---------------------------------------------------------------------------

#[track_caller]
pub fn expect_float(function: &str, parameter: &str, value: f32, epsilon: f32) {
    expect_float_count(function, parameter, value, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_float_count(
    function: &str,
    parameter: &str,
    value: f32,
    epsilon: f32,
    count: Multiplicity,
) {
    let checker = FloatChecker::float(value, epsilon, true);
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_not_float(function: &str, parameter: &str, value: f32, epsilon: f32) {
    expect_not_float_count(function, parameter, value, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_float_count(
    function: &str,
    parameter: &str,
    value: f32,
    epsilon: f32,
    count: Multiplicity,
) {
    let checker = FloatChecker::float(value, epsilon, false);
    expect_check(function, parameter, checker, count);
}

/// Single-precision range check. Bounds and epsilon widen losslessly to `f64`.
#[track_caller]
pub fn expect_float_in_range(
    function: &str,
    parameter: &str,
    minimum: f32,
    maximum: f32,
    epsilon: f32,
) {
    expect_double_in_range_count(
        function,
        parameter,
        f64::from(minimum),
        f64::from(maximum),
        f64::from(epsilon),
        Multiplicity::ONCE,
    );
}

#[track_caller]
pub fn expect_float_not_in_range(
    function: &str,
    parameter: &str,
    minimum: f32,
    maximum: f32,
    epsilon: f32,
) {
    expect_double_not_in_range_count(
        function,
        parameter,
        f64::from(minimum),
        f64::from(maximum),
        f64::from(epsilon),
        Multiplicity::ONCE,
    );
}

#[track_caller]
pub fn expect_float_in_set(function: &str, parameter: &str, values: &[f32], epsilon: f32) {
    let widened: Vec<f64> = values.iter().copied().map(f64::from).collect();
    expect_double_in_set_count(
        function,
        parameter,
        &widened,
        f64::from(epsilon),
        Multiplicity::ONCE,
    );
}

#[track_caller]
pub fn expect_float_not_in_set(function: &str, parameter: &str, values: &[f32], epsilon: f32) {
    let widened: Vec<f64> = values.iter().copied().map(f64::from).collect();
    expect_double_not_in_set_count(
        function,
        parameter,
        &widened,
        f64::from(epsilon),
        Multiplicity::ONCE,
    );
}

#[track_caller]
pub fn expect_double(function: &str, parameter: &str, value: f64, epsilon: f64) {
    expect_double_count(function, parameter, value, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_double_count(
    function: &str,
    parameter: &str,
    value: f64,
    epsilon: f64,
    count: Multiplicity,
) {
    let checker = FloatChecker::double(value, epsilon, true);
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_not_double(function: &str, parameter: &str, value: f64, epsilon: f64) {
    expect_not_double_count(function, parameter, value, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_double_count(
    function: &str,
    parameter: &str,
    value: f64,
    epsilon: f64,
    count: Multiplicity,
) {
    let checker = FloatChecker::double(value, epsilon, false);
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_double_in_range(
    function: &str,
    parameter: &str,
    minimum: f64,
    maximum: f64,
    epsilon: f64,
) {
    expect_double_in_range_count(function, parameter, minimum, maximum, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_double_in_range_count(
    function: &str,
    parameter: &str,
    minimum: f64,
    maximum: f64,
    epsilon: f64,
    count: Multiplicity,
) {
    let checker = FloatRangeChecker {
        minimum,
        maximum,
        epsilon,
        inside: true,
    };
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_double_not_in_range(
    function: &str,
    parameter: &str,
    minimum: f64,
    maximum: f64,
    epsilon: f64,
) {
    expect_double_not_in_range_count(
        function,
        parameter,
        minimum,
        maximum,
        epsilon,
        Multiplicity::ONCE,
    );
}

#[track_caller]
pub fn expect_double_not_in_range_count(
    function: &str,
    parameter: &str,
    minimum: f64,
    maximum: f64,
    epsilon: f64,
    count: Multiplicity,
) {
    let checker = FloatRangeChecker {
        minimum,
        maximum,
        epsilon,
        inside: false,
    };
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_double_in_set(function: &str, parameter: &str, values: &[f64], epsilon: f64) {
    expect_double_in_set_count(function, parameter, values, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_double_in_set_count(
    function: &str,
    parameter: &str,
    values: &[f64],
    epsilon: f64,
    count: Multiplicity,
) {
    let checker = FloatSetChecker {
        set: values.to_vec(),
        epsilon,
        member: true,
    };
    expect_check(function, parameter, checker, count);
}

#[track_caller]
pub fn expect_double_not_in_set(function: &str, parameter: &str, values: &[f64], epsilon: f64) {
    expect_double_not_in_set_count(function, parameter, values, epsilon, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_double_not_in_set_count(
    function: &str,
    parameter: &str,
    values: &[f64],
    epsilon: f64,
    count: Multiplicity,
) {
    let checker = FloatSetChecker {
        set: values.to_vec(),
        epsilon,
        member: false,
    };
    expect_check(function, parameter, checker, count);
}

// ---------------------------------------------------------------------------
// Memory and strings
// ---------------------------------------------------------------------------

/// The expected bytes are copied now; `expected` need not outlive the check.
#[track_caller]
pub fn expect_memory(function: &str, parameter: &str, expected: &[u8]) {
    expect_memory_count(function, parameter, expected, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_memory_count(function: &str, parameter: &str, expected: &[u8], count: Multiplicity) {
    expect_check(function, parameter, MemoryChecker::equal(expected), count);
}

#[track_caller]
pub fn expect_not_memory(function: &str, parameter: &str, expected: &[u8]) {
    expect_not_memory_count(function, parameter, expected, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_memory_count(
    function: &str,
    parameter: &str,
    expected: &[u8],
    count: Multiplicity,
) {
    expect_check(function, parameter, MemoryChecker::not_equal(expected), count);
}

#[track_caller]
pub fn expect_string(function: &str, parameter: &str, expected: &str) {
    expect_string_count(function, parameter, expected, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_string_count(function: &str, parameter: &str, expected: &str, count: Multiplicity) {
    expect_check(function, parameter, StringChecker::equal(expected), count);
}

#[track_caller]
pub fn expect_not_string(function: &str, parameter: &str, expected: &str) {
    expect_not_string_count(function, parameter, expected, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_not_string_count(
    function: &str,
    parameter: &str,
    expected: &str,
    count: Multiplicity,
) {
    expect_check(function, parameter, StringChecker::not_equal(expected), count);
}

#[track_caller]
pub fn expect_any(function: &str, parameter: &str) {
    expect_any_count(function, parameter, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_any_count(function: &str, parameter: &str, count: Multiplicity) {
    expect_check(function, parameter, AnyChecker, count);
}

/// Run the next queued check for `function.parameter` against `actual`.
///
/// The context is not borrowed while the checker runs.
#[track_caller]
pub fn check_expected_argument(function: &str, parameter: &str, actual: &Argument<'_>) {
    let site = SourceLocation::caller();
    let pending = check(with_context(|ctx| ctx.book.next_check(function, parameter)));
    if let Err(err) = pending.run(function, parameter, actual, site) {
        fail_with(err.to_string());
    }
}

#[track_caller]
pub fn check_expected<T: IntoValue>(function: &str, parameter: &str, actual: T) {
    check_expected_argument(function, parameter, &Argument::scalar(actual.into_value()));
}

#[track_caller]
pub fn check_expected_value(function: &str, parameter: &str, actual: Value) {
    check_expected_argument(function, parameter, &Argument::scalar(actual));
}

#[track_caller]
pub fn check_expected_bytes(function: &str, parameter: &str, actual: &[u8]) {
    check_expected_argument(function, parameter, &Argument::bytes(actual));
}

#[track_caller]
pub fn check_expected_str(function: &str, parameter: &str, actual: &str) {
    check_expected_argument(function, parameter, &Argument::text(actual));
}

// ---------------------------------------------------------------------------
// Call ordering
// ---------------------------------------------------------------------------

#[track_caller]
pub fn expect_function_call(function: &str) {
    expect_function_calls_count(function, Multiplicity::ONCE);
}

#[track_caller]
pub fn expect_function_calls(function: &str, times: u32) {
    expect_function_calls_count(function, Multiplicity::Times(times));
}

/// Expect one or more calls.
#[track_caller]
pub fn expect_function_call_any(function: &str) {
    expect_function_calls_count(function, Multiplicity::Always);
}

/// Allow any number of calls, including none, without blocking the order.
#[track_caller]
pub fn ignore_function_calls(function: &str) {
    expect_function_calls_count(function, Multiplicity::Maybe);
}

#[track_caller]
pub fn expect_function_calls_count(function: &str, count: Multiplicity) {
    let at = SourceLocation::caller();
    check(with_context(|ctx| ctx.calls.expect_call(function, count, at)));
}

/// Report that `function` is being called now.
#[track_caller]
pub fn function_called(function: &str) {
    let site = SourceLocation::caller();
    check(with_context(|ctx| ctx.calls.notify_called(function, site)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{Completion, Interrupt, RecoveryBoundary};
    use crate::context::{begin_test, end_test};

    fn in_test(body: impl FnOnce()) -> (bool, String) {
        let previous = begin_test();
        let done = RecoveryBoundary::new().run(body);
        let mut ctx = end_test(previous);
        for leftover in ctx.sweep() {
            ctx.record(leftover.to_string());
        }
        let ok = matches!(done, Completion::Returned(())) && !ctx.has_failed();
        (ok, ctx.error_text())
    }

    fn sensor(channel: u8) -> i32 {
        check_expected("sensor", "channel", channel);
        function_called("sensor");
        mock("sensor")
    }

    #[test]
    fn return_once_then_missing() {
        let (ok, text) = in_test(|| {
            will_return("F", 42_i32);
            assert_eq!(mock::<i32>("F"), 42);
            let _: i32 = mock("F");
        });
        assert!(!ok);
        assert!(text.contains("no entries for symbol F"), "{text}");
    }

    #[test]
    fn typed_return_rejects_other_width() {
        let (ok, text) = in_test(|| {
            will_return("F", 7_i32);
            let _: i64 = mock("F");
        });
        assert!(!ok);
        assert!(text.contains("requested i64"), "{text}");
    }

    #[test]
    fn full_shim_round_trip() {
        let (ok, text) = in_test(|| {
            expect_function_call("sensor");
            expect_in_range("sensor", "channel", 0, 3);
            will_return("sensor", 42_i32);
            assert_eq!(sensor(2), 42);
        });
        assert!(ok, "{text}");
    }

    #[test]
    fn failing_check_cites_registration_line() {
        let line = line!() + 2;
        let (ok, text) = in_test(|| {
            expect_value("sensor", "channel", 1_u8);
            will_return("sensor", 0_i32);
            expect_function_call("sensor");
            sensor(2);
        });
        assert!(!ok);
        let note = format!("mock.rs:{line}: note: expectation registered here");
        assert!(text.contains(&note), "{text}");
    }

    #[test]
    fn output_parameters_and_byte_checks() {
        let (ok, text) = in_test(|| {
            will_set_parameter("stat", "size", 512_u64);
            expect_memory("write", "buf", b"hello");
            expect_string("open", "path", "/tmp/x");

            assert_eq!(mock_parameter::<u64>("stat", "size"), 512);
            check_expected_bytes("write", "buf", b"hello");
            check_expected_str("open", "path", "/tmp/x");
        });
        assert!(ok, "{text}");
    }

    #[test]
    fn leftover_return_values_fail_at_sweep() {
        let (ok, text) = in_test(|| will_return_always("poll", 1_i32));
        assert!(!ok);
        assert!(text.contains("poll has remaining non-returned values"), "{text}");
    }

    #[test]
    fn maybe_values_never_leak() {
        let (ok, _) = in_test(|| {
            will_return_maybe("poll", 1_i32);
            expect_any_count("poll", "fd", Multiplicity::Maybe);
            ignore_function_calls("log");
        });
        assert!(ok);
    }

    #[test]
    fn custom_checker_may_queue_return_value() {
        let (ok, text) = in_test(|| {
            expect_check(
                "double",
                "x",
                |arg: &Argument<'_>| -> frankenmock_core::CheckResult {
                    let x = arg.value.as_i128().unwrap_or_default() as i64;
                    will_return("double", x * 2);
                    Ok(())
                },
                Multiplicity::ONCE,
            );
            check_expected("double", "x", 21_i64);
            assert_eq!(mock::<i64>("double"), 42);
        });
        assert!(ok, "{text}");
    }

    #[test]
    fn byte_and_string_checks_accept_any_multiplicity() {
        let (ok, text) = in_test(|| {
            expect_string_count("open", "path", "/etc/hosts", Multiplicity::Always);
            expect_memory_count("write", "buf", b"ok", Multiplicity::Times(2));
            for _ in 0..3 {
                check_expected_str("open", "path", "/etc/hosts");
            }
            check_expected_bytes("write", "buf", b"ok");
            check_expected_bytes("write", "buf", b"ok");
        });
        assert!(ok, "{text}");

        let (ok, text) = in_test(|| {
            expect_not_string_count("open", "path", "/dev/null", Multiplicity::Maybe);
            expect_not_memory_count("write", "buf", b"\0", Multiplicity::Maybe);
        });
        assert!(ok, "{text}");
    }

    #[test]
    fn always_string_check_never_consumed_is_left_over() {
        let (ok, text) = in_test(|| {
            expect_string_count("open", "path", "/etc/hosts", Multiplicity::Always);
        });
        assert!(!ok);
        assert!(text.contains("open.path"), "{text}");
    }

    #[test]
    fn set_and_float_checks_accept_counts() {
        let (ok, text) = in_test(|| {
            expect_in_set_count("seek", "whence", [0_i32, 1, 2], Multiplicity::Always);
            expect_not_value_count("seek", "fd", -1_i32, Multiplicity::Always);
            expect_double_count("scale", "factor", 0.5, 1e-9, Multiplicity::Times(2));
            expect_double_in_set_count("scale", "bias", &[0.0, 1.0], 1e-9, Multiplicity::Maybe);

            check_expected("seek", "whence", 2_i32);
            check_expected("seek", "fd", 3_i32);
            check_expected("seek", "whence", 0_i32);
            check_expected("seek", "fd", 4_i32);
            check_expected("scale", "factor", 0.5_f64);
            check_expected("scale", "factor", 0.5_f64);
        });
        assert!(ok, "{text}");
    }

    #[test]
    fn single_precision_range_and_set_checks() {
        let (ok, text) = in_test(|| {
            expect_float_in_range("gain", "db", -6.0, 6.0, 1e-4);
            expect_float_not_in_range("gain", "db", -1.0, 1.0, 1e-4);
            expect_float_in_set("gain", "db", &[0.25, 0.5], 1e-4);
            expect_float_not_in_set("gain", "db", &[0.25, 0.5], 1e-4);

            check_expected("gain", "db", 6.0_f32);
            check_expected("gain", "db", 3.5_f32);
            check_expected("gain", "db", 0.5_f32);
            check_expected("gain", "db", 0.75_f32);
        });
        assert!(ok, "{text}");

        let (ok, _) = in_test(|| {
            expect_float_in_range("gain", "db", -6.0, 6.0, 1e-4);
            check_expected("gain", "db", 7.5_f32);
        });
        assert!(!ok);
    }

    #[test]
    fn out_of_order_call_fails() {
        let previous = begin_test();
        let done = RecoveryBoundary::new().run(|| {
            expect_function_call("A");
            expect_function_call("B");
            function_called("B");
        });
        assert!(matches!(done, Completion::Interrupted(Interrupt::Failed)));
        let text = end_test(previous).error_text();
        assert!(text.contains("wrong call order: expected A"), "{text}");
    }
}
