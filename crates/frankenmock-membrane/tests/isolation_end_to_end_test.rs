//! Drives small pieces of "production" code through mocks, injected
//! allocators and the isolation runtime together.

use frankenmock_core::Multiplicity;
use frankenmock_membrane::mock::{
    check_expected, check_expected_str, expect_function_call, expect_in_range, expect_string,
    expect_value, function_called, mock, mock_parameter, will_return, will_return_always,
    will_set_parameter,
};
use frankenmock_membrane::{
    TestAllocator, TestReport, TestStatus, ThreadHeap, expect_assert_failure, mock_assert,
    run_test,
};

// Code under test ----------------------------------------------------------

fn connect(host: &str, port: u16) -> i32 {
    check_expected_str("connect", "host", host);
    check_expected("connect", "port", port);
    function_called("connect");
    mock("connect")
}

fn read_config(key: &str, out: &mut i64) -> bool {
    check_expected_str("read_config", "key", key);
    function_called("read_config");
    *out = mock_parameter("read_config", "out");
    mock("read_config")
}

fn open_session(host: &str) -> Option<i64> {
    if connect(host, 443) < 0 {
        return None;
    }
    let mut timeout = 0;
    if !read_config("timeout", &mut timeout) {
        return None;
    }
    Some(timeout)
}

fn copy_name(alloc: &dyn TestAllocator, name: &[u8]) -> *mut u8 {
    mock_assert(!name.is_empty(), "!name.is_empty()");
    let p = alloc.allocate(name.len());
    // SAFETY: `p` holds `name.len()` bytes.
    unsafe { std::ptr::copy_nonoverlapping(name.as_ptr(), p, name.len()) };
    p
}

// Tests ----------------------------------------------------------------------

#[test]
fn session_opens_with_mocked_dependencies() {
    let report = run_test("open_session", || {
        expect_function_call("connect");
        expect_function_call("read_config");
        expect_string("connect", "host", "db.local");
        expect_in_range("connect", "port", 1, 1024);
        will_return("connect", 0_i32);
        expect_string("read_config", "key", "timeout");
        will_set_parameter("read_config", "out", 30_i64);
        will_return("read_config", true);

        assert_eq!(open_session("db.local"), Some(30));
    });
    assert_eq!(report.status, TestStatus::Passed, "{}", report.error);
}

#[test]
fn wrong_argument_fails_with_both_locations() {
    let report = run_test("bad_host", || {
        expect_string("connect", "host", "db.local");
        expect_value("connect", "port", 443_u16);
        will_return("connect", -1_i32);
        let _ = open_session("cache.local");
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.error.contains("parameter host of connect"), "{}", report.error);
    assert!(report.error.contains("expectation registered here"), "{}", report.error);
    assert!(report.error.contains("isolation_end_to_end_test.rs"), "{}", report.error);
}

#[test]
fn out_of_order_call_fails() {
    let report = run_test("order", || {
        expect_function_call("read_config");
        expect_function_call("connect");
        expect_value("connect", "port", 443_u16);
        expect_string("connect", "host", "h");
        will_return("connect", 0_i32);
        let _ = open_session("h");
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.error.contains("wrong call order"), "{}", report.error);
}

#[test]
fn always_return_survives_sweep() {
    let report = run_test("always", || {
        will_return_always("connect", 0_i32);
        for _ in 0..3 {
            let _: i32 = mock("connect");
        }
    });
    assert_eq!(report.status, TestStatus::Passed, "{}", report.error);
}

#[test]
fn unused_bounded_expectation_is_reported() {
    let report = run_test("unused", || {
        frankenmock_membrane::mock::will_return_count("connect", 0_i32, Multiplicity::Times(2));
        let _: i32 = mock("connect");
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.error.contains("connect"), "{}", report.error);
}

#[test]
fn leaked_copy_is_reported_with_allocation_site() {
    let report = run_test("leaky_copy", || {
        let _ = copy_name(&ThreadHeap, b"frank");
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.error.contains("5 bytes"), "{}", report.error);
    assert!(report.error.contains("leaked"), "{}", report.error);
}

#[test]
fn freed_copy_passes() {
    let report = run_test("freed_copy", || {
        let p = copy_name(&ThreadHeap, b"frank");
        // SAFETY: five bytes were copied in.
        assert_eq!(unsafe { std::slice::from_raw_parts(p, 5) }, b"frank");
        ThreadHeap.deallocate(p);
    });
    assert_eq!(report.status, TestStatus::Passed, "{}", report.error);
}

#[test]
fn invariant_check_is_trappable() {
    let report = run_test("empty_name", || {
        let fired = expect_assert_failure(|| {
            let _ = copy_name(&ThreadHeap, b"");
        });
        assert_eq!(fired, "!name.is_empty()");
    });
    assert_eq!(report.status, TestStatus::Passed, "{}", report.error);
}

#[test]
fn report_serializes_for_tooling() {
    let report = run_test("json", || {});
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["name"], "json");
    assert_eq!(json["status"], "passed");
    let back: TestReport = serde_json::from_value(json).unwrap();
    assert_eq!(back.status, TestStatus::Passed);
}
