use frankenmock_harness::structured_log::validate_log_file;
use frankenmock_harness::{LogEmitter, TestGroup, TestRunner, TestState, UnitTest, exit_code};
use frankenmock_membrane::mock::{check_expected, expect_value, function_called, expect_function_call};
use frankenmock_membrane::fail;

fn ping(seq: u32) {
    check_expected("ping", "seq", seq);
    function_called("ping");
}

fn pings_in_order(_: &mut TestState) {
    expect_function_call("ping");
    expect_function_call("ping");
    expect_value("ping", "seq", 1_u32);
    expect_value("ping", "seq", 2_u32);
    ping(1);
    ping(2);
}

fn pings_wrong_value(_: &mut TestState) {
    expect_value("ping", "seq", 1_u32);
    ping(9);
}

fn always_fails(_: &mut TestState) {
    fail();
}

#[test]
fn run_log_file_validates_and_exit_code_sums_groups() {
    let path = std::env::temp_dir().join(format!(
        "frankenmock-run-log-{}.jsonl",
        std::process::id()
    ));
    let emitter = LogEmitter::to_file(&path, "file").unwrap();
    let mut runner = TestRunner::new("file").with_emitter(emitter);

    let groups = [
        TestGroup::new("net")
            .test(UnitTest::new("pings_in_order", pings_in_order))
            .test(UnitTest::new("pings_wrong_value", pings_wrong_value)),
        TestGroup::new("misc").test(UnitTest::new("always_fails", always_fails)),
    ];
    let reports = runner.run_groups(&groups);
    assert!(runner.take_log_error().is_none());
    drop(runner);

    assert_eq!(reports[0].passed(), 1);
    assert_eq!(reports[0].failed(), 1);
    assert_eq!(exit_code(&reports), 2);

    let (lines, errors) = validate_log_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(errors.is_empty(), "{errors:?}");
    // group_start + 2 × (test_start, test_end) + group_end, then 4 for misc.
    assert_eq!(lines, 10);
}
