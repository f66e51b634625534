//! Filter hooks are process-wide, so every scenario lives in one test.

use frankenmock_harness::{
    TestGroup, TestRunner, TestState, TestStatus, UnitTest, clear_skip_filter, clear_test_filter,
    set_skip_filter, set_test_filter,
};
use frankenmock_membrane::fail_msg;

fn passes(_: &mut TestState) {}

fn fails(_: &mut TestState) {
    fail_msg("should not have run");
}

fn group() -> TestGroup {
    TestGroup::new("filters")
        .test(UnitTest::new("parse_ok", passes))
        .test(UnitTest::new("parse_slow", fails))
        .test(UnitTest::new("render_ok", passes))
}

fn names(statuses: &[(String, TestStatus)]) -> Vec<&str> {
    statuses.iter().map(|(n, _)| n.as_str()).collect()
}

fn run() -> Vec<(String, TestStatus)> {
    TestRunner::new("filters")
        .run_group(&group())
        .tests
        .into_iter()
        .map(|r| (r.name, r.status))
        .collect()
}

#[test]
fn filter_hooks_gate_scheduling_and_skipping() {
    let all = run();
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].1, TestStatus::Failed);

    set_test_filter(|name| name.starts_with("parse_"));
    let parsed = run();
    assert_eq!(names(&parsed), ["parse_ok", "parse_slow"]);

    set_skip_filter(|name| name.ends_with("_slow"));
    let quick = run();
    assert_eq!(quick[0].1, TestStatus::Passed);
    assert_eq!(quick[1].1, TestStatus::Skipped);

    clear_test_filter();
    let report = TestRunner::new("filters").run_group(&group());
    assert_eq!(report.tests.len(), 3);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.exit_code(), 0);

    clear_skip_filter();
    assert_eq!(run()[1].1, TestStatus::Failed);

    // A filter may rewire the hooks while it is being consulted.
    set_test_filter(|name| {
        if name == "render_ok" {
            clear_test_filter();
        }
        set_skip_filter(|name| name == "parse_slow");
        true
    });
    let rewired = run();
    assert_eq!(rewired.len(), 3);
    assert_eq!(rewired[1].1, TestStatus::Skipped);
    assert_eq!(run().len(), 3);
    clear_skip_filter();
}
