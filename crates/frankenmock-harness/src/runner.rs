//! Group execution engine.

use std::io;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use frankenmock_core::SourceLocation;
use frankenmock_membrane::allocator;
use frankenmock_membrane::config::RuntimeConfig;
use frankenmock_membrane::{TestFn, TestReport, TestState, TestStatus, run_case, run_fixture};

use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

type NameFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

static TEST_FILTER: RwLock<Option<NameFilter>> = parking_lot::const_rwlock(None);
static SKIP_FILTER: RwLock<Option<NameFilter>> = parking_lot::const_rwlock(None);

/// Only tests whose name satisfies `filter` are scheduled.
pub fn set_test_filter(filter: impl Fn(&str) -> bool + Send + Sync + 'static) {
    *TEST_FILTER.write() = Some(Arc::new(filter));
}

pub fn clear_test_filter() {
    *TEST_FILTER.write() = None;
}

/// Tests whose name satisfies `filter` are reported skipped without running.
pub fn set_skip_filter(filter: impl Fn(&str) -> bool + Send + Sync + 'static) {
    *SKIP_FILTER.write() = Some(Arc::new(filter));
}

pub fn clear_skip_filter() {
    *SKIP_FILTER.write() = None;
}

// The guard is released before the filter runs, so a filter may itself
// install or clear hooks.
fn current(hook: &RwLock<Option<NameFilter>>) -> Option<NameFilter> {
    hook.read().clone()
}

fn scheduled(name: &str) -> bool {
    current(&TEST_FILTER).is_none_or(|f| f(name))
}

fn skipped_by_filter(name: &str) -> bool {
    current(&SKIP_FILTER).is_some_and(|f| f(name))
}

/// One registered test.
#[derive(Debug, Clone)]
pub struct UnitTest {
    pub name: String,
    pub body: TestFn,
    pub setup: Option<TestFn>,
    pub teardown: Option<TestFn>,
}

impl UnitTest {
    #[must_use]
    pub fn new(name: impl Into<String>, body: TestFn) -> Self {
        Self {
            name: name.into(),
            body,
            setup: None,
            teardown: None,
        }
    }

    #[must_use]
    pub fn with_setup(mut self, setup: TestFn) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_teardown(mut self, teardown: TestFn) -> Self {
        self.teardown = Some(teardown);
        self
    }
}

/// Tests run in order, sharing one state produced by the group setup.
#[derive(Debug, Clone)]
pub struct TestGroup {
    pub name: String,
    pub tests: Vec<UnitTest>,
    pub setup: Option<TestFn>,
    pub teardown: Option<TestFn>,
}

impl TestGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            setup: None,
            teardown: None,
        }
    }

    #[must_use]
    pub fn test(mut self, test: UnitTest) -> Self {
        self.tests.push(test);
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: TestFn) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_teardown(mut self, teardown: TestFn) -> Self {
        self.teardown = Some(teardown);
        self
    }
}

/// Results of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: String,
    /// One report per scheduled test, in order.
    pub tests: Vec<TestReport>,
    /// Present only when the group teardown did not complete cleanly.
    pub teardown_failure: Option<TestReport>,
}

impl GroupReport {
    fn count(&self, status: TestStatus) -> usize {
        self.tests.iter().filter(|t| t.status == status).count()
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    /// Errored tests, plus one for a failed group teardown.
    #[must_use]
    pub fn errored(&self) -> usize {
        self.count(TestStatus::Error) + usize::from(self.teardown_failure.is_some())
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.failed() + self.errored()).unwrap_or(i32::MAX)
    }
}

/// Process exit code for a whole run: failed plus errored, over all groups.
#[must_use]
pub fn exit_code(reports: &[GroupReport]) -> i32 {
    reports
        .iter()
        .fold(0_i32, |acc, r| acc.saturating_add(r.exit_code()))
}

/// Runs groups and writes the run log.
#[derive(Debug)]
pub struct TestRunner {
    /// Identifier stamped into every trace id.
    pub run_id: String,
    emitter: Option<LogEmitter>,
    log_error: Option<io::Error>,
}

impl TestRunner {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            emitter: None,
            log_error: None,
        }
    }

    /// Attach a log file when `FRANKENMOCK_LOG_PATH` is set.
    pub fn from_env(run_id: impl Into<String>) -> io::Result<Self> {
        let runner = Self::new(run_id);
        match RuntimeConfig::from_env().log_path {
            Some(path) => {
                let emitter = LogEmitter::to_file(&path, &runner.run_id)?;
                Ok(runner.with_emitter(emitter))
            }
            None => Ok(runner),
        }
    }

    #[must_use]
    pub fn with_emitter(mut self, emitter: LogEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// The first write error hit by the log, if any. Logging stops after it.
    pub fn take_log_error(&mut self) -> Option<io::Error> {
        self.log_error.take()
    }

    fn log(&mut self, entry: impl FnOnce() -> LogEntry) {
        let Some(emitter) = self.emitter.as_mut() else {
            return;
        };
        if let Err(err) = emitter.emit_entry(entry()) {
            self.emitter = None;
            self.log_error = Some(err);
        }
    }

    fn log_test_end(&mut self, group: &str, report: &TestReport) {
        let outcome = Outcome::from_status(report.status).unwrap_or(Outcome::Error);
        self.log(|| {
            LogEntry::new("", outcome.level(), "test_end")
                .with_group(group)
                .with_test(&report.name)
                .with_outcome(outcome)
                .with_duration_ns(report.duration_ns)
                .with_error(&report.error)
        });
    }

    /// Run every scheduled test of `group`.
    pub fn run_group(&mut self, group: &TestGroup) -> GroupReport {
        let selected: Vec<&UnitTest> = group.tests.iter().filter(|t| scheduled(&t.name)).collect();
        self.log(|| {
            LogEntry::new("", LogLevel::Info, "group_start")
                .with_group(&group.name)
                .with_details(serde_json::json!({ "scheduled": selected.len() }))
        });

        let mut report = GroupReport {
            group: group.name.clone(),
            ..GroupReport::default()
        };
        let mut state: TestState = None;
        let checkpoint = allocator::checkpoint();

        let setup_report = group
            .setup
            .map(|setup| run_fixture("group_setup", &mut state, setup));
        let blocked = setup_report.as_ref().and_then(|r| match r.status {
            TestStatus::Passed => None,
            TestStatus::Skipped => Some((TestStatus::Skipped, String::new())),
            _ => Some((
                TestStatus::Error,
                format!("group setup failed:\n{}", r.error),
            )),
        });

        for test in selected {
            self.log(|| {
                LogEntry::new("", LogLevel::Info, "test_start")
                    .with_group(&group.name)
                    .with_test(&test.name)
            });
            let result = if let Some((status, error)) = &blocked {
                let mut r = TestReport::new(&test.name, *status);
                r.error.clone_from(error);
                r
            } else if skipped_by_filter(&test.name) {
                TestReport::new(&test.name, TestStatus::Skipped)
            } else {
                run_case(&test.name, &mut state, test.setup, test.body, test.teardown)
            };
            self.log_test_end(&group.name, &result);
            report.tests.push(result);
        }

        if blocked.is_none()
            && let Some(teardown) = group.teardown
        {
            let r = run_fixture("group_teardown", &mut state, teardown);
            if r.status != TestStatus::Passed {
                report.teardown_failure = Some(r);
            }
        }

        // Blocks from the group fixtures are scoped to the whole group.
        let leaks = allocator::release_leaks(checkpoint, SourceLocation::unknown());
        if !leaks.is_empty() {
            let failure = report
                .teardown_failure
                .get_or_insert_with(|| TestReport::new("group_teardown", TestStatus::Error));
            failure.status = TestStatus::Error;
            for leak in &leaks {
                if !failure.error.is_empty() {
                    failure.error.push('\n');
                }
                failure.error.push_str(&leak.to_string());
            }
        }

        let counts = serde_json::json!({
            "passed": report.passed(),
            "failed": report.failed(),
            "errored": report.errored(),
            "skipped": report.skipped(),
        });
        let code = report.exit_code();
        let level = if code == 0 { LogLevel::Info } else { LogLevel::Warn };
        self.log(|| {
            LogEntry::new("", level, "group_end")
                .with_group(&group.name)
                .with_exit_code(code)
                .with_details(counts)
        });
        if let Some(emitter) = self.emitter.as_mut()
            && let Err(err) = emitter.flush()
        {
            self.emitter = None;
            self.log_error = Some(err);
        }
        report
    }

    /// Run groups in order.
    pub fn run_groups(&mut self, groups: &[TestGroup]) -> Vec<GroupReport> {
        groups.iter().map(|g| self.run_group(g)).collect()
    }
}
