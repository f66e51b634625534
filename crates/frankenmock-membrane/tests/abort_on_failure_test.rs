//! Abort mode ends the whole process, so the failing test runs in a child
//! copy of this binary.

use std::os::unix::process::ExitStatusExt;
use std::process::Command;

use frankenmock_membrane::config::ENV_ABORT_ON_FAIL;
use frankenmock_membrane::{fail_msg, run_test};

const CHILD_MARKER: &str = "FRANKENMOCK_ABORT_TEST_CHILD";
const MESSAGE: &str = "ledger total drifted by 3";

#[test]
fn failure_aborts_the_process_with_its_message() {
    if std::env::var_os(CHILD_MARKER).is_some() {
        run_test("aborting", || fail_msg(MESSAGE));
        return;
    }

    let exe = std::env::current_exe().unwrap();
    let output = Command::new(exe)
        .args([
            "--exact",
            "failure_aborts_the_process_with_its_message",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CHILD_MARKER, "1")
        .env(ENV_ABORT_ON_FAIL, "1")
        .output()
        .unwrap();

    assert!(!output.status.success(), "{:?}", output.status);
    assert_eq!(output.status.signal(), Some(libc::SIGABRT), "{:?}", output.status);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(MESSAGE), "{stderr}");
}
