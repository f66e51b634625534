//! # frankenmock-membrane
//!
//! Runs one test at a time in isolation and exposes the calls that test
//! bodies and mock shims make while it runs.
//!
//! - [`boundary`]: the recovery boundary every test phase executes inside.
//! - [`signals`]: traps for fatal signals, redirected into the boundary.
//! - [`heap`] / [`allocator`]: the guarded heap and its injectable front end.
//! - [`context`]: the per-thread expectation context and failure text.
//! - [`mock`] / [`control`]: the API test code calls.
//! - [`isolation`]: setup, body, teardown and the post-run sweeps.
//!
//! Runtime switches come from the environment; see [`config`].

pub mod allocator;
pub mod boundary;
pub mod config;
pub mod context;
pub mod control;
pub mod heap;
pub mod isolation;
pub mod mock;
pub mod signals;

pub use allocator::{SystemHeap, TestAllocator, ThreadHeap};
pub use boundary::{Completion, Interrupt, RecoveryBoundary};
pub use config::{RuntimeConfig, SignalMode};
pub use context::TestContext;
pub use control::{expect_assert_failure, fail, fail_msg, mock_assert, skip, stop};
pub use heap::{Checkpoint, GuardedHeap, HeapError};
pub use isolation::{TestFn, TestReport, TestState, TestStatus, run_case, run_fixture, run_test};
pub use signals::SignalTraps;
