//! # frankenmock-core
//!
//! The expectation engine behind frankenmock.
//!
//! Test code queues return values, output parameters, parameter checks and
//! expected call orderings; mock shims consume them while the code under test
//! runs. Everything in this crate is plain data plus policy: it never unwinds,
//! never touches signals and never allocates through the guarded heap. The
//! isolation runtime in `frankenmock-membrane` turns the `Err` values produced
//! here into test failures.
//!
//! No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod call_order;
pub mod checker;
pub mod error;
pub mod expectation;
pub mod list;
pub mod location;
pub mod multiplicity;
pub mod symbol_store;
pub mod value;

pub use call_order::CallOrderQueue;
pub use checker::{Argument, CheckResult, ParameterChecker};
pub use error::{LeftoverKind, MockError};
pub use expectation::{ExpectationBook, LabeledValue, PendingCheck};
pub use list::{NodeHandle, OrderedList};
pub use location::SourceLocation;
pub use multiplicity::{EXPECT_ALWAYS, EXPECT_MAYBE, Multiplicity, Tally};
pub use symbol_store::{Consumed, Leftover, StoredValue, SymbolStore};
pub use value::{FromValue, IntoValue, Value, ValueKind};
