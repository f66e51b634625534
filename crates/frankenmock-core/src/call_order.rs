//! Call-ordering verifier.
//!
//! A flat FIFO of expected calls, independent from the argument stores.
//! [`CallOrderQueue::notify_called`] scans from the head and may step over
//! entries that no longer block: MAYBE entries and ALWAYS entries that were
//! already hit once. The first entry that still owes a call is a hard stop;
//! when it names a different function the call is out of order. Among entries
//! for the same function the earliest one is consumed.

use crate::error::{LeftoverKind, MockError};
use crate::list::OrderedList;
use crate::location::SourceLocation;
use crate::multiplicity::{Multiplicity, Tally};

#[derive(Debug, Clone)]
struct ExpectedCall {
    function: String,
    tally: Tally,
    location: SourceLocation,
}

#[derive(Debug, Default)]
pub struct CallOrderQueue {
    calls: OrderedList<ExpectedCall>,
}

impl CallOrderQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            calls: OrderedList::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn expect_call(
        &mut self,
        function: &str,
        multiplicity: Multiplicity,
        location: SourceLocation,
    ) -> Result<(), MockError> {
        let multiplicity = multiplicity.validate()?;
        self.calls.push_back(ExpectedCall {
            function: function.to_string(),
            tally: Tally::new(multiplicity),
            location,
        });
        Ok(())
    }

    /// Record that `function` was just called from `site`.
    pub fn notify_called(&mut self, function: &str, site: SourceLocation) -> Result<(), MockError> {
        let mut cursor = self.calls.front();
        while let Some(handle) = cursor {
            let Some(call) = self.calls.get_mut(handle) else {
                break;
            };
            if call.function == function {
                if call.tally.consume().exhausted {
                    self.calls.remove(handle);
                }
                return Ok(());
            }
            if call.tally.is_outstanding() {
                return Err(MockError::CallOrder {
                    function: function.to_string(),
                    expected: call.function.clone(),
                    expected_at: call.location,
                    site,
                });
            }
            cursor = self.calls.next(handle);
        }
        Err(MockError::UnexpectedCall {
            function: function.to_string(),
            site,
        })
    }

    /// Teardown sweep: report every entry still owed a call, then drain.
    pub fn finish(&mut self) -> Vec<MockError> {
        let errors = self
            .calls
            .iter()
            .filter(|(_, call)| call.tally.is_outstanding())
            .map(|(_, call)| MockError::Leftover {
                kind: LeftoverKind::Call,
                symbol: call.function.clone(),
                location: call.location,
            })
            .collect();
        self.calls.clear();
        errors
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: SourceLocation = SourceLocation::new("order.rs", 5);
    const SITE: SourceLocation = SourceLocation::new("code.rs", 77);

    fn queue(entries: &[(&str, Multiplicity)]) -> CallOrderQueue {
        let mut q = CallOrderQueue::new();
        for (name, m) in entries {
            q.expect_call(name, *m, AT).unwrap();
        }
        q
    }

    #[test]
    fn in_order_calls_drain_the_queue() {
        let mut q = queue(&[("A", Multiplicity::ONCE), ("B", Multiplicity::ONCE)]);
        q.notify_called("A", SITE).unwrap();
        q.notify_called("B", SITE).unwrap();
        assert!(q.is_empty());
        assert!(q.finish().is_empty());
    }

    #[test]
    fn out_of_order_call_names_the_blocking_entry() {
        let mut q = queue(&[("A", Multiplicity::ONCE), ("B", Multiplicity::ONCE)]);
        assert_eq!(
            q.notify_called("B", SITE),
            Err(MockError::CallOrder {
                function: "B".into(),
                expected: "A".into(),
                expected_at: AT,
                site: SITE,
            })
        );
    }

    #[test]
    fn call_on_empty_queue_is_unexpected() {
        let mut q = CallOrderQueue::new();
        assert!(matches!(
            q.notify_called("A", SITE),
            Err(MockError::UnexpectedCall { .. })
        ));
    }

    #[test]
    fn ignored_entries_are_stepped_over() {
        let mut q = queue(&[
            ("log", Multiplicity::Maybe),
            ("open", Multiplicity::ONCE),
            ("close", Multiplicity::ONCE),
        ]);
        q.notify_called("open", SITE).unwrap();
        q.notify_called("log", SITE).unwrap();
        q.notify_called("log", SITE).unwrap();
        q.notify_called("close", SITE).unwrap();
        assert!(q.finish().is_empty());
    }

    #[test]
    fn unhit_always_entry_blocks_until_called() {
        let mut q = queue(&[("poll", Multiplicity::Always), ("read", Multiplicity::ONCE)]);
        assert!(matches!(
            q.notify_called("read", SITE),
            Err(MockError::CallOrder { .. })
        ));
        q.notify_called("poll", SITE).unwrap();
        q.notify_called("read", SITE).unwrap();
        q.notify_called("poll", SITE).unwrap();
        assert!(q.finish().is_empty());
    }

    #[test]
    fn same_name_entries_are_consumed_fifo() {
        let mut q = CallOrderQueue::new();
        q.expect_call("A", Multiplicity::ONCE, SourceLocation::new("a.rs", 1))
            .unwrap();
        q.expect_call("A", Multiplicity::ONCE, SourceLocation::new("a.rs", 2))
            .unwrap();
        q.notify_called("A", SITE).unwrap();
        let left = q.finish();
        assert_eq!(
            left,
            vec![MockError::Leftover {
                kind: LeftoverKind::Call,
                symbol: "A".into(),
                location: SourceLocation::new("a.rs", 2),
            }]
        );
    }

    #[test]
    fn counted_expectation_reports_remaining_calls() {
        let mut q = queue(&[("tick", Multiplicity::Times(3))]);
        q.notify_called("tick", SITE).unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.finish().len(), 1);
        assert!(q.is_empty());
    }
}
