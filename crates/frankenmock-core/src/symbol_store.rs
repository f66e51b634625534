//! Hierarchical symbol store.
//!
//! Maps a path of string keys (`[function]` or `[function, parameter]`) to a
//! FIFO of stored values. Each level of the path is itself a store whose
//! entries point at the next level; the deepest level holds the value queue.
//! An entry whose queue (or sub-store) becomes empty is unlinked immediately,
//! so the tree never carries empty branches.
//!
//! Lookups are linear scans with string equality. Key cardinality per test is
//! small, and insertion order doubles as the reporting order for leftovers.

use crate::error::{LeftoverKind, MockError};
use crate::list::OrderedList;
use crate::location::SourceLocation;
use crate::multiplicity::{Multiplicity, Tally};

/// One queued value and its consumption bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredValue<T> {
    pub value: T,
    pub tally: Tally,
    pub location: SourceLocation,
}

/// Result of [`SymbolStore::consume`].
#[derive(Debug, Clone)]
pub struct Consumed<T> {
    pub value: T,
    pub remaining: Multiplicity,
    pub location: SourceLocation,
}

/// An entry still owed a consumption when the store is swept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leftover {
    pub symbol: String,
    pub multiplicity: Multiplicity,
    pub location: SourceLocation,
}

impl Leftover {
    #[must_use]
    pub fn into_error(self, kind: LeftoverKind) -> MockError {
        MockError::Leftover {
            kind,
            symbol: self.symbol,
            location: self.location,
        }
    }
}

#[derive(Debug)]
enum Level<T> {
    Branch(SymbolStore<T>),
    Leaf(OrderedList<StoredValue<T>>),
}

impl<T> Level<T> {
    fn is_empty(&self) -> bool {
        match self {
            Self::Branch(store) => store.is_empty(),
            Self::Leaf(queue) => queue.is_empty(),
        }
    }
}

#[derive(Debug)]
struct SymbolEntry<T> {
    name: String,
    level: Level<T>,
}

/// Path-keyed store of value queues.
#[derive(Debug)]
pub struct SymbolStore<T> {
    entries: OrderedList<SymbolEntry<T>>,
}

impl<T> Default for SymbolStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Display form of a key path: `function` or `function.parameter`.
#[must_use]
pub fn symbol_name(path: &[&str]) -> String {
    path.join(".")
}

impl<T> SymbolStore<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: OrderedList::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue `value` at the end of `path`, creating missing levels.
    pub fn insert(
        &mut self,
        path: &[&str],
        value: T,
        multiplicity: Multiplicity,
        location: SourceLocation,
    ) -> Result<(), MockError> {
        if path.is_empty() {
            return Err(MockError::EmptyPath);
        }
        let multiplicity = multiplicity.validate()?;
        let stored = StoredValue {
            value,
            tally: Tally::new(multiplicity),
            location,
        };
        self.insert_at(path, path, stored)
    }

    fn insert_at(
        &mut self,
        path: &[&str],
        full_path: &[&str],
        stored: StoredValue<T>,
    ) -> Result<(), MockError> {
        let Some((head, rest)) = path.split_first() else {
            return Err(MockError::EmptyPath);
        };
        let entry = self.entries.find_or_insert_with(
            |e| e.name == *head,
            || SymbolEntry {
                name: (*head).to_string(),
                level: if rest.is_empty() {
                    Level::Leaf(OrderedList::new())
                } else {
                    Level::Branch(SymbolStore::new())
                },
            },
        );
        match (&mut entry.level, rest.is_empty()) {
            (Level::Leaf(queue), true) => {
                queue.push_back(stored);
                Ok(())
            }
            (Level::Branch(inner), false) => inner.insert_at(rest, full_path, stored),
            _ => Err(MockError::PathDepth {
                symbol: symbol_name(full_path),
            }),
        }
    }

    /// First queued value at `path`, without consuming it.
    #[must_use]
    pub fn peek(&self, path: &[&str]) -> Option<&StoredValue<T>> {
        let (head, rest) = path.split_first()?;
        let handle = self.entries.find(|e| e.name == *head)?;
        match &self.entries.get(handle)?.level {
            Level::Leaf(queue) if rest.is_empty() => {
                queue.front().and_then(|front| queue.get(front))
            }
            Level::Branch(inner) if !rest.is_empty() => inner.peek(rest),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, path: &[&str]) -> bool {
        self.peek(path).is_some()
    }

    /// Number of queued values across the whole tree.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, e)| match &e.level {
                Level::Branch(inner) => inner.queued(),
                Level::Leaf(queue) => queue.len(),
            })
            .sum()
    }
}

impl<T: Clone> SymbolStore<T> {
    /// Take the first value at `path`, decrementing its multiplicity and
    /// pruning the node and any emptied levels.
    pub fn consume(&mut self, path: &[&str]) -> Result<Consumed<T>, MockError> {
        if path.is_empty() {
            return Err(MockError::EmptyPath);
        }
        self.consume_at(path, path)
    }

    fn consume_at(&mut self, path: &[&str], full_path: &[&str]) -> Result<Consumed<T>, MockError> {
        let missing = || MockError::MissingEntry {
            symbol: symbol_name(full_path),
        };
        let Some((head, rest)) = path.split_first() else {
            return Err(MockError::EmptyPath);
        };
        let handle = self.entries.find(|e| e.name == *head).ok_or_else(missing)?;
        let entry = self.entries.get_mut(handle).ok_or_else(missing)?;

        let consumed = match &mut entry.level {
            Level::Branch(inner) if !rest.is_empty() => inner.consume_at(rest, full_path)?,
            Level::Leaf(queue) if rest.is_empty() => {
                let front = queue.front().ok_or_else(missing)?;
                let node = queue.get_mut(front).ok_or_else(missing)?;
                let step = node.tally.consume();
                let out = Consumed {
                    value: node.value.clone(),
                    remaining: step.remaining,
                    location: node.location,
                };
                if step.exhausted {
                    queue.remove(front);
                }
                out
            }
            _ => {
                return Err(MockError::PathDepth {
                    symbol: symbol_name(full_path),
                });
            }
        };

        if entry.level.is_empty() {
            self.entries.remove(handle);
        }
        Ok(consumed)
    }
}

impl<T> SymbolStore<T> {
    /// Drop unbounded entries whose obligation is met: ALWAYS values consumed
    /// at least once and every MAYBE value. Emptied levels are pruned.
    pub fn prune_satisfied(&mut self) {
        self.entries.retain(|entry| {
            match &mut entry.level {
                Level::Branch(inner) => inner.prune_satisfied(),
                Level::Leaf(queue) => queue.retain(|v| !v.tally.is_satisfied_unbounded()),
            }
            !entry.level.is_empty()
        });
    }

    /// Entries still owed a consumption, in registration order per symbol.
    #[must_use]
    pub fn leftovers(&self) -> Vec<Leftover> {
        let mut out = Vec::new();
        self.collect_leftovers(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leftovers<'a>(&'a self, prefix: &mut Vec<&'a str>, out: &mut Vec<Leftover>) {
        for (_, entry) in self.entries.iter() {
            prefix.push(entry.name.as_str());
            match &entry.level {
                Level::Branch(inner) => inner.collect_leftovers(prefix, out),
                Level::Leaf(queue) => {
                    for (_, v) in queue.iter() {
                        if v.tally.is_outstanding() {
                            out.push(Leftover {
                                symbol: symbol_name(prefix),
                                multiplicity: v.tally.multiplicity(),
                                location: v.location,
                            });
                        }
                    }
                }
            }
            prefix.pop();
        }
    }

    /// Teardown sweep: prune satisfied entries, report what is left, then
    /// drain the store so the next test starts empty.
    pub fn sweep(&mut self) -> Vec<Leftover> {
        self.prune_satisfied();
        let leftovers = self.leftovers();
        self.clear();
        leftovers
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERE: SourceLocation = SourceLocation::new("symbol_store.rs", 1);

    fn store_with(path: &[&str], value: i32, m: Multiplicity) -> SymbolStore<i32> {
        let mut store = SymbolStore::new();
        store.insert(path, value, m, HERE).unwrap();
        store
    }

    #[test]
    fn finite_value_is_consumed_exactly_n_times() {
        let mut store = store_with(&["f"], 7, Multiplicity::Times(3));
        for left in [2, 1] {
            let c = store.consume(&["f"]).unwrap();
            assert_eq!(c.value, 7);
            assert_eq!(c.remaining, Multiplicity::Times(left));
        }
        assert_eq!(store.consume(&["f"]).unwrap().remaining, Multiplicity::Times(0));
        assert!(store.is_empty());
        assert_eq!(
            store.consume(&["f"]).unwrap_err(),
            MockError::MissingEntry {
                symbol: "f".into()
            }
        );
    }

    #[test]
    fn values_are_fifo_per_symbol() {
        let mut store = SymbolStore::new();
        store.insert(&["f"], 1, Multiplicity::ONCE, HERE).unwrap();
        store.insert(&["g"], 9, Multiplicity::ONCE, HERE).unwrap();
        store.insert(&["f"], 2, Multiplicity::ONCE, HERE).unwrap();

        assert_eq!(store.consume(&["f"]).unwrap().value, 1);
        assert_eq!(store.consume(&["f"]).unwrap().value, 2);
        assert_eq!(store.consume(&["g"]).unwrap().value, 9);
    }

    #[test]
    fn nested_levels_are_pruned_bottom_up() {
        let mut store = SymbolStore::new();
        store
            .insert(&["open", "flags"], 4, Multiplicity::ONCE, HERE)
            .unwrap();
        store
            .insert(&["open", "mode"], 6, Multiplicity::ONCE, HERE)
            .unwrap();

        assert_eq!(store.consume(&["open", "flags"]).unwrap().value, 4);
        assert!(!store.contains(&["open", "flags"]));
        assert!(!store.is_empty());
        assert_eq!(store.consume(&["open", "mode"]).unwrap().value, 6);
        assert!(store.is_empty());
    }

    #[test]
    fn missing_nested_path_names_full_symbol() {
        let mut store = store_with(&["open", "flags"], 1, Multiplicity::ONCE);
        assert_eq!(
            store.consume(&["open", "mode"]).unwrap_err(),
            MockError::MissingEntry {
                symbol: "open.mode".into()
            }
        );
    }

    #[test]
    fn mixing_path_depths_is_rejected() {
        let mut store = store_with(&["f"], 1, Multiplicity::ONCE);
        assert!(matches!(
            store.insert(&["f", "x"], 2, Multiplicity::ONCE, HERE),
            Err(MockError::PathDepth { .. })
        ));
        assert!(matches!(
            store.consume(&["f", "x"]),
            Err(MockError::PathDepth { .. })
        ));
    }

    #[test]
    fn zero_count_and_empty_path_are_rejected() {
        let mut store: SymbolStore<i32> = SymbolStore::new();
        assert_eq!(
            store.insert(&["f"], 1, Multiplicity::Times(0), HERE),
            Err(MockError::InvalidMultiplicity { raw: 0 })
        );
        assert_eq!(
            store.insert(&[], 1, Multiplicity::ONCE, HERE),
            Err(MockError::EmptyPath)
        );
    }

    #[test]
    fn always_unused_is_leftover_but_used_is_not() {
        let mut unused = store_with(&["f"], 1, Multiplicity::Always);
        let left = unused.sweep();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].multiplicity, Multiplicity::Always);

        let mut used = store_with(&["f"], 1, Multiplicity::Always);
        for _ in 0..5 {
            used.consume(&["f"]).unwrap();
        }
        assert!(used.sweep().is_empty());
        assert!(used.is_empty());
    }

    #[test]
    fn maybe_is_never_leftover() {
        let mut store = store_with(&["f", "p"], 1, Multiplicity::Maybe);
        assert!(store.sweep().is_empty());
    }

    #[test]
    fn leftovers_report_symbol_and_registration_site() {
        let site = SourceLocation::new("t.rs", 88);
        let mut store = SymbolStore::new();
        store
            .insert(&["read", "fd"], 3_i32, Multiplicity::Times(2), site)
            .unwrap();
        store.consume(&["read", "fd"]).unwrap();

        let left = store.sweep();
        assert_eq!(
            left,
            vec![Leftover {
                symbol: "read.fd".into(),
                multiplicity: Multiplicity::Times(1),
                location: site,
            }]
        );
        assert!(store.is_empty());
    }

    #[test]
    fn always_entry_blocks_values_queued_behind_it() {
        let mut store = SymbolStore::new();
        store.insert(&["f"], 1, Multiplicity::Always, HERE).unwrap();
        store.insert(&["f"], 2, Multiplicity::ONCE, HERE).unwrap();
        for _ in 0..3 {
            assert_eq!(store.consume(&["f"]).unwrap().value, 1);
        }
        assert_eq!(store.queued(), 2);
    }
}
