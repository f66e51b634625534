//! Consumption counts for queued values and expected calls.
//!
//! The raw integer encoding is kept for callers that pass counts around as
//! numbers: a positive count, [`EXPECT_ALWAYS`] (`-1`) or [`EXPECT_MAYBE`]
//! (`-2`). Inside the engine a count is always a [`Multiplicity`], so a value
//! below the MAYBE sentinel cannot be represented at all.

use crate::error::MockError;

/// Raw sentinel: return indefinitely, must be consumed at least once.
pub const EXPECT_ALWAYS: i32 = -1;
/// Raw sentinel: return indefinitely, consumption optional.
pub const EXPECT_MAYBE: i32 = -2;

/// How many times a queued entry may be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    /// Exactly `n` more consumptions (`n > 0`).
    Times(u32),
    /// Unlimited; at least one consumption is required before teardown.
    Always,
    /// Unlimited and optional.
    Maybe,
}

impl Multiplicity {
    pub const ONCE: Self = Self::Times(1);

    /// Decode the raw integer form.
    pub fn from_raw(raw: i64) -> Result<Self, MockError> {
        match raw {
            -1 => Ok(Self::Always),
            -2 => Ok(Self::Maybe),
            n if n > 0 => u32::try_from(n)
                .map(Self::Times)
                .map_err(|_| MockError::InvalidMultiplicity { raw }),
            _ => Err(MockError::InvalidMultiplicity { raw }),
        }
    }

    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Times(n) => i64::from(n),
            Self::Always => i64::from(EXPECT_ALWAYS),
            Self::Maybe => i64::from(EXPECT_MAYBE),
        }
    }

    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        matches!(self, Self::Always | Self::Maybe)
    }

    pub(crate) fn validate(self) -> Result<Self, MockError> {
        match self {
            Self::Times(0) => Err(MockError::InvalidMultiplicity { raw: 0 }),
            other => Ok(other),
        }
    }
}

impl From<u32> for Multiplicity {
    fn from(n: u32) -> Self {
        Self::Times(n)
    }
}

/// Outcome of a single consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    /// What is left after this consumption.
    pub remaining: Multiplicity,
    /// True when the entry must now be unlinked.
    pub exhausted: bool,
}

/// Live bookkeeping for one queued entry: its multiplicity plus how often it
/// has been consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    multiplicity: Multiplicity,
    consumed: u32,
}

impl Tally {
    #[must_use]
    pub const fn new(multiplicity: Multiplicity) -> Self {
        Self {
            multiplicity,
            consumed: 0,
        }
    }

    #[must_use]
    pub const fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    #[must_use]
    pub const fn consumed(&self) -> u32 {
        self.consumed
    }

    pub fn consume(&mut self) -> Consumption {
        self.consumed = self.consumed.saturating_add(1);
        match self.multiplicity {
            Multiplicity::Times(n) => {
                let left = n.saturating_sub(1);
                if left == 0 {
                    Consumption {
                        remaining: Multiplicity::Times(0),
                        exhausted: true,
                    }
                } else {
                    self.multiplicity = Multiplicity::Times(left);
                    Consumption {
                        remaining: self.multiplicity,
                        exhausted: false,
                    }
                }
            }
            unbounded => Consumption {
                remaining: unbounded,
                exhausted: false,
            },
        }
    }

    /// Unbounded entries whose obligation is already met: ALWAYS after its
    /// first consumption, MAYBE at any time.
    #[must_use]
    pub const fn is_satisfied_unbounded(&self) -> bool {
        match self.multiplicity {
            Multiplicity::Always => self.consumed > 0,
            Multiplicity::Maybe => true,
            Multiplicity::Times(_) => false,
        }
    }

    /// Entries still owed a consumption: a finite count, or ALWAYS never used.
    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        !self.is_satisfied_unbounded()
    }
}
