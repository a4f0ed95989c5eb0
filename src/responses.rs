//! Cursor over suggested responses and their politeness tier.

use crate::level::PolitenessLevel;

/// Highest politeness tier; tier `0` is the most polite.
pub const MAX_TIER: u8 = 3;

/// Suggested-response index paired with a politeness tier.
///
/// Both coordinates saturate at their bounds instead of wrapping.
///
/// ```
/// use politeness_guard::{PolitenessLevel, ResponseCursor};
///
/// let mut cursor = ResponseCursor::new(3);
/// cursor.less_polite();
/// cursor.next();
/// cursor.next();
/// cursor.next();
/// assert_eq!(cursor.index(), 2);
/// assert_eq!(cursor.tier_level(), PolitenessLevel::SomewhatPolite);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCursor {
    index: usize,
    count: usize,
    tier: u8,
}

impl ResponseCursor {
    /// Cursor over `count` responses at index `0`, tier `0`.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            index: 0,
            count,
            tier: 0,
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn tier(&self) -> u8 {
        self.tier
    }

    #[must_use]
    pub fn tier_level(&self) -> PolitenessLevel {
        PolitenessLevel::from_tier(self.tier)
    }

    /// Moves to `index`, clamped to the last response.
    pub fn select(&mut self, index: usize) {
        self.index = index.min(self.last_index());
    }

    pub fn next(&mut self) {
        self.select(self.index.saturating_add(1));
    }

    pub fn previous(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn more_polite(&mut self) {
        self.tier = self.tier.saturating_sub(1);
    }

    pub fn less_polite(&mut self) {
        self.tier = self.tier.saturating_add(1).min(MAX_TIER);
    }

    /// Starts over on a new response list, keeping the tier.
    pub fn reset(&mut self, count: usize) {
        self.count = count;
        self.index = 0;
    }

    fn last_index(&self) -> usize {
        self.count.saturating_sub(1)
    }
}
