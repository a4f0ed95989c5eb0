use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Four-level politeness taxonomy, most polite first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolitenessLevel {
    Polite,
    SomewhatPolite,
    Neutral,
    Impolite,
}

impl PolitenessLevel {
    /// All levels in tier order.
    pub const ALL: [Self; 4] = [
        Self::Polite,
        Self::SomewhatPolite,
        Self::Neutral,
        Self::Impolite,
    ];

    /// Label shown to the author.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Polite => "Polite",
            Self::SomewhatPolite => "Somewhat Polite",
            Self::Neutral => "Neutral",
            Self::Impolite => "Impolite",
        }
    }

    /// Rationale attached to a classification.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Polite => {
                "Text is considerate and shows respect and good manners, often including courteous phrases and a friendly tone."
            }
            Self::SomewhatPolite => {
                "Text is generally respectful but lacks warmth or formality, communicating with a decent level of courtesy."
            }
            Self::Neutral => {
                "Text is straightforward and factual, without emotional undertones or specific attempts at politeness."
            }
            Self::Impolite => {
                "Text is disrespectful or rude, often blunt or dismissive, showing a lack of consideration for the recipient's feelings."
            }
        }
    }

    /// Tier index, `0` for [`Self::Polite`] through `3` for [`Self::Impolite`].
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Self::Polite => 0,
            Self::SomewhatPolite => 1,
            Self::Neutral => 2,
            Self::Impolite => 3,
        }
    }

    /// Level for a tier index; indices above 3 saturate to [`Self::Impolite`].
    #[must_use]
    pub fn from_tier(tier: u8) -> Self {
        match tier {
            0 => Self::Polite,
            1 => Self::SomewhatPolite,
            2 => Self::Neutral,
            _ => Self::Impolite,
        }
    }
}

impl fmt::Display for PolitenessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rationale returned when there is nothing to classify.
pub const NO_TEXT_DESCRIPTION: &str = "No text to analyze";

/// Outcome of one completed classification.
///
/// # Examples
///
/// ```
/// use politeness_guard::{ClassificationResult, PolitenessLevel};
///
/// let result = ClassificationResult::empty();
/// assert_eq!(result.level, PolitenessLevel::Neutral);
/// assert_eq!(result.elapsed_ms(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub level: PolitenessLevel,
    pub description: String,
    /// Wall-clock time spent in the backend forward pass.
    pub elapsed: Duration,
}

impl ClassificationResult {
    #[must_use]
    pub fn new(level: PolitenessLevel, elapsed: Duration) -> Self {
        Self {
            level,
            description: level.description().to_owned(),
            elapsed,
        }
    }

    /// Result for empty or whitespace-only text.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            level: PolitenessLevel::Neutral,
            description: NO_TEXT_DESCRIPTION.to_owned(),
            elapsed: Duration::ZERO,
        }
    }

    /// Elapsed time in whole milliseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}
