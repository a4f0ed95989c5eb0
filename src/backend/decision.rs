//! Post-processing of raw model scores into a politeness level.

use super::BackendError;
use crate::level::PolitenessLevel;

/// Number of classes emitted by the binary polite-guard head.
pub const CLASS_COUNT: usize = 2;

/// Confidence above which a prediction maps to the extreme level.
///
/// The comparison is strict: a confidence of exactly `0.8` lands in the
/// milder band.
pub const CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Class predicted by the binary head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictedClass {
    Polite,
    Impolite,
}

impl PredictedClass {
    /// Class for a score index. Index `0` is polite; any other index is
    /// treated as impolite.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            Self::Polite
        } else {
            Self::Impolite
        }
    }
}

/// Argmax class, its probability, and the full distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class: PredictedClass,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Builds a prediction from raw scores.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedScoreCount` when `scores` does not hold exactly
    /// [`CLASS_COUNT`] values.
    pub fn from_scores(scores: &[f32]) -> Result<Self, BackendError> {
        if scores.len() != CLASS_COUNT {
            return Err(BackendError::UnexpectedScoreCount {
                expected: CLASS_COUNT,
                actual: scores.len(),
            });
        }
        let probabilities = softmax(scores);
        let index = argmax(&probabilities).unwrap_or(0);
        let confidence = probabilities.get(index).copied().unwrap_or(0.0);
        Ok(Self {
            class: PredictedClass::from_index(index),
            confidence,
            probabilities,
        })
    }

    /// Level under the confidence rule.
    #[must_use]
    pub fn level(&self) -> PolitenessLevel {
        map_confidence(self.class, self.confidence)
    }
}

/// Numerically stable softmax.
///
/// The maximum score is subtracted before exponentiating and accumulation
/// happens in `f64`. Returns an empty vector for empty input.
///
/// # Examples
///
/// ```
/// use politeness_guard::backend::decision::softmax;
///
/// let probabilities = softmax(&[1000.0, 1000.0]);
/// assert_eq!(probabilities, vec![0.5, 0.5]);
/// ```
#[must_use]
#[expect(clippy::float_arithmetic, reason = "softmax requires float operations")]
#[expect(
    clippy::cast_possible_truncation,
    reason = "probabilities lie in [0, 1]"
)]
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = scores
        .iter()
        .map(|score| (f64::from(*score) - f64::from(max)).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| (e / sum) as f32).collect()
}

/// Index of the first maximum value, or `None` for empty input.
#[must_use]
pub fn argmax(values: &[f32]) -> Option<usize> {
    let (first, rest) = values.split_first()?;
    let mut best = (0, *first);
    for (index, value) in rest.iter().enumerate() {
        if *value > best.1 {
            best = (index + 1, *value);
        }
    }
    Some(best.0)
}

/// Maps a predicted class and its confidence onto the four-level taxonomy.
#[must_use]
pub fn map_confidence(class: PredictedClass, confidence: f32) -> PolitenessLevel {
    let confident = confidence > CONFIDENCE_THRESHOLD;
    match (class, confident) {
        (PredictedClass::Polite, true) => PolitenessLevel::Polite,
        (PredictedClass::Polite, false) => PolitenessLevel::SomewhatPolite,
        (PredictedClass::Impolite, true) => PolitenessLevel::Impolite,
        (PredictedClass::Impolite, false) => PolitenessLevel::Neutral,
    }
}
