//! Fixed-shape text encoder.
//!
//! Produces BERT-style `input_ids`, `attention_mask`, and `token_type_ids`
//! sequences from raw text. Tokenisation is deliberately coarse: text is
//! lowercased, split on whitespace and a small punctuation set, and every
//! token outside the special-token table receives a hashed fallback id. The
//! contract is a stable, deterministic, fixed-length encoding rather than a
//! linguistically faithful one.

use regex::Regex;
use std::sync::LazyLock;

/// Padding sentinel.
pub const PAD_ID: i64 = 0;
/// Unknown-token sentinel.
pub const UNKNOWN_ID: i64 = 100;
/// Sequence-begin sentinel (`[CLS]`).
pub const BEGIN_ID: i64 = 101;
/// Separator sentinel (`[SEP]`).
pub const SEPARATOR_ID: i64 = 102;

/// Sequence length consumed by the polite-guard model.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Shortest sequence that can hold the begin and separator sentinels.
pub const MIN_SEQUENCE_LENGTH: usize = 2;

const SPECIAL_TOKENS: &[(&str, i64)] = &[
    ("[PAD]", PAD_ID),
    ("[UNK]", UNKNOWN_ID),
    ("[CLS]", BEGIN_ID),
    ("[SEP]", SEPARATOR_ID),
];

/// Hashed ids are folded into `[0, HASH_RANGE)`.
const HASH_RANGE: u32 = 30_000;
/// Hashed ids never fall below this floor, keeping the sentinel ids reserved.
const HASH_FLOOR: u32 = 200;

static TOKEN_DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::expect_used, reason = "static pattern cannot fail")]
    let delimiters = Regex::new(r"[ .,!?;:\n\r\t]+").expect("valid regex");
    delimiters
});

/// Encoded model input for a single text.
///
/// All three sequences share the same length. `input_ids[0]` is
/// [`BEGIN_ID`], the separator follows the last real token, and every later
/// position holds [`PAD_ID`] with a zero attention mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl EncodedInput {
    /// Sequence length shared by all three tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Always `false`: an encoding holds at least the two sentinels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of attended positions, sentinels included.
    #[must_use]
    pub fn attended_len(&self) -> usize {
        self.attention_mask.iter().take_while(|&&m| m == 1).count()
    }
}

/// Text encoder bound to a fixed sequence length.
///
/// # Examples
///
/// ```
/// use politeness_guard::encoder::{BEGIN_ID, Encoder, PAD_ID, SEPARATOR_ID};
///
/// let encoder = Encoder::new(8);
/// let encoded = encoder.encode("Thanks, Alice!");
/// assert_eq!(encoded.len(), 8);
/// assert_eq!(encoded.input_ids[0], BEGIN_ID);
/// assert_eq!(encoded.input_ids[3], SEPARATOR_ID);
/// assert_eq!(encoded.input_ids[4], PAD_ID);
/// assert_eq!(encoded.attended_len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    max_length: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEQUENCE_LENGTH)
    }
}

impl Encoder {
    /// Creates an encoder producing sequences of `max_length` positions.
    ///
    /// Lengths below [`MIN_SEQUENCE_LENGTH`] are raised to it.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(MIN_SEQUENCE_LENGTH),
        }
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Encodes `text` into fixed-length tensors. Never fails.
    #[must_use]
    pub fn encode(&self, text: &str) -> EncodedInput {
        encode(text, self.max_length)
    }
}

/// Encodes `text` into sequences of exactly `max_length` positions.
///
/// Real tokens beyond `max_length - 2` are dropped so the separator always
/// fits. `max_length` values below [`MIN_SEQUENCE_LENGTH`] are raised to it.
#[must_use]
pub fn encode(text: &str, max_length: usize) -> EncodedInput {
    let max_length = max_length.max(MIN_SEQUENCE_LENGTH);
    let lowered = text.to_lowercase();

    let mut input_ids = Vec::with_capacity(max_length);
    input_ids.push(BEGIN_ID);
    input_ids.extend(
        tokenize(&lowered)
            .take(max_length - MIN_SEQUENCE_LENGTH)
            .map(token_id),
    );
    input_ids.push(SEPARATOR_ID);

    let attended = input_ids.len();
    input_ids.resize(max_length, PAD_ID);

    let mut attention_mask = vec![1; attended];
    attention_mask.resize(max_length, 0);

    EncodedInput {
        input_ids,
        attention_mask,
        token_type_ids: vec![0; max_length],
    }
}

/// Splits lowercased text into non-empty tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_DELIMITERS.split(text).filter(|t| !t.is_empty())
}

/// Maps a token to its vocabulary id.
///
/// The special-token table is keyed by the canonical upper-case names, so
/// lowercased input never collides with a sentinel; everything else goes
/// through [`fallback_id`].
#[must_use]
pub fn token_id(token: &str) -> i64 {
    SPECIAL_TOKENS
        .iter()
        .find(|(name, _)| *name == token)
        .map_or_else(|| fallback_id(token), |(_, id)| *id)
}

/// Order-dependent hash of the token's UTF-16 code units.
///
/// Collisions between distinct tokens are expected.
#[must_use]
pub fn fallback_id(token: &str) -> i64 {
    let hash = token
        .encode_utf16()
        .fold(0_u32, |acc, unit| (acc * 31 + u32::from(unit)) % HASH_RANGE);
    i64::from(hash.max(HASH_FLOOR))
}
