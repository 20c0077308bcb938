use crate::error::{DescrambleError, Result};
use serde::{Deserialize, Serialize};

/// Smallest key array the descrambler accepts: three control values plus the
/// trailing shuffle seed.
pub const MIN_KEY_LEN: usize = 4;

/// Per-page integer key decrypted from the gallery's key data.
///
/// Only constructed through [`KeyArray::try_from`], which rejects arrays that
/// are too short to carry the width, height and seeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyArray(Vec<i64>);

impl KeyArray {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Split off the trailing shuffle seed, leaving the control values.
    pub fn pop_seed(mut self) -> (Vec<i64>, i64) {
        // Length was validated on construction.
        let seed = self.0.pop().unwrap_or_default();
        (self.0, seed)
    }
}

impl TryFrom<Vec<i64>> for KeyArray {
    type Error = DescrambleError;

    fn try_from(values: Vec<i64>) -> Result<Self> {
        if values.len() < MIN_KEY_LEN {
            return Err(DescrambleError::MalformedKey(format!(
                "expected at least {} integers, got {}",
                MIN_KEY_LEN,
                values.len()
            )));
        }
        Ok(Self(values))
    }
}

/// Reading direction of a gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Left to Right")]
    LeftToRight,
    #[default]
    #[serde(rename = "Right to Left")]
    RightToLeft,
}

impl Direction {
    /// Parse the reader's direction label. Anything other than
    /// "Left to Right" reads right to left.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("Left to Right") => Direction::LeftToRight,
            _ => Direction::RightToLeft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::LeftToRight => "Left to Right",
            Direction::RightToLeft => "Right to Left",
        }
    }
}

/// Whether a gallery's pages went through the tile descrambler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Scrambled,
    Unscrambled,
}

/// Two pages stored together as one wide image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadPair {
    pub left: String,
    pub right: String,
}
