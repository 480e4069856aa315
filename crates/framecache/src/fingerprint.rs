//! Render fingerprints: BLAKE3 truncated to 128 bits (32 hex chars).
//!
//! The truncation keeps fingerprints human-manageable while retaining far
//! more collision resistance than a frame cache needs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A render fingerprint - 128 bits (16 bytes, 32 hex chars) of BLAKE3 over
/// the canonical encoding of a render request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("invalid fingerprint length: expected 32 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in fingerprint")]
    InvalidHex,
}

/// A resolved input value in canonical form.
///
/// Floats are folded in as raw IEEE bits so that values which compare equal
/// but print differently (`1.0` vs `1.00`) still fingerprint identically,
/// and NaN payloads stay distinct.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonValue {
    Bool(bool),
    Long(i64),
    Float(f64),
    Point2d([f64; 2]),
    Color([f64; 4]),
    Path(String),
}

impl CanonValue {
    fn fold_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            CanonValue::Bool(b) => {
                hasher.update(b"b");
                hasher.update(&[*b as u8]);
            }
            CanonValue::Long(n) => {
                hasher.update(b"l");
                hasher.update(&n.to_le_bytes());
            }
            CanonValue::Float(f) => {
                hasher.update(b"f");
                hasher.update(&f.to_bits().to_le_bytes());
            }
            CanonValue::Point2d(p) => {
                hasher.update(b"p");
                for c in p {
                    hasher.update(&c.to_bits().to_le_bytes());
                }
            }
            CanonValue::Color(c) => {
                hasher.update(b"c");
                for ch in c {
                    hasher.update(&ch.to_bits().to_le_bytes());
                }
            }
            CanonValue::Path(path) => {
                hasher.update(b"i");
                hasher.update(&(path.len() as u64).to_le_bytes());
                hasher.update(path.as_bytes());
            }
        }
    }
}

impl Fingerprint {
    /// Compute the fingerprint of a fully determined render.
    ///
    /// Inputs are sorted by name before folding, so the caller's ordering
    /// never affects the result.
    pub fn compute(
        source: &str,
        inputs: &[(String, CanonValue)],
        time: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();

        hasher.update(&(source.len() as u64).to_le_bytes());
        hasher.update(source.as_bytes());

        let mut sorted: Vec<&(String, CanonValue)> = inputs.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        hasher.update(&(sorted.len() as u64).to_le_bytes());
        for (name, value) in sorted {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            value.fold_into(&mut hasher);
        }

        hasher.update(&time.to_bits().to_le_bytes());
        hasher.update(&width.to_le_bytes());
        hasher.update(&height.to_le_bytes());

        let hash = hasher.finalize();
        Self(hex::encode(&hash.as_bytes()[..16]))
    }

    pub fn from_str_checked(s: &str) -> Result<Self, FingerprintError> {
        if s.len() != 32 {
            return Err(FingerprintError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FingerprintError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}
