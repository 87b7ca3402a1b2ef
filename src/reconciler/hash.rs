//! Transaction Hash Validation
//!
//! Pure validation of user-entered transaction identifiers. A valid hash is
//! 64 hexadecimal characters, with or without the 2-character `0x` marker,
//! case-insensitive. Validation never touches the network.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a transaction hash in hex characters (without marker)
pub const TX_HASH_HEX_LEN: usize = 64;

/// Rejected transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transaction hash: {reason}")]
pub struct InvalidTxHash {
    pub reason: String,
}

impl InvalidTxHash {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A syntactically valid transaction hash in canonical form.
///
/// Canonical form is lowercase hex with the `0x` marker stripped, so map keys
/// and equality coalesce case and marker variants of the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Parse and canonicalize a user-entered string.
    ///
    /// Trims surrounding whitespace before any format check.
    pub fn parse(input: &str) -> Result<Self, InvalidTxHash> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(InvalidTxHash::new("empty input"));
        }

        // Strip the optional 2-character chain marker, case-insensitive.
        // strip_prefix never slices mid-character, so multibyte input is
        // rejected below instead of panicking here.
        let bare = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if bare.len() != TX_HASH_HEX_LEN {
            return Err(InvalidTxHash::new(format!(
                "wrong length: {} != {}",
                bare.len(),
                TX_HASH_HEX_LEN
            )));
        }

        if !bare.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidTxHash::new("non-hexadecimal characters"));
        }

        Ok(Self(bare.to_ascii_lowercase()))
    }

    /// Canonical hash string (lowercase, no marker)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logging
    pub fn short(&self) -> String {
        format!("{}..{}", &self.0[..8], &self.0[TX_HASH_HEX_LEN - 6..])
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check whether a string is a syntactically valid transaction hash.
///
/// Returns false rather than erroring for any malformed input.
pub fn is_valid_tx_hash(input: &str) -> bool {
    TxHash::parse(input).is_ok()
}
