//! Error taxonomy for the LTSC core.
//!
//! Every failure aborts the current call; there is no retry and no partial
//! result. Stream-shaped errors carry the token offset at which the defect
//! was detected.

use crate::types::Token;
use wasm_bindgen::JsValue;

/// Errors produced by compression and decompression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LtscError {
    /// Contradictory or unusable configuration (empty meta range,
    /// inverted length bounds, unknown selection mode, ...).
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An input token lands in the meta or control range.
    #[error("token {token:#010x} at position {position} falls in a reserved range")]
    TokenRangeCollision { token: Token, position: usize },

    /// The buffer estimate exceeds the configured cap.
    #[error("estimated peak memory {required} bytes exceeds cap of {cap} bytes")]
    MemoryExceeded { required: usize, cap: usize },

    /// Corrupt dictionary section during decompression.
    #[error("malformed stream at offset {offset}: {reason}")]
    MalformedStream { offset: usize, reason: String },

    /// The body or a definition references a meta-token with no entry.
    #[error("undefined meta-token {token:#010x} referenced at offset {offset}")]
    UndefinedMetaToken { token: Token, offset: usize },

    /// The definition graph has a back-edge.
    #[error("cycle in dictionary definitions through meta-token {token:#010x} at offset {offset}")]
    Cycle { token: Token, offset: usize },

    /// The stream ended mid-entry.
    #[error("stream truncated at offset {offset}: {reason}")]
    Truncated { offset: usize, reason: String },

    /// `verify` was set and the round-trip did not reproduce the input.
    #[error("verification failed: first mismatch at offset {offset}")]
    VerificationFailure { offset: usize },
}

impl LtscError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedStream {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn truncated(offset: usize, reason: impl Into<String>) -> Self {
        Self::Truncated {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<LtscError> for JsValue {
    fn from(err: LtscError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LtscError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_offset() {
        let err = LtscError::truncated(5, "definition ends before its declared length");
        let msg = err.to_string();
        assert!(msg.contains("offset 5"), "{msg}");
    }

    #[test]
    fn display_formats_token_as_hex() {
        let err = LtscError::TokenRangeCollision {
            token: 0xFFFF_FFF0,
            position: 3,
        };
        assert!(err.to_string().contains("0xfffffff0"));
    }
}
