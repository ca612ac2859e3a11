//! Error categories shared by the decision engine and its collaborators

use thiserror::Error;

/// Failure categories of a poll cycle.
///
/// Only a ledger open failure at startup is fatal; the binary decides that.
/// Every other variant degrades to "keep the previous good state".
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport failure; the current tick is skipped
    #[error("network error: {0}")]
    Network(String),

    /// Malformed payload; the payload is discarded
    #[error("decode error: {0}")]
    Decode(String),

    /// Ledger open/read/write failure; the sync attempt is aborted
    #[error("storage error: {0}")]
    Storage(String),

    /// Rejected mutation (out-of-bounds navigation, empty ladder, invalid price)
    #[error("logic error: {0}")]
    Logic(String),
}

impl EngineError {
    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Logic(msg.into())
    }

    /// Short category label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
            Self::Storage(_) => "storage",
            Self::Logic(_) => "logic",
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_are_decode_errors() {
        let err: EngineError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().starts_with("decode error"));
    }
}
