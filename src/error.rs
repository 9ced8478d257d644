//! Error taxonomy
//!
//! Most functions return `anyhow::Result`, but the conditions callers need
//! to branch on are concrete `thiserror` enums, recoverable through
//! `anyhow::Error::downcast_ref`:
//!
//! - `ScrapeError` - distinct navigation/extraction conditions
//! - `ImageError` - image fetch and validation failures
//!
//! The backoff executor re-raises the final error untouched, so a caller
//! that receives an exhausted retry can still tell a `PageLoadTimeout`
//! from a `ChallengeBlocked`.

use std::time::Duration;

use thiserror::Error;

/// Distinct extraction conditions the orchestrator branches on.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Navigation did not finish within the configured window.
    #[error("page load timeout after {0:?}")]
    PageLoadTimeout(Duration),

    /// The anti-bot challenge never cleared within its wait window.
    /// Fatal for the current navigation attempt.
    #[error("anti-bot challenge did not clear within {0:?}")]
    ChallengeBlocked(Duration),

    /// The per-question extraction budget was exceeded.
    #[error("question extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    /// No question links matched any discovery selector.
    #[error("no question links found on overview page {0}")]
    NoQuestionsFound(String),
}

/// Image fetch/validation failures reported per URL.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image too small ({len} bytes, minimum {min})")]
    TooSmall { len: usize, min: usize },

    #[error("unrecognized image signature")]
    UnknownSignature,

    #[error("http status {0}")]
    BadStatus(u16),
}
