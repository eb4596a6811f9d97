// src/error.rs
//! Error taxonomy for the extraction pipeline.
//!
//! Terminal errors (`NoImages`, `InvalidDate`, `MissingApiKey`) reject the
//! whole request before any model call. The rest are isolated to a single
//! image and accumulate into the per-image error list.

use thiserror::Error;

/// Longest snippet of raw model text carried in a `Malformed` error.
pub const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// Request carried no images.
    #[error("no images provided")]
    NoImages,

    /// Request `date` is not a `YYYY-MM-DD` calendar date.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// No API key configured; no call is attempted.
    #[error("DOUBAO_API_KEY is not configured")]
    MissingApiKey,

    /// The vision endpoint answered with a non-2xx status.
    #[error("API request failed: {status} - {body}")]
    Api { status: u16, body: String },

    /// Transport-level failure talking to the vision endpoint.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response carried no usable message content.
    #[error("model response contained no content")]
    NoContent,

    /// Model text could not be parsed into card records.
    #[error("failed to parse model output: {snippet}")]
    Malformed { snippet: String },
}

impl ExtractError {
    /// Build a `Malformed` error with a char-safe truncated snippet of the
    /// offending text (model replies are usually Chinese).
    pub fn malformed(raw: &str) -> Self {
        Self::Malformed {
            snippet: raw.chars().take(SNIPPET_MAX_CHARS).collect(),
        }
    }

    /// True when the error rejects the whole request rather than one image.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoImages | Self::InvalidDate(_) | Self::MissingApiKey
        )
    }
}
