//! Scrape Errors
//!
//! Failure taxonomy for the browser / loader / extractor pipeline.

use thiserror::Error;

/// Errors raised while rendering or extracting a page
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Browser process could not be launched or its first tab opened
    #[error("Browser session failed to start: {0}")]
    SessionStart(String),

    /// Readiness signal (body element) never appeared
    #[error("Page load timed out after {secs}s: {url}")]
    PageLoadTimeout { url: String, secs: f64 },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// CDP command failed on an already running session
    #[error("Browser error: {0}")]
    Browser(String),

    /// Designated root container absent from the parsed markup
    #[error("Content div not found")]
    ContentSectionMissing,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Errors that are reported as regular "no data" tool output
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScrapeError::ContentSectionMissing)
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
