//! Error types for document discovery.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors returned by [`DocumentLocator::locate`](super::DocumentLocator::locate).
#[derive(Debug, Error)]
pub enum LocateError {
    /// The index page could not be fetched or read.
    #[error("index page {url}: {source}")]
    IndexPage {
        /// Index page URL.
        url: String,
        /// Underlying fetch error.
        #[source]
        source: DownloadError,
    },

    /// The filename pattern does not compile.
    #[error("invalid filename pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The rejected expression.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// No candidate resolved to a filename matching the pattern.
    #[error("not found: no document matching the filename pattern on {url}{}", format_details(.details))]
    NotFound {
        /// Index page URL.
        url: String,
        /// One message per failed candidate.
        details: Vec<String>,
    },

    /// Discovery was cancelled.
    #[error("document discovery on {url} cancelled")]
    Cancelled {
        /// Index page URL.
        url: String,
    },
}

impl LocateError {
    /// Returns true for the "not found" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true when discovery was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn format_details(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(": {}", details.join("; "))
    }
}
