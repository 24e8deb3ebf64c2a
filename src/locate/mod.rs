//! Discovery of the current directory document on the publisher's site.
//!
//! The publisher links its documents through indirect `/documents/<id>`
//! URLs that answer with a `302 Found` pointing at the real file. Discovery
//! therefore runs in three steps:
//!
//! 1. stream the index page through an HTML tokenizer and collect candidate
//!    anchors ([`links`])
//! 2. probe every candidate without following redirects, at most
//!    [`DEFAULT_CONCURRENCY`] at a time, retrying transport failures per
//!    [`RetryPolicy`]
//! 3. keep the `Location` targets whose filename matches the
//!    [`FilenamePattern`] and pick the most recent one ([`compare_filenames`])
//!
//! Every probe yields a typed [`ProbeOutcome`]; outcomes are collected after
//! all probes finish, so no result or diagnostic is lost to a race.

mod error;
pub mod links;
mod pattern;
mod retry;

pub use error::LocateError;
pub use links::{DOCUMENTS_PATH_MARKER, LinkExtractor, extract_candidate_hrefs};
pub use pattern::{DEFAULT_PATTERN, FilenamePattern, compare_filenames};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy};

use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::{DownloadError, HttpClient, final_path_segment};

/// The publisher's documents directory page.
pub const DEFAULT_URL: &str = "https://www.giro.hu/dokumentumok";

/// Stable direct spreadsheet endpoint that needs no discovery.
pub const DEFAULT_XLSX_URL: &str = "https://www.mnb.hu/letoltes/sht.xlsx";

/// Maximum number of concurrent redirect probes.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Redirect status a qualifying candidate must answer with.
const FOUND_STATUS: u16 = 302;

/// Substring that marks a filename as a likely directory document.
const NEAR_MISS_MARKER: &str = "EHT";

/// Locator configuration.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Filename pattern the redirect target must match.
    pub pattern: FilenamePattern,
    /// Maximum concurrent probes (at least 1).
    pub concurrency: usize,
    /// Retry policy for each probe.
    pub retry_policy: RetryPolicy,
    /// URL returned unchanged without crawling.
    pub direct_url: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            pattern: FilenamePattern::default(),
            concurrency: DEFAULT_CONCURRENCY,
            retry_policy: RetryPolicy::default(),
            direct_url: DEFAULT_XLSX_URL.to_string(),
        }
    }
}

/// A candidate whose redirect target matched the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Candidate link found on the index page.
    pub candidate: String,
    /// Absolute redirect target.
    pub location: String,
    /// Final path segment of the redirect target.
    pub filename: String,
}

/// Result of probing one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Redirect target matched the filename pattern.
    Matched(Resolution),
    /// The candidate answered, but not with a matching redirect.
    NoMatch {
        /// Candidate link.
        candidate: String,
        /// Why it was discarded.
        reason: String,
    },
    /// The candidate could not be probed.
    Failed {
        /// Candidate link.
        candidate: String,
        /// Final error after retries.
        error: String,
    },
}

/// Finds the current directory document behind an index page.
#[derive(Debug, Clone)]
pub struct DocumentLocator {
    client: HttpClient,
    config: LocatorConfig,
}

impl DocumentLocator {
    /// Creates a locator sharing `client`.
    #[must_use]
    pub fn new(client: HttpClient, config: LocatorConfig) -> Self {
        Self { client, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Returns the single best download URL reachable from `index_url`.
    ///
    /// # Errors
    ///
    /// - [`LocateError::IndexPage`] if the page cannot be fetched
    /// - [`LocateError::NotFound`] if no candidate qualifies; the error lists
    ///   every candidate that failed
    /// - [`LocateError::Cancelled`] if `cancel` fires first
    #[instrument(skip(self, cancel), fields(pattern = self.config.pattern.as_str()))]
    pub async fn locate(
        &self,
        index_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LocateError> {
        if index_url == self.config.direct_url {
            debug!("direct document URL, skipping discovery");
            return Ok(index_url.to_string());
        }

        let candidates = self.collect_candidates(index_url, cancel).await?;
        info!(candidates = candidates.len(), "candidate links collected");

        let concurrency = self.config.concurrency.max(1);
        let probes = stream::iter(candidates.iter())
            .map(|candidate| self.probe_candidate(candidate, cancel))
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>();
        let outcomes = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(LocateError::Cancelled { url: index_url.to_string() });
            }
            outcomes = probes => outcomes,
        };
        if cancel.is_cancelled() {
            return Err(LocateError::Cancelled {
                url: index_url.to_string(),
            });
        }

        select_document(index_url, outcomes)
    }

    async fn collect_candidates(
        &self,
        index_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Url>, LocateError> {
        let page_error = |source: DownloadError| LocateError::IndexPage {
            url: index_url.to_string(),
            source,
        };

        let response = self
            .client
            .get_page(index_url, cancel)
            .await
            .map_err(|source| match source {
                DownloadError::Cancelled { .. } => LocateError::Cancelled {
                    url: index_url.to_string(),
                },
                other => page_error(other),
            })?;
        let base = response.url().clone();

        let mut extractor = LinkExtractor::new();
        let mut body = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(LocateError::Cancelled { url: index_url.to_string() });
                }
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk.map_err(|e| page_error(DownloadError::network(index_url, e)))?;
            extractor.push(&chunk);
        }

        let mut candidates: Vec<Url> = Vec::new();
        for href in extractor.finish() {
            let resolved = match base.join(&href) {
                Ok(url) => url,
                Err(error) => {
                    warn!(href = %href, error = %error, "wrong url");
                    continue;
                }
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                debug!(href = %href, "skipping non-http candidate");
                continue;
            }
            if !candidates.contains(&resolved) {
                candidates.push(resolved);
            }
        }
        Ok(candidates)
    }

    async fn probe_candidate(&self, candidate: &Url, cancel: &CancellationToken) -> ProbeOutcome {
        let url = candidate.as_str();
        debug!(url, "probing candidate");

        let mut attempt = 1;
        let probe = loop {
            match self.client.probe_redirect(url, cancel).await {
                Ok(probe) => break probe,
                Err(error) if error.is_cancelled() => {
                    return ProbeOutcome::Failed {
                        candidate: url.to_string(),
                        error: error.to_string(),
                    };
                }
                Err(error) => match self.config.retry_policy.should_retry(&error, attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        debug!(url, error = %error, delay_ms = delay.as_millis(), "probe failed, retrying");
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => {
                                return ProbeOutcome::Failed {
                                    candidate: url.to_string(),
                                    error: DownloadError::cancelled(url).to_string(),
                                };
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        return ProbeOutcome::Failed {
                            candidate: url.to_string(),
                            error: format!("{error} ({reason})"),
                        };
                    }
                },
            }
        };

        debug!(
            url,
            status = probe.status,
            location = probe.location.as_deref().unwrap_or(""),
            "probe answered"
        );
        evaluate_probe(&self.config.pattern, candidate, probe.status, probe.location.as_deref())
    }
}

/// Classifies one probe response.
fn evaluate_probe(
    pattern: &FilenamePattern,
    candidate: &Url,
    status: u16,
    location: Option<&str>,
) -> ProbeOutcome {
    let no_match = |reason: String| ProbeOutcome::NoMatch {
        candidate: candidate.to_string(),
        reason,
    };

    if status != FOUND_STATUS {
        return no_match(format!("status {status}"));
    }
    let Some(location) = location else {
        return no_match("redirect without Location".to_string());
    };
    let Ok(target) = candidate.join(location) else {
        return no_match(format!("unparsable Location {location:?}"));
    };
    let Some(filename) = final_path_segment(&target) else {
        return no_match(format!("Location {location:?} has no filename"));
    };

    if pattern.is_match(&filename) {
        return ProbeOutcome::Matched(Resolution {
            candidate: candidate.to_string(),
            location: target.to_string(),
            filename,
        });
    }
    if filename.contains(NEAR_MISS_MARKER) {
        warn!(
            pattern = pattern.as_str(),
            location,
            filename = %filename,
            "no match"
        );
    }
    no_match(format!("filename {filename:?} does not match"))
}

/// Reduces all probe outcomes to the winning document URL.
fn select_document(index_url: &str, outcomes: Vec<ProbeOutcome>) -> Result<String, LocateError> {
    let mut matches = Vec::new();
    let mut details = Vec::new();
    for outcome in outcomes {
        match outcome {
            ProbeOutcome::Matched(resolution) => matches.push(resolution),
            ProbeOutcome::NoMatch { candidate, reason } => {
                debug!(candidate = %candidate, reason = %reason, "candidate discarded");
            }
            ProbeOutcome::Failed { candidate, error } => {
                details.push(format!("{candidate}: {error}"));
            }
        }
    }

    let filenames: Vec<&str> = matches.iter().map(|m| m.filename.as_str()).collect();
    debug!(results = ?filenames, "matching documents");

    let winner = matches.into_iter().max_by(|a, b| {
        compare_filenames(&a.filename, &b.filename).then_with(|| a.location.cmp(&b.location))
    });
    match winner {
        Some(resolution) => {
            info!(
                location = %resolution.location,
                filename = %resolution.filename,
                "document located"
            );
            Ok(resolution.location)
        }
        None => {
            details.sort();
            Err(LocateError::NotFound {
                url: index_url.to_string(),
                details,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn candidate(id: u32) -> Url {
        Url::parse(&format!("https://www.giro.hu/documents/{id}")).unwrap()
    }

    /// Shared in-memory sink for formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a scoped subscriber and returns its result with the log text.
    fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (result, logs)
    }

    fn matched(id: u32, filename: &str) -> ProbeOutcome {
        ProbeOutcome::Matched(Resolution {
            candidate: candidate(id).to_string(),
            location: format!("https://www.giro.hu/files/{filename}"),
            filename: filename.to_string(),
        })
    }

    // ==================== Probe Evaluation Tests ====================

    #[test]
    fn test_evaluate_probe_requires_found_status() {
        let pattern = FilenamePattern::default();
        for status in [200, 301, 303, 307, 404] {
            let outcome = evaluate_probe(
                &pattern,
                &candidate(1),
                status,
                Some("/files/EHT_20240301.xlsx"),
            );
            assert!(matches!(outcome, ProbeOutcome::NoMatch { .. }), "status {status}");
        }
    }

    #[test]
    fn test_evaluate_probe_requires_location() {
        let outcome = evaluate_probe(&FilenamePattern::default(), &candidate(1), 302, None);
        assert!(matches!(outcome, ProbeOutcome::NoMatch { .. }));
    }

    #[test]
    fn test_evaluate_probe_resolves_relative_location() {
        let outcome = evaluate_probe(
            &FilenamePattern::default(),
            &candidate(1),
            302,
            Some("/sites/default/files/EHT_20240301.xlsx"),
        );
        assert_eq!(
            outcome,
            ProbeOutcome::Matched(Resolution {
                candidate: "https://www.giro.hu/documents/1".to_string(),
                location: "https://www.giro.hu/sites/default/files/EHT_20240301.xlsx".to_string(),
                filename: "EHT_20240301.xlsx".to_string(),
            })
        );
    }

    #[test]
    fn test_evaluate_probe_near_miss_is_no_match() {
        let (outcome, logs) = capture_logs(|| {
            evaluate_probe(
                &FilenamePattern::default(),
                &candidate(1),
                302,
                Some("https://cdn.giro.hu/EHT_march.xlsx"),
            )
        });
        assert!(matches!(outcome, ProbeOutcome::NoMatch { .. }));
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("EHT_march.xlsx"), "logs: {logs}");
    }

    #[test]
    fn test_evaluate_probe_unrelated_filename_is_not_logged() {
        let (outcome, logs) = capture_logs(|| {
            evaluate_probe(
                &FilenamePattern::default(),
                &candidate(1),
                302,
                Some("https://cdn.giro.hu/hirdetmeny.pdf"),
            )
        });
        assert!(matches!(outcome, ProbeOutcome::NoMatch { .. }));
        assert!(!logs.contains("WARN"), "logs: {logs}");
    }

    // ==================== Selection Tests ====================

    #[test]
    fn test_select_document_picks_latest_filename() {
        let outcomes = vec![
            matched(1, "EHT_20240201.xlsx"),
            matched(2, "EHT_20240301.pdf"),
            matched(3, "EHT_20231201.xls"),
        ];
        let url = select_document(DEFAULT_URL, outcomes).unwrap();
        assert_eq!(url, "https://www.giro.hu/files/EHT_20240301.pdf");
    }

    #[test]
    fn test_select_document_is_order_independent() {
        let mut outcomes = vec![
            matched(1, "EHT_20240201.xlsx"),
            matched(2, "EHT_20240301.pdf"),
        ];
        let first = select_document(DEFAULT_URL, outcomes.clone()).unwrap();
        outcomes.reverse();
        assert_eq!(select_document(DEFAULT_URL, outcomes).unwrap(), first);
    }

    #[test]
    fn test_select_document_not_found_lists_failures() {
        let outcomes = vec![
            ProbeOutcome::NoMatch {
                candidate: candidate(1).to_string(),
                reason: "status 200".to_string(),
            },
            ProbeOutcome::Failed {
                candidate: candidate(2).to_string(),
                error: "timeout".to_string(),
            },
        ];
        let err = select_document(DEFAULT_URL, outcomes).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("https://www.giro.hu/documents/2: timeout"));
    }

    #[test]
    fn test_locator_config_defaults() {
        let config = LocatorConfig::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.direct_url, DEFAULT_XLSX_URL);
        assert_eq!(config.retry_policy.max_attempts(), 3);
    }

    #[tokio::test]
    async fn test_locate_direct_url_skips_discovery() {
        let locator = DocumentLocator::new(HttpClient::new().unwrap(), LocatorConfig::default());
        let url = locator
            .locate(DEFAULT_XLSX_URL, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, DEFAULT_XLSX_URL);
    }
}
