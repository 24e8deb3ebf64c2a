//! HTTP client wrapper used by the locator and the document fetcher.
//!
//! Two underlying reqwest clients are kept: one following redirects for
//! pages and documents, and one that never follows them so the locator can
//! read `Location` headers of candidate links.

use std::io::Seek;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, LOCATION};
use reqwest::{Client, redirect};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::parse_content_disposition;
use crate::body::SpooledBody;
use crate::user_agent;

/// Maximum number of body bytes kept in an HTTP status error.
const MAX_ERROR_BODY_BYTES: usize = 4096;

/// Connect and read timeouts for the HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// A fetched document body plus response metadata.
#[derive(Debug)]
pub struct FetchedDocument {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status of the final response.
    pub status: u16,
    /// Filename advertised by `Content-Disposition`, if any.
    pub filename: Option<String>,
    /// The re-readable body.
    pub body: SpooledBody,
}

/// Outcome of a request that does not follow redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectProbe {
    /// HTTP status of the response.
    pub status: u16,
    /// Raw `Location` header, if present.
    pub location: Option<String>,
}

/// HTTP client for index pages, redirect probes and documents.
///
/// Create once and share; the inner clients pool connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, DownloadError> {
        let client = base_client_builder(timeouts)
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        let no_redirect = base_client_builder(timeouts)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            no_redirect,
        })
    }

    /// Requests an index page, failing on 4xx/5xx; the body is left unread for streaming.
    ///
    /// The error for a failing status carries the (truncated) response body.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, transport failures,
    /// error statuses and cancellation.
    #[instrument(skip(self, cancel), fields(url = %url))]
    pub async fn get_page(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            result = self.client.get(url).send() => {
                result.map_err(|e| DownloadError::network(url, e))?
            }
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            let body = truncate_body(body);
            return Err(DownloadError::http_status(url, status.as_u16(), body));
        }
        debug!(status = status.as_u16(), "index page response");
        Ok(response)
    }

    /// Issues a single GET without following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, transport failures and cancellation.
    pub async fn probe_redirect(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RedirectProbe, DownloadError> {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            result = self.no_redirect.get(url).send() => {
                result.map_err(|e| DownloadError::network(url, e))?
            }
        };
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        Ok(RedirectProbe {
            status: response.status().as_u16(),
            location,
        })
    }

    /// Downloads a document, following redirects, into a spooled body.
    ///
    /// A non-success status is logged but not treated as an error: the
    /// format sniffing downstream rejects error pages on its own.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, transport failures,
    /// buffering failures and cancellation.
    #[instrument(skip(self, cancel), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        info!("fetching document");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            result = self.client.get(url).send() => {
                result.map_err(|e| DownloadError::network(url, e))?
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            warn!(status, "document response is not a success status");
        }
        let final_url = response.url().to_string();
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);

        let mut body = SpooledBody::new();
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
            body.append(&chunk)
                .map_err(|e| DownloadError::io(url, e))?;
        }
        body.rewind().map_err(|e| DownloadError::io(url, e))?;

        info!(
            status,
            bytes = body.len(),
            spilled = body.is_spilled(),
            filename = filename.as_deref().unwrap_or(""),
            "document fetched"
        );

        Ok(FetchedDocument {
            url: final_url,
            status,
            filename,
            body,
        })
    }
}

fn base_client_builder(timeouts: HttpTimeouts) -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut cut = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
