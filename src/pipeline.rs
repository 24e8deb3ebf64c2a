//! End-to-end flow: locate the current document, fetch it, parse it.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::download::{DownloadError, HttpClient};
use crate::locate::{DocumentLocator, LocateError, LocatorConfig};
use crate::parse::{DocumentParser, ParseError};
use crate::record::Record;

/// Errors from any stage of [`RecordsPipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Discovery failed.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// The document could not be downloaded.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The downloaded document could not be parsed.
    #[error("parsing {url}: {source}")]
    Parse {
        /// Document URL.
        url: String,
        /// Underlying parse error.
        #[source]
        source: ParseError,
    },
}

impl PipelineError {
    /// Returns true when the run was cancelled at any stage.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Locate(error) => error.is_cancelled(),
            Self::Download(error) => error.is_cancelled(),
            Self::Parse { source, .. } => source.is_cancelled(),
        }
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    /// URL the document was downloaded from.
    pub document_url: String,
    /// Filename advertised by the server, if any.
    pub filename: Option<String>,
    /// Complete records in document order.
    pub records: Vec<Record>,
}

/// Locates, downloads and parses the current directory document.
#[derive(Debug)]
pub struct RecordsPipeline {
    client: HttpClient,
    locator: DocumentLocator,
    parser: DocumentParser,
}

impl RecordsPipeline {
    /// Creates a pipeline sharing `client` between discovery and download.
    #[must_use]
    pub fn new(client: HttpClient, config: LocatorConfig, parser: DocumentParser) -> Self {
        Self {
            locator: DocumentLocator::new(client.clone(), config),
            client,
            parser,
        }
    }

    /// The locator used for discovery.
    #[must_use]
    pub fn locator(&self) -> &DocumentLocator {
        &self.locator
    }

    /// Runs discovery on `index_url`, then downloads and parses the result.
    ///
    /// # Errors
    ///
    /// Returns the first stage error; see [`PipelineError`].
    #[instrument(skip(self, cancel))]
    pub async fn run(
        &self,
        index_url: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectoryListing, PipelineError> {
        let document_url = self.locator.locate(index_url, cancel).await?;
        info!(%document_url, "located directory document");

        let mut document = self.client.fetch(&document_url, cancel).await?;
        info!(
            bytes = document.body.len(),
            spilled = document.body.is_spilled(),
            filename = document.filename.as_deref().unwrap_or("-"),
            "downloaded directory document"
        );

        let records = self
            .parser
            .parse(&mut document.body, cancel)
            .await
            .map_err(|source| PipelineError::Parse {
                url: document_url.clone(),
                source,
            })?;

        Ok(DirectoryListing {
            document_url,
            filename: document.filename,
            records,
        })
    }
}
