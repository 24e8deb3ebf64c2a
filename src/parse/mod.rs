//! Format detection and record extraction for directory documents.
//!
//! [`DocumentParser`] sniffs the first bytes of a document: a `%PDF-1`
//! signature routes it to the [`PdfExtractor`], anything else is treated as a
//! spreadsheet and tried as XLSX, then as legacy XLS when the XLSX decoder
//! does not recognize the container.
//!
//! # Example
//!
//! ```no_run
//! use giro_directory::body::SpooledBody;
//! use giro_directory::parse::DocumentParser;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("EHT_20240301.xlsx")?;
//! let mut body = SpooledBody::from_bytes(&bytes)?;
//! let records = DocumentParser::default()
//!     .parse(&mut body, &CancellationToken::new())
//!     .await?;
//! for record in &records {
//!     println!("{record}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod pdf;
mod spreadsheet;
mod text;

pub use error::{ExtractError, ParseError, SpreadsheetError};
pub use pdf::{
    DEFAULT_JAVA, DEFAULT_PDFTOTEXT, PdfExtractor, PdfToTextExtractor, TableExtractor,
    TabulaExtractor, TextExtractor,
};
pub use spreadsheet::{BIC_LAYOUT_SENTINEL, XlsDecoder, XlsxDecoder};
pub use text::{COLUMN_COUNT, ColumnMajorLayout, FORM_FEED, TextLayout};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::body::{ReadSeek, peek_prefix};
use crate::record::{Record, retain_complete};

/// Signature that identifies a PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF-1";

/// Bytes read for format detection.
const SNIFF_LEN: usize = 1024;

/// A synchronous spreadsheet decoder.
///
/// Implementations read the first worksheet from the start of `source` and
/// return the records accepted by the normalizer. They check `cancel`
/// between rows and return [`SpreadsheetError::Cancelled`] with the records
/// read so far.
pub trait SpreadsheetDecoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Decodes the workbook in `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`SpreadsheetError`] when the workbook cannot be read.
    fn decode(
        &self,
        source: &mut dyn ReadSeek,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, SpreadsheetError>;
}

/// Detected document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Starts with [`PDF_MAGIC`].
    Pdf,
    /// Anything else.
    Spreadsheet,
}

impl DocumentFormat {
    /// Classifies a document by its leading bytes.
    #[must_use]
    pub fn sniff(prefix: &[u8]) -> Self {
        if prefix.starts_with(PDF_MAGIC) {
            Self::Pdf
        } else {
            Self::Spreadsheet
        }
    }
}

/// Routes a document to the matching decoder and cleans up the result.
pub struct DocumentParser {
    modern: Box<dyn SpreadsheetDecoder>,
    legacy: Box<dyn SpreadsheetDecoder>,
    pdf: PdfExtractor,
}

impl std::fmt::Debug for DocumentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentParser")
            .field("modern", &self.modern.name())
            .field("legacy", &self.legacy.name())
            .field("pdf", &self.pdf)
            .finish()
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new(PdfExtractor::default())
    }
}

impl DocumentParser {
    /// Creates a parser with the calamine decoders and the given PDF extractor.
    #[must_use]
    pub fn new(pdf: PdfExtractor) -> Self {
        Self::with_decoders(Box::new(XlsxDecoder), Box::new(XlsDecoder), pdf)
    }

    /// Creates a parser with custom spreadsheet decoders.
    #[must_use]
    pub fn with_decoders(
        modern: Box<dyn SpreadsheetDecoder>,
        legacy: Box<dyn SpreadsheetDecoder>,
        pdf: PdfExtractor,
    ) -> Self {
        Self { modern, legacy, pdf }
    }

    /// Parses the document in `source` into complete records, in document order.
    ///
    /// Records lacking a code, a name, or both postal code and address are
    /// dropped after extraction.
    ///
    /// Spreadsheet decoding runs synchronously on the calling task and
    /// occupies a runtime worker until the sheet is read; callers serving
    /// other work on the same runtime can move the call into
    /// `tokio::task::spawn_blocking` with an owned source.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Read`] if the source cannot be read
    /// - [`ParseError::Spreadsheet`] if no spreadsheet decoder accepts it
    /// - [`ParseError::Pdf`] if every PDF strategy fails
    /// - [`ParseError::Cancelled`] if `cancel` fires; any records already
    ///   accepted are carried in `partial`
    #[instrument(skip_all)]
    pub async fn parse(
        &self,
        source: &mut dyn ReadSeek,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, ParseError> {
        let prefix = peek_prefix(source, SNIFF_LEN)?;
        let format = DocumentFormat::sniff(&prefix);
        debug!(?format, "detected document format");

        let result = match format {
            DocumentFormat::Pdf => self.pdf.extract(source, cancel).await,
            DocumentFormat::Spreadsheet => self.parse_spreadsheet(source, cancel),
        };

        match result {
            Ok(mut records) => {
                let extracted = records.len();
                retain_complete(&mut records);
                info!(extracted, kept = records.len(), "parsed directory");
                Ok(records)
            }
            Err(ParseError::Cancelled { mut partial }) => {
                retain_complete(&mut partial);
                Err(ParseError::Cancelled { partial })
            }
            Err(error) => Err(error),
        }
    }

    fn parse_spreadsheet(
        &self,
        source: &mut dyn ReadSeek,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, ParseError> {
        match self.modern.decode(source, cancel) {
            Ok(records) => Ok(records),
            Err(error) if error.is_format_mismatch() => {
                info!(
                    from = self.modern.name(),
                    to = self.legacy.name(),
                    %error,
                    "unrecognized spreadsheet container, trying legacy decoder"
                );
                self.legacy.decode(source, cancel).map_err(ParseError::from)
            }
            Err(error) => Err(error.into()),
        }
    }
}
