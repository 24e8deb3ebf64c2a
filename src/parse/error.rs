//! Error types for document parsing.

use std::process::ExitStatus;

use thiserror::Error;

use crate::record::Record;

/// Errors raised by a single spreadsheet decoder.
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// The modern (XLSX) decoder rejected the document.
    #[error("xlsx: {source}")]
    Modern {
        /// Underlying decoder error.
        #[source]
        source: calamine::XlsxError,
    },

    /// The legacy (XLS) decoder rejected the document.
    #[error("xls: {source}")]
    Legacy {
        /// Underlying decoder error.
        #[source]
        source: calamine::XlsError,
    },

    /// The workbook has no worksheet.
    #[error("workbook does not contain sheet no 0")]
    NoSheet,

    /// Rewinding the source failed.
    #[error("reading spreadsheet: {0}")]
    Io(#[from] std::io::Error),

    /// Cancelled mid-sheet; `partial` holds the records read so far.
    #[error("spreadsheet parsing cancelled after {} records", partial.len())]
    Cancelled {
        /// Records accepted before cancellation.
        partial: Vec<Record>,
    },
}

impl SpreadsheetError {
    /// Returns true when the modern decoder could not recognize the container
    /// at all (not a valid archive / unsupported format), so the legacy
    /// decoder is worth trying.
    #[must_use]
    pub fn is_format_mismatch(&self) -> bool {
        match self {
            Self::Modern { source } => {
                if matches!(source, calamine::XlsxError::Zip(_)) {
                    return true;
                }
                let message = source.to_string().to_lowercase();
                message.contains("not a valid") || message.contains("unsupported")
            }
            _ => false,
        }
    }
}

/// Errors raised by the external PDF extraction tools.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The tool could not be started (usually: not installed).
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    ToolFailed {
        /// Program that failed.
        program: String,
        /// Exit status.
        status: ExitStatus,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The tool's CSV output could not be read.
    #[error("read csv: {0}")]
    Csv(#[from] csv::Error),

    /// IO with the tool or the scratch files failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// No extractor is configured for this strategy.
    #[error("no {0} extractor configured")]
    NotConfigured(&'static str),

    /// Extraction was cancelled.
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Creates an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Errors returned by [`DocumentParser::parse`](super::DocumentParser::parse).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document could not be read for format detection.
    #[error("reading document: {0}")]
    Read(#[from] std::io::Error),

    /// Both spreadsheet decoders failed (or the modern one failed for a
    /// reason other than an unrecognized format).
    #[error("spreadsheet: {0}")]
    Spreadsheet(#[source] SpreadsheetError),

    /// Both PDF strategies failed.
    #[error("pdf: text extraction failed: {text}{}", table.as_ref().map(|e| format!(" (table extraction: {e})")).unwrap_or_default())]
    Pdf {
        /// Structured extraction failure, when it was attempted.
        table: Option<ExtractError>,
        /// Text extraction failure.
        #[source]
        text: ExtractError,
    },

    /// Parsing was cancelled; `partial` is empty unless the spreadsheet
    /// paths had already accepted records.
    #[error("parsing cancelled after {} records", partial.len())]
    Cancelled {
        /// Records accepted before cancellation.
        partial: Vec<Record>,
    },
}

impl From<SpreadsheetError> for ParseError {
    fn from(error: SpreadsheetError) -> Self {
        match error {
            SpreadsheetError::Cancelled { partial } => Self::Cancelled { partial },
            other => Self::Spreadsheet(other),
        }
    }
}

impl ParseError {
    /// Returns true when parsing was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
