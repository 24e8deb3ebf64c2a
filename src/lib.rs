//! Giro Directory Library
//!
//! Finds, downloads and parses the Hungarian giro bank-branch directory
//! (bank code, name, postal code, address) published as a spreadsheet or
//! PDF on the clearing house's documents page.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`locate`] - Index page crawling, redirect probing, document selection
//! - [`download`] - HTTP fetching into a re-readable body
//! - [`parse`] - Format detection, spreadsheet decoders, PDF extraction
//! - [`record`] - Record type, normalization and acceptance rules
//! - [`pipeline`] - Locate, fetch and parse in one call
//! - [`body`] - Memory-bounded re-readable byte buffer

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod body;
pub mod download;
pub mod locate;
pub mod parse;
pub mod pipeline;
pub mod record;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use body::{ReadSeek, SpooledBody};
pub use download::{DownloadError, FetchedDocument, HttpClient, HttpTimeouts};
pub use locate::{
    DEFAULT_CONCURRENCY, DEFAULT_PATTERN, DEFAULT_URL, DEFAULT_XLSX_URL, DocumentLocator,
    FilenamePattern, LocateError, LocatorConfig, RetryDecision, RetryPolicy,
};
pub use parse::{
    DocumentParser, ParseError, PdfExtractor, PdfToTextExtractor, TableExtractor,
    TabulaExtractor, TextExtractor,
};
pub use pipeline::{DirectoryListing, PipelineError, RecordsPipeline};
pub use record::{RawRecord, Record};
