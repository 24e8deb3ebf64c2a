//! PDF directory extraction through external tools.
//!
//! Two strategies are tried in order:
//!
//! 1. **Table extraction** ([`TableExtractor`]): the document is written to a
//!    scratch directory and handed to tabula, whose CSV output maps one row
//!    to one record.
//! 2. **Text extraction** ([`TextExtractor`]): the document is piped through
//!    `pdftotext` and the rows are rebuilt by a [`TextLayout`].
//!
//! Tabula is optional: without a configured jar only the text strategy runs.

use std::io::{SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::{ExtractError, ParseError};
use super::text::{ColumnMajorLayout, TextLayout};
use crate::body::{ReadSeek, read_all};
use crate::record::{RawRecord, Record, push_checked};

/// Default Java launcher.
pub const DEFAULT_JAVA: &str = "java";

/// Default text extraction program.
pub const DEFAULT_PDFTOTEXT: &str = "pdftotext";

/// Name of the scratch copy handed to the table extractor.
const SCRATCH_FILE_NAME: &str = "directory.pdf";

/// Structured table extraction from a PDF file on disk.
#[async_trait]
pub trait TableExtractor: Send + Sync {
    /// Returns every table row found in the document.
    ///
    /// Rows have at least four columns in `code, name, postal, address` order;
    /// shorter rows are padded with empty fields by the caller.
    async fn extract_rows(
        &self,
        pdf: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<String>>, ExtractError>;
}

/// Plain text extraction from PDF bytes.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the document text with pages separated by form feeds.
    async fn extract_text(
        &self,
        pdf: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError>;
}

/// Runs `java -jar <jar> -l -p all -f CSV <file>`.
#[derive(Debug, Clone)]
pub struct TabulaExtractor {
    java: PathBuf,
    jar: PathBuf,
}

impl TabulaExtractor {
    /// Creates an extractor for the tabula jar at `jar`, launched with `java`.
    #[must_use]
    pub fn new(jar: impl Into<PathBuf>) -> Self {
        Self {
            java: PathBuf::from(DEFAULT_JAVA),
            jar: jar.into(),
        }
    }

    /// Uses a specific Java launcher.
    #[must_use]
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }
}

#[async_trait]
impl TableExtractor for TabulaExtractor {
    #[instrument(skip(self, cancel), fields(jar = %self.jar.display()))]
    async fn extract_rows(
        &self,
        pdf: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<String>>, ExtractError> {
        let program = self.java.display().to_string();
        let child = Command::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .args(["-l", "-p", "all", "-f", "CSV"])
            .arg(pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = wait_with_cancel(child, &program, cancel).await?;
        check_status(&program, &output)?;
        parse_csv_rows(&output.stdout)
    }
}

/// Runs `pdftotext - -`, feeding the document on stdin.
#[derive(Debug, Clone)]
pub struct PdfToTextExtractor {
    program: PathBuf,
}

impl Default for PdfToTextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PDFTOTEXT)
    }
}

impl PdfToTextExtractor {
    /// Creates an extractor running `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfToTextExtractor {
    #[instrument(skip(self, pdf, cancel), fields(bytes = pdf.len()))]
    async fn extract_text(
        &self,
        pdf: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError> {
        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .args(["-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            ExtractError::io(&program, std::io::Error::other("stdin not captured"))
        })?;
        let feed = async move {
            let written = stdin.write_all(&pdf).await;
            drop(stdin);
            written
        };

        let (written, output) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ExtractError::Cancelled),
            pair = async { tokio::join!(feed, child.wait_with_output()) } => pair,
        };
        let output = output.map_err(|source| ExtractError::io(&program, source))?;
        check_status(&program, &output)?;
        written.map_err(|source| ExtractError::io(format!("writing to {program}"), source))?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

async fn wait_with_cancel(
    child: Child,
    program: &str,
    cancel: &CancellationToken,
) -> Result<Output, ExtractError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ExtractError::Cancelled),
        output = child.wait_with_output() => {
            output.map_err(|source| ExtractError::io(program, source))
        }
    }
}

fn check_status(program: &str, output: &Output) -> Result<(), ExtractError> {
    if output.status.success() {
        return Ok(());
    }
    Err(ExtractError::ToolFailed {
        program: program.to_string(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn parse_csv_rows(csv_bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv_bytes);
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Extracts directory records from a PDF document.
#[derive(Clone)]
pub struct PdfExtractor {
    table: Option<Arc<dyn TableExtractor>>,
    text: Option<Arc<dyn TextExtractor>>,
    layout: Arc<dyn TextLayout>,
}

impl std::fmt::Debug for PdfExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExtractor")
            .field("table", &self.table.is_some())
            .field("text", &self.text.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for PdfExtractor {
    /// Text extraction through `pdftotext` only.
    fn default() -> Self {
        Self::new(None, Arc::new(PdfToTextExtractor::default()))
    }
}

impl PdfExtractor {
    /// Creates an extractor trying `table` first (when given), then `text`.
    #[must_use]
    pub fn new(table: Option<Arc<dyn TableExtractor>>, text: Arc<dyn TextExtractor>) -> Self {
        Self {
            table,
            text: Some(text),
            layout: Arc::new(ColumnMajorLayout),
        }
    }

    /// Creates an extractor with no text fallback.
    #[must_use]
    pub fn table_only(table: Arc<dyn TableExtractor>) -> Self {
        Self {
            table: Some(table),
            text: None,
            layout: Arc::new(ColumnMajorLayout),
        }
    }

    /// Replaces the layout used to rebuild rows from extracted text.
    #[must_use]
    pub fn with_layout(mut self, layout: Arc<dyn TextLayout>) -> Self {
        self.layout = layout;
        self
    }

    /// Extracts accepted records from the PDF in `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Pdf`] when every configured strategy fails,
    /// [`ParseError::Cancelled`] when `cancel` fires, and
    /// [`ParseError::Read`] when the source cannot be read.
    pub async fn extract(
        &self,
        source: &mut dyn ReadSeek,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, ParseError> {
        let mut table_error = None;
        if let Some(table) = &self.table {
            match extract_tables(table.as_ref(), source, cancel).await {
                Ok(records) => {
                    info!(records = records.len(), "extracted PDF tables");
                    return Ok(records);
                }
                Err(ExtractError::Cancelled) => {
                    return Err(ParseError::Cancelled {
                        partial: Vec::new(),
                    });
                }
                Err(error) => {
                    warn!(%error, "table extraction failed, falling back to text");
                    table_error = Some(error);
                }
            }
        }

        let Some(text) = &self.text else {
            return Err(ParseError::Pdf {
                table: table_error,
                text: ExtractError::NotConfigured("text"),
            });
        };

        let bytes = read_all(source)?;
        let extracted = match text.extract_text(bytes, cancel).await {
            Ok(extracted) => extracted,
            Err(ExtractError::Cancelled) => {
                return Err(ParseError::Cancelled {
                    partial: Vec::new(),
                });
            }
            Err(error) => {
                return Err(ParseError::Pdf {
                    table: table_error,
                    text: error,
                });
            }
        };
        debug!(chars = extracted.len(), "extracted PDF text");

        let records = self.layout.reconstruct(&extracted);
        info!(records = records.len(), "rebuilt records from PDF text");
        Ok(records)
    }
}

/// Copies the document to a scratch directory and runs the table extractor.
///
/// The directory is removed when this returns, on every path.
async fn extract_tables(
    table: &dyn TableExtractor,
    source: &mut dyn ReadSeek,
    cancel: &CancellationToken,
) -> Result<Vec<Record>, ExtractError> {
    let scratch = tempfile::Builder::new()
        .prefix("giro-")
        .tempdir()
        .map_err(|source| ExtractError::io("creating scratch directory", source))?;
    let pdf_path = scratch.path().join(SCRATCH_FILE_NAME);
    write_scratch_copy(source, &pdf_path)
        .map_err(|source| ExtractError::io(format!("writing {}", pdf_path.display()), source))?;

    let rows = table.extract_rows(&pdf_path, cancel).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let field = |index: usize| row.get(index).cloned().unwrap_or_default();
        push_checked(
            &mut records,
            RawRecord::from_columns(field(0), field(1), field(2), field(3)),
        );
    }
    Ok(records)
}

fn write_scratch_copy(source: &mut dyn ReadSeek, path: &Path) -> std::io::Result<()> {
    source.seek(SeekFrom::Start(0))?;
    let mut file = std::fs::File::create(path)?;
    std::io::copy(source, &mut file)?;
    file.flush()?;
    source.seek(SeekFrom::Start(0))?;
    Ok(())
}
