//! Spreadsheet decoders for the modern (XLSX) and legacy (XLS) directory files.

use std::io::SeekFrom;

use calamine::{Data, Range, Reader, Xls, Xlsx};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SpreadsheetDecoder;
use super::error::SpreadsheetError;
use crate::body::ReadSeek;
use crate::record::{RawRecord, Record, push_checked};

/// Header text (column D) that identifies the central-bank layout.
pub const BIC_LAYOUT_SENTINEL: &str = "Address of the branch office";

/// Column layout of a modern sheet, decided from its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetLayout {
    /// `code | name | postal | address`.
    Standard,
    /// `code | BIC | name | address`, no postal column.
    CentralBank,
}

impl SheetLayout {
    fn detect(header: &[Data], col_offset: usize) -> Self {
        if cell_text(header, col_offset, 3).trim() == BIC_LAYOUT_SENTINEL {
            Self::CentralBank
        } else {
            Self::Standard
        }
    }

    fn read(self, row: &[Data], col_offset: usize) -> RawRecord {
        let cell = |column| cell_text(row, col_offset, column);
        match self {
            Self::Standard => RawRecord::from_columns(cell(0), cell(1), cell(2), cell(3)),
            Self::CentralBank => RawRecord {
                bank_code: cell(0),
                bic: cell(1),
                name: cell(2),
                postal_code: String::new(),
                address: cell(3),
            },
        }
    }
}

/// Text of the cell at absolute sheet `column`; missing cells read as empty.
fn cell_text(row: &[Data], col_offset: usize, column: usize) -> String {
    column
        .checked_sub(col_offset)
        .and_then(|index| row.get(index))
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn first_column(range: &Range<Data>) -> usize {
    range.start().map_or(0, |(_, column)| column as usize)
}

/// Decoder for Office Open XML workbooks.
///
/// Reads the first sheet. The first row is a header: when its fourth column
/// reads [`BIC_LAYOUT_SENTINEL`] the central-bank layout is used, otherwise
/// the standard four-column layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxDecoder;

impl SpreadsheetDecoder for XlsxDecoder {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn decode(
        &self,
        source: &mut dyn ReadSeek,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, SpreadsheetError> {
        source.seek(SeekFrom::Start(0))?;
        let mut workbook: Xlsx<_> =
            Xlsx::new(&mut *source).map_err(|source| SpreadsheetError::Modern { source })?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SpreadsheetError::NoSheet)?
            .map_err(|source| SpreadsheetError::Modern { source })?;
        decode_modern_rows(&range, cancel)
    }
}

fn decode_modern_rows(
    range: &Range<Data>,
    cancel: &CancellationToken,
) -> Result<Vec<Record>, SpreadsheetError> {
    let col_offset = first_column(range);
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let layout = SheetLayout::detect(header, col_offset);
    debug!(?layout, rows = range.height(), "decoding xlsx sheet");

    let mut records = Vec::with_capacity(range.height());
    for row in rows {
        if cancel.is_cancelled() {
            return Err(SpreadsheetError::Cancelled { partial: records });
        }
        push_checked(&mut records, layout.read(row, col_offset));
    }
    Ok(records)
}

/// Decoder for legacy BIFF workbooks.
///
/// Reads the first sheet, skips one header row and takes the first four
/// columns as `code | name | postal | address`. If the stream does not open
/// as XLS it is retried as XLSX, since some published `.xls` files are
/// mislabelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsDecoder;

impl SpreadsheetDecoder for XlsDecoder {
    fn name(&self) -> &'static str {
        "xls"
    }

    fn decode(
        &self,
        source: &mut dyn ReadSeek,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, SpreadsheetError> {
        source.seek(SeekFrom::Start(0))?;
        let mut workbook: Xls<_> = match Xls::new(&mut *source) {
            Ok(workbook) => workbook,
            Err(error) => {
                warn!(%error, "not a legacy workbook, retrying as xlsx");
                return XlsxDecoder.decode(source, cancel);
            }
        };
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SpreadsheetError::NoSheet)?
            .map_err(|source| SpreadsheetError::Legacy { source })?;
        decode_legacy_rows(&range, cancel)
    }
}

fn decode_legacy_rows(
    range: &Range<Data>,
    cancel: &CancellationToken,
) -> Result<Vec<Record>, SpreadsheetError> {
    debug!(rows = range.height(), "decoding xls sheet");
    let mut records = Vec::with_capacity(range.height());
    for row in range.rows().skip(1) {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let cell = |index: usize| row.get(index).map(ToString::to_string).unwrap_or_default();
        push_checked(
            &mut records,
            RawRecord::from_columns(cell(0), cell(1), cell(2), cell(3)),
        );
        if cancel.is_cancelled() {
            return Err(SpreadsheetError::Cancelled { partial: records });
        }
    }
    Ok(records)
}
