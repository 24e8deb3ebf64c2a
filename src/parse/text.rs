//! Reconstruction of directory rows from plain text extracted out of a PDF.
//!
//! Text extraction emits each page column-major: every bank code, then
//! every name, every postal code and every address, with a form feed
//! opening the next page.

use tracing::warn;

use crate::record::{RawRecord, Record, push_checked};

/// Page separator emitted by text extractors.
pub const FORM_FEED: char = '\u{c}';

/// Number of logical columns per page.
pub const COLUMN_COUNT: usize = 4;

/// Fragment of the repeated page footer ("Érvényes Egyszer...").
const FOOTER_FRAGMENT: &str = "nyes Egyszer";

/// Suffix of page-number lines ("3. oldal").
const PAGE_NUMBER_SUFFIX: &str = " oldal";

/// Rebuilds records from extracted text.
pub trait TextLayout: Send + Sync {
    /// Returns the accepted records found in `text`, in document order.
    fn reconstruct(&self, text: &str) -> Vec<Record>;
}

/// Layout where each page lists its [`COLUMN_COUNT`] columns one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnMajorLayout;

impl TextLayout for ColumnMajorLayout {
    fn reconstruct(&self, text: &str) -> Vec<Record> {
        let mut records = Vec::new();
        let mut page: Vec<String> = Vec::new();
        let mut in_table = false;

        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            // Everything before the first code is a title block.
            if !in_table {
                in_table = line.starts_with(|c: char| c.is_ascii_digit());
                if !in_table {
                    continue;
                }
            }
            if line.contains(FOOTER_FRAGMENT) || line.ends_with(PAGE_NUMBER_SUFFIX) {
                continue;
            }
            if let Some(rest) = line.strip_prefix(FORM_FEED) {
                flush_page(&mut page, &mut records);
                if rest.is_empty() {
                    // Bare form feed: end of document.
                    return records;
                }
            }
            page.push(line.trim().to_string());
        }
        flush_page(&mut page, &mut records);
        records
    }
}

/// Transposes the buffered page into records and clears the buffer.
///
/// Lines beyond the last complete group of [`COLUMN_COUNT`] are dropped.
fn flush_page(page: &mut Vec<String>, records: &mut Vec<Record>) {
    if page.is_empty() {
        return;
    }
    let rows = page.len() / COLUMN_COUNT;
    if page.len() % COLUMN_COUNT != 0 {
        warn!(
            lines = page.len(),
            columns = COLUMN_COUNT,
            "page line count is not a multiple of the column count, dropping the remainder"
        );
    }
    for row in 0..rows {
        let column = |c: usize| page[c * rows + row].clone();
        push_checked(
            records,
            RawRecord::from_columns(column(0), column(1), column(2), column(3)),
        );
    }
    page.clear();
}
