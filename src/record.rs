//! Bank branch records and the normalization rules every parser shares.
//!
//! Parsers never construct a [`Record`] directly. They fill a [`RawRecord`]
//! field by field and hand it to [`push_checked`], which trims the values,
//! recovers postal codes that were glued onto the address, and only keeps
//! records whose bank code is exactly [`BANK_CODE_LEN`] characters long.

use std::fmt;

use serde::Serialize;
use tracing::trace;

/// Required length of a normalized bank/branch code.
pub const BANK_CODE_LEN: usize = 8;

/// Length of a Hungarian postal code.
const POSTAL_CODE_LEN: usize = 4;

/// A participating institution branch.
///
/// Example source line:
/// `10002003  Magyar Államkincstár  1139  Budapest, Váci út 71.`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    /// 8-character branch/bank code (the record key).
    pub bank_code: String,
    /// Bank identifier code; only filled by the central-bank spreadsheet layout.
    pub bic: String,
    /// Institution name.
    pub name: String,
    /// Postal code.
    pub postal_code: String,
    /// Street address.
    pub address: String,
}

/// Unvalidated field values as read from a source document.
///
/// Scratch value reused across rows by the parsers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub bank_code: String,
    pub bic: String,
    pub name: String,
    pub postal_code: String,
    pub address: String,
}

impl RawRecord {
    /// Builds a raw record from the four columns every layout shares.
    #[must_use]
    pub fn from_columns(
        bank_code: impl Into<String>,
        name: impl Into<String>,
        postal_code: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            bank_code: bank_code.into(),
            bic: String::new(),
            name: name.into(),
            postal_code: postal_code.into(),
            address: address.into(),
        }
    }
}

impl From<Record> for RawRecord {
    fn from(record: Record) -> Self {
        Self {
            bank_code: record.bank_code,
            bic: record.bic,
            name: record.name,
            postal_code: record.postal_code,
            address: record.address,
        }
    }
}

impl Record {
    /// Returns true when every field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bank_code.is_empty()
            && self.bic.is_empty()
            && self.name.is_empty()
            && self.postal_code.is_empty()
            && self.address.is_empty()
    }

    /// Returns true when the record has a code, a name, and some location.
    ///
    /// This is the coarse filter applied after a whole document is parsed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.bank_code.is_empty()
            && !self.name.is_empty()
            && !(self.postal_code.is_empty() && self.address.is_empty())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={:?} ({}) {}",
            self.bank_code, self.name, self.postal_code, self.address
        )
    }
}

/// Normalizes raw field values without deciding whether to keep them.
///
/// - trims surrounding whitespace and drops embedded NUL bytes
/// - when the postal code is empty and the address starts with four digits
///   followed by a space, moves those digits into the postal code
#[must_use]
pub fn normalize(raw: RawRecord) -> Record {
    let mut record = Record {
        bank_code: clean_field(&raw.bank_code),
        bic: clean_field(&raw.bic),
        name: clean_field(&raw.name),
        postal_code: clean_field(&raw.postal_code),
        address: clean_field(&raw.address),
    };

    if record.postal_code.is_empty()
        && let Some((postal_code, address)) = split_postal_code(&record.address)
    {
        record.postal_code = postal_code.to_string();
        record.address = address.to_string();
    }

    record
}

/// Normalizes a raw record and returns it only if it is acceptable.
///
/// A record is rejected when it is entirely empty or its bank code is not
/// exactly [`BANK_CODE_LEN`] characters.
#[must_use]
pub fn accept(raw: RawRecord) -> Option<Record> {
    let record = normalize(raw);
    if record.is_empty() || record.bank_code.chars().count() != BANK_CODE_LEN {
        trace!(%record, "record rejected");
        return None;
    }
    Some(record)
}

/// Normalizes `raw` and appends it to `records` when accepted.
///
/// Returns true when the record was kept.
pub fn push_checked(records: &mut Vec<Record>, raw: RawRecord) -> bool {
    match accept(raw) {
        Some(record) => {
            records.push(record);
            true
        }
        None => false,
    }
}

/// Removes records lacking a code, a name, or both postal code and address.
///
/// Order of the surviving records is preserved.
pub fn retain_complete(records: &mut Vec<Record>) {
    records.retain(Record::is_complete);
}

fn clean_field(value: &str) -> String {
    if value.contains('\0') {
        value.replace('\0', "").trim().to_string()
    } else {
        value.trim().to_string()
    }
}

fn split_postal_code(address: &str) -> Option<(&str, &str)> {
    if address.len() <= POSTAL_CODE_LEN + 1 {
        return None;
    }
    let space = address.find(' ')?;
    if space != POSTAL_CODE_LEN {
        return None;
    }
    let (postal_code, rest) = address.split_at(space);
    if !postal_code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((postal_code, &rest[1..]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(code: &str, name: &str, postal: &str, address: &str) -> RawRecord {
        RawRecord::from_columns(code, name, postal, address)
    }

    // ==================== Normalization Tests ====================

    #[test]
    fn test_normalize_trims_and_strips_nul_bytes() {
        let record = normalize(raw(" 1000\u{0}2003 ", "\tMÁK \n", " 1139", "Váci út 71. "));
        assert_eq!(record.bank_code, "10002003");
        assert_eq!(record.name, "MÁK");
        assert_eq!(record.postal_code, "1139");
        assert_eq!(record.address, "Váci út 71.");
    }

    #[test]
    fn test_normalize_recovers_postal_code_from_address() {
        let record = normalize(raw("", "", "", "1139 Budapest, Váci út 71."));
        assert_eq!(record.postal_code, "1139");
        assert_eq!(record.address, "Budapest, Váci út 71.");
    }

    #[test]
    fn test_normalize_keeps_address_without_leading_digits() {
        let record = normalize(raw("10002003", "MÁK", "", "Bp12 Váci út 71."));
        assert_eq!(record.postal_code, "");
        assert_eq!(record.address, "Bp12 Váci út 71.");
    }

    #[test]
    fn test_normalize_requires_space_at_offset_four() {
        let record = normalize(raw("10002003", "MÁK", "", "11390 Budapest"));
        assert_eq!(record.postal_code, "");
        assert_eq!(record.address, "11390 Budapest");
    }

    #[test]
    fn test_normalize_ignores_short_address() {
        let record = normalize(raw("10002003", "MÁK", "", "1139 "));
        assert_eq!(record.postal_code, "");
        assert_eq!(record.address, "1139");
    }

    #[test]
    fn test_normalize_does_not_split_when_postal_code_present() {
        let record = normalize(raw("10002003", "MÁK", "1138", "1139 Budapest"));
        assert_eq!(record.postal_code, "1138");
        assert_eq!(record.address, "1139 Budapest");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            raw(" 10002003", "Magyar Államkincstár ", "", "1139 Budapest, Váci út 71."),
            raw("1000", "x", "y", "z"),
            raw("\u{0}", "", "", ""),
            raw("11773016", "OTP", "1051", "1051 Budapest, Nádor u. 16."),
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(RawRecord::from(once.clone()));
            assert_eq!(once, twice);
        }
    }

    // ==================== Acceptance Tests ====================

    #[test]
    fn test_accept_rejects_wrong_code_length() {
        for code in ["", "1000200", "100020031", "1000 2003 "] {
            assert!(
                accept(raw(code, "Bank", "1139", "Budapest")).is_none(),
                "code {code:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_accept_accepts_eight_character_code() {
        let record = accept(raw("10002003", "Bank", "", "Budapest")).unwrap();
        assert_eq!(record.bank_code, "10002003");
        assert!(record.is_complete());
    }

    #[test]
    fn test_accept_rejects_all_empty_record() {
        assert!(accept(RawRecord::default()).is_none());
        assert!(accept(raw("  ", "\u{0}", " ", "")).is_none());
    }

    #[test]
    fn test_push_checked_appends_only_accepted() {
        let mut records = Vec::new();
        assert!(push_checked(&mut records, raw("10002003", "A", "1139", "B")));
        assert!(!push_checked(&mut records, raw("Bankszerv", "Név", "", "")));
        assert_eq!(records.len(), 1);
    }

    // ==================== Cleanup Tests ====================

    #[test]
    fn test_retain_complete_preserves_order() {
        let mut records = vec![
            normalize(raw("10000001", "A", "1000", "")),
            normalize(raw("10000002", "", "1000", "x")),
            normalize(raw("10000003", "C", "", "y")),
            normalize(raw("10000004", "D", "", "")),
            normalize(raw("10000005", "E", "1", "z")),
        ];
        retain_complete(&mut records);
        let codes: Vec<_> = records.iter().map(|r| r.bank_code.as_str()).collect();
        assert_eq!(codes, ["10000001", "10000003", "10000005"]);
    }

    #[test]
    fn test_display_format() {
        let record = normalize(raw("10002003", "MÁK", "1139", "Budapest"));
        assert_eq!(record.to_string(), "10002003=\"MÁK\" (1139) Budapest");
    }
}
