//! Document filename matching and selection of the most recent match.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use super::LocateError;

/// Default filename pattern.
///
/// Accepts `*-xls-*`, `EHT_<YYYYMMDD | YYYY-MM-DD | YYYY_MM_DD | 2NNNNN>.{pdf,xls,xlsx}`
/// and `AVT_NN_NN_2NNN.{pdf,xls,xlsx}`.
pub const DEFAULT_PATTERN: &str = r"^(.*-xls-.*$|EHT_([0-9]{8}|[0-9]{4}[_-][0-9]{2}[_-][0-9]{2}|2[0-9]{5})\.(pdf|xlsx?)|AVT_[0-9]{2}_[0-9]{2}_2[0-9]{3}\.(pdf|xlsx?))$";

#[allow(clippy::expect_used)]
static SEPARATED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^EHT_([0-9]{4})[_-]([0-9]{2})[_-]([0-9]{2})(\..*)$")
        .expect("separated date regex is valid")
});

/// Compiled filename pattern.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    regex: Regex,
}

impl FilenamePattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::InvalidPattern`] if the expression does not compile.
    pub fn new(pattern: &str) -> Result<Self, LocateError> {
        let regex = Regex::new(pattern).map_err(|source| LocateError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// Returns true when `filename` matches.
    #[must_use]
    pub fn is_match(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }

    /// The source expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for FilenamePattern {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        Self::new(DEFAULT_PATTERN).expect("default pattern is valid")
    }
}

/// Orders filenames so that the most recent publication sorts last.
///
/// Names are compared lexicographically, except that separated EHT dates
/// (`EHT_2019-03-01.pdf`) compare as their compact form (`EHT_20190301.pdf`),
/// so mixed naming schemes in one listing still order by date.
#[must_use]
pub fn compare_filenames(a: &str, b: &str) -> Ordering {
    selection_key(a)
        .cmp(&selection_key(b))
        .then_with(|| a.cmp(b))
}

fn selection_key(filename: &str) -> Cow<'_, str> {
    match SEPARATED_DATE.captures(filename) {
        Some(caps) => Cow::Owned(format!("EHT_{}{}{}{}", &caps[1], &caps[2], &caps[3], &caps[4])),
        None => Cow::Borrowed(filename),
    }
}
