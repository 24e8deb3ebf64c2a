//! Filename extraction from response headers and URLs.

use tracing::debug;
use url::Url;

/// Parses a Content-Disposition header to extract the filename.
///
/// Handles:
/// - `attachment; filename="EHT_20240301.xlsx"`
/// - `attachment; filename=EHT_20240301.xlsx`
/// - `attachment; filename*=UTF-8''EHT%2020240301.xlsx` (RFC 5987)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    // filename*= takes precedence (RFC 6266)
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name) {
                return Some(decoded.into_owned());
            }
        }
    }

    let mut search_from = 0;
    while let Some(found) = header[search_from..].find("filename=") {
        let pos = search_from + found;
        search_from = pos + 9;
        // Skip a `filename=` that is really the tail of `filename*=`.
        if header[..pos].ends_with('*') {
            continue;
        }
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}

/// Returns the percent-decoded last non-empty path segment of `url`.
#[must_use]
pub fn final_path_segment(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let decoded = urlencoding::decode(last).map_or_else(
        |e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.to_string()
        },
        std::borrow::Cow::into_owned,
    );
    Some(decoded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_disposition_quoted() {
        let header = r#"attachment; filename="EHT_20240301.xlsx""#;
        assert_eq!(
            parse_content_disposition(header),
            Some("EHT_20240301.xlsx".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_unquoted_with_semicolon() {
        let header = "attachment; filename=EHT_20240301.pdf; size=1234";
        assert_eq!(
            parse_content_disposition(header),
            Some("EHT_20240301.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_rfc5987() {
        let header = "attachment; filename*=UTF-8''AVT%2001_03_2024.xls";
        assert_eq!(
            parse_content_disposition(header),
            Some("AVT 01_03_2024.xls".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_missing() {
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition("inline; filename="), None);
    }

    #[test]
    fn test_final_path_segment_decodes_and_skips_trailing_slash() {
        let url = Url::parse("https://giro.hu/documents/1234/EHT%5F20240301.xlsx").unwrap();
        assert_eq!(final_path_segment(&url), Some("EHT_20240301.xlsx".to_string()));

        let url = Url::parse("https://giro.hu/documents/EHT_20240301.pdf/").unwrap();
        assert_eq!(final_path_segment(&url), Some("EHT_20240301.pdf".to_string()));
    }

    #[test]
    fn test_final_path_segment_ignores_query() {
        let url = Url::parse("https://giro.hu/dl/EHT_20240301.pdf?download=1").unwrap();
        assert_eq!(final_path_segment(&url), Some("EHT_20240301.pdf".to_string()));
    }

    #[test]
    fn test_final_path_segment_root_is_none() {
        let url = Url::parse("https://giro.hu/").unwrap();
        assert_eq!(final_path_segment(&url), None);
    }
}
