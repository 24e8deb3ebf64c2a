//! Streaming extraction of candidate links from an index page.
//!
//! The page is fed chunk by chunk into an HTML tokenizer; no DOM is built.
//! Every `<a href>` whose value contains [`DOCUMENTS_PATH_MARKER`] and no
//! space is kept, in document order.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

/// Substring an href must contain to be considered a document candidate.
pub const DOCUMENTS_PATH_MARKER: &str = "/documents/";

/// Token sink collecting matching anchor hrefs.
#[derive(Debug, Default)]
struct HrefCollector {
    hrefs: Vec<String>,
}

impl TokenSink for HrefCollector {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(Tag {
            kind: TagKind::StartTag,
            name,
            attrs,
            ..
        }) = token
            && &*name == "a"
        {
            for attr in attrs {
                if &*attr.name.local != "href" {
                    continue;
                }
                let value: &str = &attr.value;
                if value.contains(DOCUMENTS_PATH_MARKER) && !value.contains(' ') {
                    self.hrefs.push(value.to_string());
                }
            }
        }
        TokenSinkResult::Continue
    }
}

/// Incremental anchor extractor.
///
/// Feed raw body chunks with [`push`](Self::push) and call
/// [`finish`](Self::finish) once the body is exhausted. Multi-byte UTF-8
/// sequences split across chunk boundaries are carried over to the next chunk.
pub struct LinkExtractor {
    tokenizer: Tokenizer<HrefCollector>,
    queue: BufferQueue,
    pending: Vec<u8>,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkExtractor {
    /// Creates an extractor with an empty tokenizer state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(HrefCollector::default(), TokenizerOpts::default()),
            queue: BufferQueue::default(),
            pending: Vec::new(),
        }
    }

    /// Tokenizes the next chunk of the page body.
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let split = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        if split == 0 {
            return;
        }
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        self.feed(text);
    }

    /// Flushes the tokenizer and returns the collected hrefs.
    #[must_use]
    pub fn finish(mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.feed(rest);
        }
        self.tokenizer.end();
        std::mem::take(&mut self.tokenizer.sink.hrefs)
    }

    fn feed(&mut self, text: String) {
        self.queue.push_back(StrTendril::from(text));
        let _ = self.tokenizer.feed(&mut self.queue);
    }
}

/// Extracts candidate hrefs from a complete HTML document.
#[must_use]
pub fn extract_candidate_hrefs(html: &str) -> Vec<String> {
    let mut extractor = LinkExtractor::new();
    extractor.push(html.as_bytes());
    extractor.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head><title>Dokumentumok</title></head>
<body>
  <a href="https://www.giro.hu/documents/1234">EHT</a>
  <a class="x" href="/documents/5678" target="_blank">EHT pdf</a>
  <a href="https://www.giro.hu/hirek/1">News</a>
  <a href="https://www.giro.hu/documents/bad link">broken</a>
  <link href="https://www.giro.hu/documents/style.css">
  <a name="anchor">no href</a>
</body></html>"#;

    #[test]
    fn test_extract_candidate_hrefs_filters_by_marker_and_spaces() {
        let hrefs = extract_candidate_hrefs(PAGE);
        assert_eq!(
            hrefs,
            ["https://www.giro.hu/documents/1234", "/documents/5678"]
        );
    }

    #[test]
    fn test_link_extractor_handles_tags_split_across_chunks() {
        let mut extractor = LinkExtractor::new();
        for chunk in PAGE.as_bytes().chunks(7) {
            extractor.push(chunk);
        }
        assert_eq!(
            extractor.finish(),
            ["https://www.giro.hu/documents/1234", "/documents/5678"]
        );
    }

    #[test]
    fn test_link_extractor_handles_utf8_split_across_chunks() {
        let page = "<p>Átutalási dokumentumok</p><a href=\"/documents/é1\">x</a>";
        let bytes = page.as_bytes();
        let mut extractor = LinkExtractor::new();
        // Byte-at-a-time feeding splits every multi-byte character.
        for byte in bytes {
            extractor.push(std::slice::from_ref(byte));
        }
        assert_eq!(extractor.finish(), ["/documents/é1"]);
    }

    #[test]
    fn test_extract_candidate_hrefs_tolerates_malformed_markup() {
        let page = "<a href='/documents/1'><a href=/documents/2 <div><a href=\"/documents/3\"";
        let hrefs = extract_candidate_hrefs(page);
        assert!(hrefs.contains(&"/documents/1".to_string()), "got {hrefs:?}");
    }

    #[test]
    fn test_extract_candidate_hrefs_empty_page() {
        assert!(extract_candidate_hrefs("").is_empty());
    }
}
