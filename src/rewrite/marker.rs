//! Word marking inside HTML text nodes.
//!
//! # Responsibilities
//! - Find words of exactly `word_length` alphanumeric characters
//! - Append the marker right after each of them
//! - Touch only document text: never tag names, attributes, comments,
//!   scripts or styles
//!
//! # Design Decisions
//! - `lol_html` streams the document in its declared charset and
//!   re-serializes untouched bytes as-is
//! - A text chunk is replaced only when a marker lands in it; every other
//!   chunk keeps its original bytes
//! - Matching runs over the whole text node seen so far, so a word split
//!   across parser chunks is still seen whole
//! - Text is raw HTML source, so character references (`&nbsp;`, `&#1234;`)
//!   are skipped and the marker is escaped before insertion

use encoding_rs::{Encoding, UTF_8};
use lol_html::html_content::{ContentType, TextType};
use lol_html::{doc_text, AsciiCompatibleEncoding, HtmlRewriter, Settings};
use regex::Regex;

use crate::error::ProxyError;

/// Appends a marker after every word of a fixed length.
#[derive(Debug, Clone)]
pub struct WordMarker {
    pattern: Regex,
    marker: String,
}

impl WordMarker {
    /// Compile a marker for words of exactly `word_length` characters.
    ///
    /// With `unicode_words` every Unicode letter or digit counts as a word
    /// character; otherwise only `[a-zA-Z0-9]` does.
    pub fn new(
        word_length: usize,
        marker: impl Into<String>,
        unicode_words: bool,
    ) -> Result<Self, ProxyError> {
        if word_length == 0 {
            return Err(ProxyError::ContentRewrite(
                "word length must be positive".to_string(),
            ));
        }
        let class = if unicode_words { r"[^\W_]" } else { "[a-zA-Z0-9]" };
        let pattern = Regex::new(&format!(r"\b{}{{{}}}\b", class, word_length))
            .map_err(|e| ProxyError::ContentRewrite(e.to_string()))?;

        Ok(Self {
            pattern,
            marker: marker.into(),
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Mark words in plain text.
    pub fn mark_text(&self, text: &str) -> String {
        let points = self.insertion_points(text, 0, true, false);
        insert_at(text, &points, &self.marker)
    }

    /// Mark words in an HTML document held as text.
    pub fn apply(&self, html: &str) -> Result<String, ProxyError> {
        let output = self.apply_bytes(html.as_bytes(), UTF_8)?;
        String::from_utf8(output).map_err(|e| ProxyError::ContentRewrite(e.to_string()))
    }

    /// Mark words in the text nodes of an HTML document encoded as `encoding`.
    ///
    /// The output stays in `encoding`. Marker characters the encoding cannot
    /// represent are written as numeric character references.
    pub fn apply_bytes(
        &self,
        html: &[u8],
        encoding: &'static Encoding,
    ) -> Result<Vec<u8>, ProxyError> {
        let document_encoding = AsciiCompatibleEncoding::new(encoding).ok_or_else(|| {
            ProxyError::ContentRewrite(format!("unsupported charset {}", encoding.name()))
        })?;
        let marker_html = encode_marker(&self.marker, encoding);

        let mut output = Vec::with_capacity(html.len() + html.len() / 16);
        let mut node = String::new();

        let mut rewriter = HtmlRewriter::new(
            Settings {
                document_content_handlers: vec![doc_text!(move |chunk| {
                    if !matches!(chunk.text_type(), TextType::Data | TextType::RCData) {
                        return Ok(());
                    }
                    let offset = node.len();
                    node.push_str(chunk.as_str());
                    let last = chunk.last_in_text_node();

                    let points = self.insertion_points(&node, offset, last, true);
                    if !points.is_empty() {
                        let marked = insert_at(&node[offset..], &points, &marker_html);
                        chunk.replace(&marked, ContentType::Html);
                    }
                    if last {
                        node.clear();
                    }
                    Ok(())
                })],
                encoding: document_encoding,
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html)
            .map_err(|e| ProxyError::ContentRewrite(e.to_string()))?;
        rewriter
            .end()
            .map_err(|e| ProxyError::ContentRewrite(e.to_string()))?;
        Ok(output)
    }

    /// Marker positions in `node[offset..]`, relative to `offset`.
    ///
    /// A word ending at the end of an unfinished node may still continue in
    /// the next chunk, so it is left for that chunk to decide.
    fn insertion_points(
        &self,
        node: &str,
        offset: usize,
        complete: bool,
        skip_char_refs: bool,
    ) -> Vec<usize> {
        self.pattern
            .find_iter(node)
            .filter(|m| !(skip_char_refs && is_char_reference(node, m.start(), m.end())))
            .map(|m| m.end())
            .filter(|&end| end >= offset && (complete || end < node.len()))
            .map(|end| end - offset)
            .collect()
    }
}

/// Mark words of `word_length` characters in `html` with Unicode word rules.
pub fn apply_word_marker(html: &str, word_length: usize, marker: &str) -> Result<String, ProxyError> {
    WordMarker::new(word_length, marker, true)?.apply(html)
}

/// Encoding declared by the `charset` parameter of a Content-Type value.
///
/// No parameter means UTF-8. `None` for labels `lol_html` cannot stream
/// (unknown, or not ASCII-compatible such as UTF-16).
pub fn charset_encoding(content_type: &str) -> Option<&'static Encoding> {
    let label = content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    });
    match label {
        None => Some(UTF_8),
        Some(label) => Encoding::for_label(label.as_bytes())
            .filter(|encoding| AsciiCompatibleEncoding::new(*encoding).is_some()),
    }
}

fn insert_at(text: &str, points: &[usize], marker: &str) -> String {
    let mut out = String::with_capacity(text.len() + points.len() * marker.len());
    let mut cursor = 0;
    for &point in points {
        out.push_str(&text[cursor..point]);
        out.push_str(marker);
        cursor = point;
    }
    out.push_str(&text[cursor..]);
    out
}

fn is_char_reference(text: &str, start: usize, end: usize) -> bool {
    let before = &text[..start];
    let named_or_numeric = before.ends_with('&') || before.ends_with("&#");
    named_or_numeric && text[end..].starts_with(';')
}

/// Marker as HTML source for a document in `encoding`: markup characters
/// escaped, unrepresentable characters as numeric references.
fn encode_marker(marker: &str, encoding: &'static Encoding) -> String {
    let mut out = String::with_capacity(marker.len());
    let mut buf = [0u8; 4];
    for ch in marker.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let (_, _, unmappable) = encoding.encode(ch.encode_utf8(&mut buf));
                if unmappable {
                    out.push_str(&format!("&#{};", u32::from(ch)));
                } else {
                    out.push(ch);
                }
            }
        }
    }
    out
}
