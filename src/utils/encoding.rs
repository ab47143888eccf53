//! Encoding detection and conversion utilities
//!
//! Batch input files come from spreadsheets and editors that like to prepend
//! byte order marks or save as UTF-16.

use encoding_rs::{Encoding, UTF_8};

/// Detect encoding from a byte order mark, defaulting to UTF-8
pub fn detect_encoding(data: &[u8]) -> &'static Encoding {
    Encoding::for_bom(data)
        .map(|(encoding, _)| encoding)
        .unwrap_or(UTF_8)
}

/// Decode raw bytes to text, stripping any BOM.
///
/// Returns the decoded text, the encoding name and whether replacement
/// characters had to be inserted.
pub fn decode_text(data: &[u8]) -> (String, &'static str, bool) {
    let encoding = detect_encoding(data);
    let (text, actual, had_errors) = encoding.decode(data);
    (text.into_owned(), actual.name(), had_errors)
}
