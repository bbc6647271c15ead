//! Low-level text helpers shared by the header grammars.

use encoding_rs::UTF_8;

use super::types::models::HeaderValue;

/// Decodes bytes as UTF-8, replacing invalid sequences with U+FFFD.
///
/// Returns the text and whether any replacement happened.
pub fn decode_lossy(bytes: &[u8]) -> (String, bool) {
    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    (text.into_owned(), had_errors)
}

/// Strips trailing ASCII whitespace (including `\r` and `\n`) from a raw line.
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

/// Splits header text on `separator` and drops the trailing entries the
/// end-tag lines leave behind.
pub fn header_entries<'a>(text: &'a str, separator: &str, trailing: usize) -> Vec<&'a str> {
    let mut entries: Vec<&str> = text.split(separator).collect();
    entries.truncate(entries.len().saturating_sub(trailing));
    entries
}

/// Interprets a raw `key=value` right-hand side: surrounding quotes are
/// removed and a `;` splits the value into a list.
pub fn split_raw_value(raw: &str) -> HeaderValue {
    let unquoted = raw.trim().trim_matches('"');
    if unquoted.contains(';') {
        HeaderValue::List(unquoted.split(';').map(str::to_string).collect())
    } else {
        HeaderValue::Text(unquoted.to_string())
    }
}
