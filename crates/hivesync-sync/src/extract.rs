// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HiveSync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Minimal string-value scraping for loosely-structured JSON-ish documents
//!
//! Looks for `"key":"value"` (optional whitespace after the colon) without
//! parsing the surrounding document. Values are returned raw: no escape
//! handling, the value ends at the next `"`.

/// A located string value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    /// Byte offset of the opening quote of the key
    pub key_pos: usize,
    /// Byte offset just past the closing quote of the value
    pub end: usize,
    pub value: &'a str,
}

/// Find the first string value for `key` anywhere in `doc`
pub fn find_string<'a>(doc: &'a str, key: &str) -> Option<&'a str> {
    find_string_from(doc, key, 0).map(|m| m.value)
}

/// Find the first string value for `key` at or after byte offset `from`
///
/// Only the first occurrence of the key at or after `from` is considered: if
/// it is not followed by a quoted value the result is `None`, even when a
/// later occurrence would match. Callers move `from` to disambiguate.
pub fn find_string_from<'a>(doc: &'a str, key: &str, from: usize) -> Option<Match<'a>> {
    let needle = format!("\"{key}\":");
    let tail = doc.get(from..)?;
    let key_pos = from + tail.find(&needle)?;

    let after_colon = key_pos + needle.len();
    let rest = doc.get(after_colon..)?;
    let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
    let value_start = after_colon + (rest.len() - trimmed.len());

    let body = trimmed.strip_prefix('"')?;
    let len = body.find('"')?;
    let value = body.get(..len)?;

    Some(Match {
        key_pos,
        end: value_start + 1 + len + 1,
        value,
    })
}

/// Byte offset of the first occurrence of `needle` at or after `from`
pub fn find_literal(doc: &str, needle: &str, from: usize) -> Option<usize> {
    doc.get(from..)?.find(needle).map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_simple_value() {
        let doc = r#"{"tag_name":"v1.2.3","name":"Release"}"#;
        assert_eq!(find_string(doc, "tag_name"), Some("v1.2.3"));
        assert_eq!(find_string(doc, "name"), Some("Release"));
    }

    #[test]
    fn test_whitespace_after_colon() {
        let doc = "{\"api_token\":   \"abc123\"}";
        assert_eq!(find_string(doc, "api_token"), Some("abc123"));
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(find_string(r#"{"a":"b"}"#, "api_token"), None);
        assert_eq!(find_string("", "a"), None);
    }

    #[test]
    fn test_non_string_value_is_not_found() {
        let doc = r#"{"id":42,"key":"abc"}"#;
        assert_eq!(find_string(doc, "id"), None);
        assert_eq!(find_string(doc, "key"), Some("abc"));
    }

    #[test]
    fn test_unterminated_value() {
        assert_eq!(find_string(r#"{"a":"open"#, "a"), None);
    }

    #[test]
    fn test_no_unescaping() {
        let doc = r#"{"url":"https:\/\/example.com\/x"}"#;
        assert_eq!(find_string(doc, "url"), Some(r"https:\/\/example.com\/x"));
    }

    #[test]
    fn test_from_offset_skips_earlier_matches() {
        let doc = r#"[{"name":"a.bin"},{"name":"b.bin"}]"#;
        let first = find_string_from(doc, "name", 0).unwrap();
        assert_eq!(first.value, "a.bin");

        let second = find_string_from(doc, "name", first.end).unwrap();
        assert_eq!(second.value, "b.bin");
        assert!(second.key_pos > first.key_pos);
        assert!(find_string_from(doc, "name", second.end).is_none());
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(find_string_from(r#"{"a":"b"}"#, "a", 100).is_none());
    }

    #[test]
    fn test_offset_inside_multibyte_char() {
        let doc = r#"{"ž":"x","a":"b"}"#;
        // byte 3 is inside the two-byte 'ž'
        assert!(find_string_from(doc, "a", 3).is_none());
        assert_eq!(find_string_from(doc, "a", 0).unwrap().value, "b");
    }

    #[test]
    fn test_match_end_points_past_value() {
        let doc = r#"{"k":"v","z":1}"#;
        let m = find_string_from(doc, "k", 0).unwrap();
        assert_eq!(&doc[m.end..m.end + 1], ",");
    }

    #[test]
    fn test_find_literal() {
        assert_eq!(find_literal("abcabc", "bc", 0), Some(1));
        assert_eq!(find_literal("abcabc", "bc", 2), Some(4));
        assert_eq!(find_literal("abcabc", "zz", 0), None);
    }
}
