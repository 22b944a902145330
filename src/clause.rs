//! Clause extraction for DDL definition lines.
//!
//! Every function here is a pure string function that tolerates lines with
//! none of the clauses it looks for. Quoted spans are masked before any
//! keyword search, so `COMMENT "uses DEFAULT 1"` never yields a default.

use regex::Regex;
use std::sync::LazyLock;

static DEFAULT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)(?:DEFAULT(?:\s+ALWAYS)?|VALUE)\s+(.*?)\s*(?:\sCOMMENT\b|\sPERMISSIONS\b|\sASSERT\b|\sREADONLY\b|;|$)",
    )
    .unwrap()
});

static TYPE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)(?:FLEXIBLE\s+)?TYPE\s+(.*?)\s*(?:\s(?:DEFAULT|VALUE|COMMENT|PERMISSIONS|ASSERT|READONLY|OPTIONAL|REFERENCE)\b|;|$)",
    )
    .unwrap()
});

static OPTIONAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)OPTIONAL\b").unwrap());

/// Replace the contents of every quoted span with spaces.
///
/// Byte offsets are preserved, so matches found in the masked text can be
/// sliced out of the original line.
pub fn mask_quoted(line: &str) -> String {
    let mut masked = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in line.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                    masked.push(c);
                    continue;
                }
                masked.extend(std::iter::repeat_n(' ', c.len_utf8()));
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                masked.push(c);
            }
        }
    }

    masked
}

/// Byte offset of `keyword` as a standalone word outside quoted spans.
///
/// Matching is case-insensitive; the keyword must start the line or follow
/// whitespace.
pub fn find_keyword(line: &str, keyword: &str) -> Option<usize> {
    let masked = mask_quoted(line).to_ascii_uppercase();
    let keyword = keyword.to_ascii_uppercase();
    let mut from = 0;

    while let Some(pos) = masked[from..].find(&keyword) {
        let start = from + pos;
        let end = start + keyword.len();
        let before_ok = start == 0
            || masked[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace);
        let after_ok = masked[end..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }

    None
}

/// Payload of a `COMMENT "..."` clause.
///
/// The first quote character after the keyword opens the span; the span
/// closes at the next unescaped quote of the same character. Returns `None`
/// when there is no complete quoted span.
pub fn extract_comment(line: &str) -> Option<String> {
    let keyword = find_keyword(line, "COMMENT")?;
    let rest = &line[keyword + "COMMENT".len()..];
    let (open, quote) = rest.char_indices().find(|(_, c)| *c == '"' || *c == '\'')?;
    let body = &rest[open + 1..];

    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(body[..i].to_string());
        }
    }

    None
}

/// Payload of a `DEFAULT`, `DEFAULT ALWAYS` or `VALUE` clause, trimmed.
pub fn extract_default(line: &str) -> Option<String> {
    capture_masked(&DEFAULT_CLAUSE, line)
}

/// The raw type token following `TYPE` (or `FLEXIBLE TYPE`).
pub fn extract_type(line: &str) -> Option<String> {
    capture_masked(&TYPE_CLAUSE, line)
}

/// Whether the line carries an explicit `OPTIONAL` marker outside quotes.
pub fn has_optional_marker(line: &str) -> bool {
    OPTIONAL_MARKER.is_match(&mask_quoted(line))
}

fn capture_masked(pattern: &Regex, line: &str) -> Option<String> {
    let masked = mask_quoted(line);
    let group = pattern.captures(&masked)?.get(1)?;
    let value = line[group.start()..group.end()].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_double_quotes() {
        let line = r#"DEFINE FIELD name ON user TYPE string COMMENT "Display name";"#;
        assert_eq!(extract_comment(line), Some("Display name".to_string()));
    }

    #[test]
    fn test_comment_single_quotes_and_escapes() {
        let line = r#"COMMENT 'it\'s the owner' PERMISSIONS FULL"#;
        assert_eq!(extract_comment(line), Some(r"it\'s the owner".to_string()));
    }

    #[test]
    fn test_comment_opening_quote_decides_delimiter() {
        assert_eq!(
            extract_comment(r#"DEFINE FIELD greeting ON user TYPE string COMMENT 'say "hi"';"#),
            Some(r#"say "hi""#.to_string())
        );
        assert_eq!(
            extract_comment(r#"DEFINE FIELD nick ON user COMMENT 'Nickname' PERMISSIONS FOR select WHERE role = "admin";"#),
            Some("Nickname".to_string())
        );
    }

    #[test]
    fn test_comment_unterminated() {
        assert_eq!(extract_comment(r#"COMMENT "never closed"#), None);
        assert_eq!(extract_comment("DEFINE TABLE user SCHEMAFULL;"), None);
    }

    #[test]
    fn test_default_variants() {
        assert_eq!(
            extract_default("TYPE int DEFAULT 0 COMMENT \"count\";"),
            Some("0".to_string())
        );
        assert_eq!(
            extract_default("TYPE datetime DEFAULT ALWAYS time::now();"),
            Some("time::now()".to_string())
        );
        assert_eq!(
            extract_default("TYPE datetime VALUE time::now() PERMISSIONS NONE"),
            Some("time::now()".to_string())
        );
        assert_eq!(
            extract_default("  DEFAULT 'a; b' ASSERT $value != NONE"),
            Some("'a; b'".to_string())
        );
    }

    #[test]
    fn test_default_ignores_quoted_keywords() {
        let line = r#"TYPE string COMMENT "uses DEFAULT 1 elsewhere";"#;
        assert_eq!(extract_default(line), None);
    }

    #[test]
    fn test_type_token() {
        assert_eq!(
            extract_type("ON post TYPE option<record<user>> DEFAULT NONE;"),
            Some("option<record<user>>".to_string())
        );
        assert_eq!(
            extract_type("ON post FLEXIBLE TYPE object;"),
            Some("object".to_string())
        );
        assert_eq!(
            extract_type("ON post TYPE record<comment> COMMENT 'x'"),
            Some("record<comment>".to_string())
        );
        assert_eq!(extract_type("ON post PERMISSIONS FULL;"), None);
    }

    #[test]
    fn test_optional_marker() {
        assert!(has_optional_marker("TYPE string OPTIONAL"));
        assert!(!has_optional_marker(r#"TYPE string COMMENT "OPTIONAL later""#));
        assert!(!has_optional_marker("TYPE record<optional_items>"));
    }

    #[test]
    fn test_find_keyword_boundaries() {
        assert_eq!(find_keyword("TYPE string COMMENT 'x'", "comment"), Some(12));
        assert_eq!(find_keyword("TYPE string COMMENTS", "COMMENT"), None);
        assert_eq!(find_keyword("TYPE record<comment>", "COMMENT"), None);
    }
}
