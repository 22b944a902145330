//! Restricted SELECT-query parser.
//!
//! Handles `SELECT fields FROM [ONLY] table [WHERE ...] [ORDER BY ...]
//! [LIMIT n] [START n] [FETCH ...]`. Other statements are recognised by
//! their leading keyword only.
//!
//! # Field selections
//!
//! ```text
//! SELECT *, author.*, comments.*.author.name, title AS headline FROM post
//!        ┬  ───┬────  ──────────┬──────────  ───────┬───────
//!        │     │                │                   └── plain field with alias
//!        │     │                └── nested chain, `*` segments skipped
//!        │     └── one-level nested wildcard
//!        └── wildcard
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, rest, value},
    multi::separated_list1,
    sequence::{pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clause::mask_quoted;

/// Leading keyword of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Create,
    Update,
    Upsert,
    Delete,
    Insert,
    Relate,
    Other,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Create => "CREATE",
            StatementKind::Update => "UPDATE",
            StatementKind::Upsert => "UPSERT",
            StatementKind::Delete => "DELETE",
            StatementKind::Insert => "INSERT",
            StatementKind::Relate => "RELATE",
            StatementKind::Other => "OTHER",
        };
        f.write_str(keyword)
    }
}

/// One entry of the selection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldSelection {
    /// `*`
    Wildcard,
    /// A named field, optionally renamed and with nested sub-selections.
    Field {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        nested: Vec<FieldSelection>,
    },
}

impl FieldSelection {
    /// A plain field without nesting.
    pub fn field(name: &str) -> Self {
        FieldSelection::Field {
            name: name.to_string(),
            alias: None,
            nested: Vec::new(),
        }
    }

    /// A field with nested sub-selections.
    pub fn nested(name: &str, nested: Vec<FieldSelection>) -> Self {
        FieldSelection::Field {
            name: name.to_string(),
            alias: None,
            nested,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, FieldSelection::Wildcard)
    }

    fn with_alias(self, alias: Option<String>) -> Self {
        match self {
            FieldSelection::Field { name, nested, .. } => FieldSelection::Field {
                name,
                alias,
                nested,
            },
            wildcard => wildcard,
        }
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelection::Wildcard => write!(f, "*"),
            FieldSelection::Field {
                name,
                alias,
                nested,
            } => {
                write!(f, "{}", name)?;
                if !nested.is_empty() {
                    let inner: Vec<String> = nested.iter().map(|n| n.to_string()).collect();
                    write!(f, " {{ {} }}", inner.join(", "))?;
                }
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
        }
    }
}

/// A simple `field op value` condition from the WHERE clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: String,
    pub value: String,
}

/// Parsed form of one query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub kind: StatementKind,
    /// Referenced tables; the first one is the queried table.
    pub tables: Vec<String>,
    pub fields: Vec<FieldSelection>,
    pub conditions: Vec<Condition>,
    pub limit: Option<u64>,
    pub start: Option<u64>,
    pub order_by: Vec<String>,
    /// Record fields expanded in place by `FETCH`.
    pub fetch: Vec<String>,
    /// `FROM ONLY`: a single record instead of a list.
    pub only: bool,
    pub is_array_result: bool,
}

impl ParsedQuery {
    /// Minimal query for statements other than SELECT.
    pub fn minimal(kind: StatementKind) -> Self {
        Self {
            kind,
            tables: Vec::new(),
            fields: Vec::new(),
            conditions: Vec::new(),
            limit: None,
            start: None,
            order_by: Vec::new(),
            fetch: Vec::new(),
            only: false,
            is_array_result: false,
        }
    }

    /// The queried table, if any.
    pub fn table(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }

    /// True when the selection list is empty or contains a bare `*`.
    pub fn selects_all(&self) -> bool {
        self.fields.is_empty() || self.fields.iter().any(FieldSelection::is_wildcard)
    }
}

const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "SPLIT", "GROUP", "ORDER", "LIMIT", "START", "FETCH", "TIMEOUT", "PARALLEL",
    "EXPLAIN", "WITH",
];

/// Parse a query string. Never fails; unsupported statements yield a minimal query.
pub fn parse(query: &str) -> ParsedQuery {
    let query = query.trim().trim_end_matches(';').trim_end();

    let kind = statement_kind(query)
        .map(|(_, kind)| kind)
        .unwrap_or(StatementKind::Other);
    if kind != StatementKind::Select {
        return ParsedQuery::minimal(kind);
    }

    let body = query[6..].trim_start();
    let mut parsed = ParsedQuery::minimal(StatementKind::Select);

    let (fields_text, after_from) = match top_level_keywords(body, &["FROM"]).first() {
        Some(&(pos, _)) => (&body[..pos], &body[pos + 4..]),
        None => (body, ""),
    };

    parsed.fields = split_top_level(fields_text, ',')
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_selection)
        .collect();

    let clauses = top_level_keywords(after_from, CLAUSE_KEYWORDS);
    let targets_end = clauses.first().map(|&(pos, _)| pos).unwrap_or(after_from.len());
    let (only, tables) = parse_targets(&after_from[..targets_end]);
    parsed.only = only;
    parsed.tables = tables;

    for (i, &(pos, keyword)) in clauses.iter().enumerate() {
        let end = clauses.get(i + 1).map(|&(next, _)| next).unwrap_or(after_from.len());
        let text = after_from[pos + keyword.len()..end].trim();
        match keyword {
            "WHERE" => parsed.conditions = parse_conditions(text),
            "LIMIT" => parsed.limit = parse_count(text, "BY"),
            "START" => parsed.start = parse_count(text, "AT"),
            "FETCH" => parsed.fetch = parse_list(text),
            "ORDER" => parsed.order_by = parse_list(strip_word(text, "BY")),
            _ => {}
        }
    }

    parsed.is_array_result = !parsed.only && parsed.limit != Some(1);
    parsed
}

/// Build a selection from one entry of the field list.
fn parse_selection(entry: &str) -> FieldSelection {
    let (expr, alias) = match top_level_keywords(entry, &["AS"]).last() {
        Some(&(pos, _)) => (
            entry[..pos].trim(),
            Some(entry[pos + 2..].trim().to_string()).filter(|a| !a.is_empty()),
        ),
        None => (entry, None),
    };

    if expr == "*" {
        return FieldSelection::Wildcard;
    }

    let Ok((_, segments)) = all_consuming(path)(expr) else {
        return FieldSelection::field(expr).with_alias(alias);
    };

    let selection = if expr.contains(".*.") {
        nested_chain(&segments)
    } else if segments.len() >= 2 {
        // Deeper paths without a `*` segment keep only their first level.
        FieldSelection::nested(segments[0], vec![leaf(segments[1])])
    } else {
        FieldSelection::field(segments[0])
    };
    selection.with_alias(alias)
}

/// `a.*.b.*` → `a { b { * } }`: inner `*` segments are skipped, a trailing one is kept.
fn nested_chain(segments: &[&str]) -> FieldSelection {
    let last = segments.len() - 1;
    let kept: Vec<&str> = segments
        .iter()
        .enumerate()
        .filter(|&(i, s)| *s != "*" || i == last)
        .map(|(_, s)| *s)
        .collect();

    let mut selection = leaf(kept[kept.len() - 1]);
    for name in kept[..kept.len() - 1].iter().rev() {
        selection = FieldSelection::nested(name, vec![selection]);
    }
    selection
}

fn leaf(segment: &str) -> FieldSelection {
    if segment == "*" {
        FieldSelection::Wildcard
    } else {
        FieldSelection::field(segment)
    }
}

/// `[ONLY] table[:id], ...` → (only, table names).
fn parse_targets(text: &str) -> (bool, Vec<String>) {
    let text = text.trim();
    let marker: IResult<&str, Option<(&str, &str)>> =
        opt(pair(tag_no_case("ONLY"), multispace1))(text);
    let (text, only) = match marker {
        Ok((rest, marker)) => (rest, marker.is_some()),
        Err(_) => (text, false),
    };

    let tables = split_top_level(text, ',')
        .into_iter()
        .filter_map(|target| target_table(target.trim()).ok().map(|(_, t)| t.to_string()))
        .collect();
    (only, tables)
}

/// Split a WHERE clause on top-level AND/OR and keep the simple comparisons.
fn parse_conditions(text: &str) -> Vec<Condition> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (pos, keyword) in top_level_keywords(text, &["AND", "OR"]) {
        parts.push(&text[start..pos]);
        start = pos + keyword.len();
    }
    parts.push(&text[start..]);

    parts
        .into_iter()
        .filter_map(|part| condition(part.trim()).ok().map(|(_, c)| c))
        .collect()
}

/// `[keyword] n` for LIMIT BY / START AT.
fn parse_count(text: &str, keyword: &'static str) -> Option<u64> {
    let parsed: IResult<&str, &str> =
        preceded(opt(pair(tag_no_case(keyword), multispace1)), digit1)(text);
    parsed.ok().and_then(|(_, digits)| digits.parse().ok())
}

fn parse_list(text: &str) -> Vec<String> {
    split_top_level(text, ',')
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn strip_word<'a>(text: &'a str, word: &'static str) -> &'a str {
    let parsed: IResult<&str, &str> = tag_no_case(word)(text);
    match parsed {
        Ok((rest, _)) => rest.trim_start(),
        Err(_) => text,
    }
}

// =============================================================================
// Parsing Combinators
// =============================================================================

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        let (rest, matched) = tag_no_case(word)(input)?;
        match rest.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' => Err(nom::Err::Error(
                nom::error::Error::new(input, nom::error::ErrorKind::Tag),
            )),
            _ => Ok((rest, matched)),
        }
    }
}

fn statement_kind(input: &str) -> IResult<&str, StatementKind> {
    alt((
        value(StatementKind::Select, keyword("SELECT")),
        value(StatementKind::Create, keyword("CREATE")),
        value(StatementKind::Update, keyword("UPDATE")),
        value(StatementKind::Upsert, keyword("UPSERT")),
        value(StatementKind::Delete, keyword("DELETE")),
        value(StatementKind::Insert, keyword("INSERT")),
        value(StatementKind::Relate, keyword("RELATE")),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Dotted path of identifiers and `*` segments.
fn path(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(char('.'), alt((tag("*"), identifier)))(input)
}

/// `table` or `table:id`, yielding the table.
fn target_table(input: &str) -> IResult<&str, &str> {
    let (input, table) = alt((
        recognize(tuple((char('`'), take_while1(|c: char| c != '`'), char('`')))),
        identifier,
    ))(input)?;
    let (input, _) = opt(pair(char(':'), rest))(input)?;
    Ok((input, table.trim_matches('`')))
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("!="),
        tag("=="),
        tag(">="),
        tag("<="),
        tag("?="),
        tag("*="),
        tag("!~"),
        tag("="),
        tag(">"),
        tag("<"),
        tag("~"),
        keyword("CONTAINSNOT"),
        keyword("CONTAINSALL"),
        keyword("CONTAINSANY"),
        keyword("CONTAINS"),
        keyword("NOTINSIDE"),
        keyword("INSIDE"),
        keyword("IN"),
        keyword("IS"),
    ))(input)
}

fn condition(input: &str) -> IResult<&str, Condition> {
    let (input, field) = recognize(path)(input)?;
    let (input, op) = preceded(multispace0, operator)(input)?;
    let (input, value) = preceded(multispace0, map(rest, str::trim))(input)?;
    Ok((
        input,
        Condition {
            field: field.to_string(),
            op: op.to_uppercase(),
            value: value.to_string(),
        },
    ))
}

// =============================================================================
// Top-level scanning
// =============================================================================

/// Positions of keywords outside quotes and brackets, in order of appearance.
fn top_level_keywords(input: &str, keywords: &[&'static str]) -> Vec<(usize, &'static str)> {
    let masked = mask_quoted(input);
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut word_start: Option<usize> = None;

    let mut check_word = |start: usize, end: usize, depth: usize| {
        if depth > 0 {
            return;
        }
        let word = &masked[start..end];
        if let Some(keyword) = keywords.iter().find(|k| word.eq_ignore_ascii_case(k)) {
            found.push((start, *keyword));
        }
    };

    for (i, c) in masked.char_indices() {
        let is_word = c.is_alphanumeric() || c == '_';
        match (is_word, word_start) {
            (true, None) => {
                let preceded_by_path = masked[..i]
                    .chars()
                    .next_back()
                    .is_some_and(|p| p == '.' || p == ':' || p == '$');
                word_start = if preceded_by_path { Some(usize::MAX) } else { Some(i) };
            }
            (false, Some(start)) => {
                if start != usize::MAX {
                    check_word(start, i, depth);
                }
                word_start = None;
            }
            _ => {}
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if let Some(start) = word_start
        && start != usize::MAX
    {
        check_word(start, masked.len(), depth);
    }

    found
}

/// Split on `sep` outside quotes and brackets.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let masked = mask_quoted(input);
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in masked.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}
