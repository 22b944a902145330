//! Type-expression resolver.
//!
//! Turns a single type token such as `option<array<record<post>>>` into a
//! [`TypeDescriptor`]. Resolution is total: empty or malformed tokens fall
//! back to `string`.
//!
//! ```text
//! option<record<user>>
//! ──┬─── ──┬─── ─┬──
//!   │      │     └── reference target
//!   │      └── base kind
//!   └── optionality wrapper
//! ```

use nom::{
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0},
    combinator::all_consuming,
    sequence::{delimited, pair},
    IResult,
};

use crate::clause::find_keyword;
use crate::model::{BaseKind, Reference, TypeDescriptor};

/// Resolve a raw type token.
pub fn resolve(token: &str) -> TypeDescriptor {
    let token = strip_decorations(token);

    let mut inner = token;
    let mut is_optional = false;
    while let Some(unwrapped) = unwrap_generic("option", inner) {
        is_optional = true;
        inner = unwrapped;
    }

    let mut descriptor = resolve_unwrapped(inner, is_optional);
    descriptor.is_optional = is_optional;
    descriptor
}

/// Drop trailing `REFERENCE ...` modifiers and semicolons.
fn strip_decorations(token: &str) -> &str {
    let token = token.trim();
    let token = match find_keyword(token, "REFERENCE") {
        Some(pos) => &token[..pos],
        None => token,
    };
    token.trim().trim_end_matches(';').trim_end()
}

fn resolve_unwrapped(token: &str, is_optional: bool) -> TypeDescriptor {
    if token.is_empty() {
        return TypeDescriptor::fallback();
    }

    if let Some(inner) = unwrap_generic("record", token) {
        return match first_table(inner) {
            Some(table) => reference_descriptor(BaseKind::Record, table, is_optional),
            None => TypeDescriptor::fallback(),
        };
    }

    if let Some(inner) = unwrap_generic("references", token) {
        return match first_table(inner) {
            Some(table) => reference_descriptor(BaseKind::References, table, is_optional),
            None => TypeDescriptor::fallback(),
        };
    }

    if let Some(inner) =
        unwrap_generic("array", token).or_else(|| unwrap_generic("set", token))
    {
        return resolve_element(inner);
    }

    resolve_literal(token)
}

/// Resolve the element type of `array<...>` / `set<...>`.
fn resolve_element(inner: &str) -> TypeDescriptor {
    let element = element_type(inner);

    if let Some(target) = unwrap_generic("record", element).and_then(first_table) {
        return reference_descriptor(BaseKind::ArrayOfRecord, target, false);
    }

    if element.eq_ignore_ascii_case("float") {
        TypeDescriptor::new(BaseKind::ArrayOfFloat)
    } else {
        TypeDescriptor::new(BaseKind::Array)
    }
}

/// Element type of an array payload: size suffix dropped, `option<>` peeled.
pub(crate) fn element_type(inner: &str) -> &str {
    let mut element = split_top_level(inner, ',').next().unwrap_or("").trim();
    while let Some(unwrapped) = unwrap_generic("option", element) {
        element = unwrapped;
    }
    element
}

fn resolve_literal(token: &str) -> TypeDescriptor {
    let lower = token.to_ascii_lowercase();
    let kind = match lower.as_str() {
        "int" | "integer" | "number" => BaseKind::Integer,
        "bool" | "boolean" => BaseKind::Boolean,
        "datetime" => BaseKind::Datetime,
        "string" => BaseKind::String,
        "float" => BaseKind::Float,
        "object" => BaseKind::Object,
        "array" | "set" => BaseKind::Array,
        "record" => BaseKind::Record,
        _ if is_plain_token(&lower) => BaseKind::Other(lower.clone()),
        _ => return TypeDescriptor::fallback(),
    };
    TypeDescriptor::new(kind)
}

fn reference_descriptor(kind: BaseKind, table: &str, is_optional: bool) -> TypeDescriptor {
    TypeDescriptor {
        kind,
        is_optional,
        reference: Some(Reference::new(table, is_optional)),
    }
}

/// First table of a `record<a | b>` target list, without escaping.
fn first_table(inner: &str) -> Option<&str> {
    let table = inner
        .split('|')
        .next()?
        .trim()
        .trim_matches(|c: char| c == '`' || c == '⟨' || c == '⟩');
    if !table.is_empty() && table.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(table)
    } else {
        None
    }
}

/// A pass-through token: an identifier, optionally with balanced `<...>`.
fn is_plain_token(token: &str) -> bool {
    all_consuming(generic_any)(token).is_ok() || all_consuming(identifier)(token).is_ok()
}

// =============================================================================
// Parsing Combinators
// =============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Take everything up to the `>` closing an already opened `<`.
fn balanced(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if depth == 0 => return Ok((&input[i..], &input[..i])),
            '>' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::TakeUntil,
    )))
}

/// `name<inner>` for a fixed name, yielding `inner`.
fn generic<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        let (input, _) = pair(tag_no_case(name), multispace0)(input)?;
        delimited(char('<'), balanced, char('>'))(input)
    }
}

/// `ident<inner>` for any identifier.
fn generic_any(input: &str) -> IResult<&str, &str> {
    let (input, _) = pair(identifier, multispace0)(input)?;
    delimited(char('<'), balanced, char('>'))(input)
}

/// Unwrap `name<inner>` at the start of `token`; trailing text is ignored.
fn unwrap_generic<'a>(name: &'static str, token: &'a str) -> Option<&'a str> {
    generic(name)(token).ok().map(|(_, inner)| inner.trim())
}

/// Split on `sep` where it is not nested inside `<...>`.
fn split_top_level(input: &str, sep: char) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter()
}
