//! Line-oriented DDL parser.
//!
//! Parses schema documents like:
//! ```text
//! -- Registered accounts
//! DEFINE TABLE user SCHEMAFULL;
//! DEFINE FIELD name ON user TYPE string COMMENT "Display name";
//! DEFINE FIELD team ON user TYPE option<record<team>>
//!     DEFAULT NONE;
//! ```
//!
//! The parser is a small state machine over logical lines. [`DdlParser::step`]
//! advances it by one line and reports how many of the following lines it
//! consumed as continuation lines, so it can be driven and tested one line
//! at a time.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, value},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::clause::{extract_comment, extract_default, extract_type, has_optional_marker, mask_quoted};
use crate::model::{BaseKind, FieldDefinition, Reference, TableDefinition};
use crate::types::{element_type, resolve};

/// Parse a complete DDL document into tables in declaration order.
pub fn parse(ddl: &str) -> Vec<TableDefinition> {
    let lines = logical_lines(ddl);
    let mut parser = DdlParser::new();

    let mut i = 0;
    while i < lines.len() {
        let consumed = parser.step(lines[i], &lines[i + 1..]);
        i += 1 + consumed;
    }

    parser.finish()
}

/// Physical lines, with lines holding several `DEFINE` statements split apart.
pub fn logical_lines(ddl: &str) -> Vec<&str> {
    ddl.lines().flat_map(split_statements).collect()
}

/// Split a line after each `;` that is followed by another `DEFINE` statement.
///
/// Semicolons inside quoted strings never split.
pub fn split_statements(line: &str) -> Vec<&str> {
    let masked = mask_quoted(line);
    let mut parts = Vec::new();
    let mut start = 0;

    for (i, c) in masked.char_indices() {
        if c != ';' {
            continue;
        }
        let rest = masked[i + 1..].trim_start();
        if starts_with_define(rest) {
            parts.push(&line[start..=i]);
            start = line.len() - rest.len();
        }
    }
    parts.push(&line[start..]);
    parts
}

fn starts_with_define(line: &str) -> bool {
    line.get(..6).is_some_and(|head| head.eq_ignore_ascii_case("DEFINE"))
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("--") || line.starts_with("//")
}

/// Parser state: the table being filled and the last standalone comment.
#[derive(Debug, Default, Clone)]
pub struct DdlParser {
    tables: Vec<TableDefinition>,
    current: Option<TableDefinition>,
    pending_description: Option<String>,
}

impl DdlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table that fields are currently appended to.
    pub fn current_table(&self) -> Option<&TableDefinition> {
        self.current.as_ref()
    }

    /// Description waiting to be attached to the next table or field.
    pub fn pending_description(&self) -> Option<&str> {
        self.pending_description.as_deref()
    }

    /// Tables already closed by a later `DEFINE TABLE`.
    pub fn finished_tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    /// Advance by one logical line.
    ///
    /// `following` are the lines after `line`; the return value is how many
    /// of them were consumed as continuation lines and must be skipped.
    pub fn step(&mut self, line: &str, following: &[&str]) -> usize {
        let line = line.trim();

        if line.is_empty() {
            self.pending_description = None;
            return 0;
        }

        if is_comment_line(line) {
            let text = line[2..].trim();
            if !text.is_empty() {
                self.pending_description = Some(text.to_string());
            }
            return 0;
        }

        if let Ok((tail, name)) = define_table(line) {
            let (continuation, consumed) = continuation_lines(line, following);
            self.open_table(name, tail, &continuation);
            return consumed;
        }

        if let Ok((tail, (field, table))) = define_field(line) {
            let (continuation, consumed) = continuation_lines(line, following);
            self.add_field(field, table, tail, &continuation);
            return consumed;
        }

        0
    }

    /// Close the open table and return every table in declaration order.
    pub fn finish(mut self) -> Vec<TableDefinition> {
        if let Some(table) = self.current.take() {
            self.tables.push(table);
        }
        self.tables
    }

    fn open_table(&mut self, name: &str, tail: &str, continuation: &[&str]) {
        if let Some(table) = self.current.take() {
            self.tables.push(table);
        }

        let description = extract_comment(tail)
            .or_else(|| continuation.iter().find_map(|l| extract_comment(l)))
            .or_else(|| self.pending_description.take());
        self.pending_description = None;

        // A redefinition (OVERWRITE) reopens the earlier table.
        let table = match self.tables.iter().position(|t| t.is_named(name)) {
            Some(index) => {
                let mut table = self.tables.remove(index);
                if description.is_some() {
                    table.description = description;
                }
                table
            }
            None => TableDefinition {
                description,
                ..TableDefinition::new(name)
            },
        };
        self.current = Some(table);
    }

    fn add_field(&mut self, name: &str, table: &str, tail: &str, continuation: &[&str]) {
        let pending = self.pending_description.take();

        let Some(owner) = self.owning_table(table) else {
            tracing::debug!(field = name, table, "dropping field of undeclared table");
            return;
        };

        let type_token = extract_type(tail)
            .or_else(|| continuation.iter().find_map(|l| extract_type(l)))
            .unwrap_or_default();

        if FieldDefinition::is_element_marker(name) {
            refine_element(owner, name, &type_token);
            return;
        }

        owner.upsert_field(build_field(name, &type_token, tail, continuation, pending));
    }

    /// Case-insensitive lookup across the open table and finished tables.
    fn owning_table(&mut self, name: &str) -> Option<&mut TableDefinition> {
        if self.current.as_ref().is_some_and(|t| t.is_named(name)) {
            return self.current.as_mut();
        }
        self.tables.iter_mut().find(|t| t.is_named(name))
    }
}

/// Build a field from its resolved clauses.
///
/// Clauses on the definition tail win over continuation lines; `pending` is
/// the standalone comment preceding the definition.
pub(crate) fn build_field(
    name: &str,
    type_token: &str,
    tail: &str,
    continuation: &[&str],
    pending: Option<String>,
) -> FieldDefinition {
    let mut field = FieldDefinition::from_descriptor(name, resolve(type_token));
    field.optional = field.optional
        || has_optional_marker(tail)
        || continuation.iter().any(|l| has_optional_marker(l));
    field.description = extract_comment(tail)
        .or_else(|| continuation.iter().find_map(|l| extract_comment(l)))
        .or(pending);
    field.default_value = extract_default(tail)
        .or_else(|| continuation.iter().find_map(|l| extract_default(l)));
    field
}

/// Parse one complete `DEFINE FIELD` statement.
///
/// Returns the owning table name with the field, or `None` when the text is
/// not a field definition.
pub fn parse_field_definition(definition: &str) -> Option<(String, FieldDefinition)> {
    let (tail, (name, table)) = define_field(definition.trim()).ok()?;
    let type_token = extract_type(tail).unwrap_or_default();
    Some((table.to_string(), build_field(name, &type_token, tail, &[], None)))
}

/// Continuation lines following a definition line, and how many of the
/// following lines they span.
///
/// The scan stops at a blank line, the next `DEFINE`, or after the line that
/// terminates the statement with `;`. Comment lines inside the statement are
/// skipped; trailing ones are left for the next definition.
fn continuation_lines<'a>(line: &str, following: &[&'a str]) -> (Vec<&'a str>, usize) {
    if mask_quoted(line).trim_end().ends_with(';') {
        return (Vec::new(), 0);
    }

    let mut lines = Vec::new();
    let mut consumed = 0;
    for (i, next) in following.iter().enumerate() {
        let trimmed = next.trim();
        if trimmed.is_empty() || starts_with_define(trimmed) {
            break;
        }
        if is_comment_line(trimmed) {
            continue;
        }
        lines.push(*next);
        consumed = i + 1;
        if mask_quoted(trimmed).trim_end().ends_with(';') {
            break;
        }
    }
    (lines, consumed)
}

/// Apply a `name[*]` element definition to its parent array field.
///
/// Only direct element markers refine; deeper paths such as `tags[*].label`
/// describe nested objects and are skipped.
pub fn refine_element(table: &mut TableDefinition, marker: &str, type_token: &str) {
    let Some(parent_name) = marker.strip_suffix("[*]") else {
        return;
    };
    let Some(parent) = table.find_field_mut(parent_name) else {
        return;
    };
    if parent.kind != BaseKind::Array {
        return;
    }

    let element = resolve(element_type(type_token));
    match (element.kind, element.reference) {
        (BaseKind::Record, Some(reference)) => {
            parent.kind = BaseKind::ArrayOfRecord;
            parent.reference = Some(Reference::new(reference.table, false));
        }
        (BaseKind::Float, _) => parent.kind = BaseKind::ArrayOfFloat,
        _ => {}
    }
}

// =============================================================================
// Parsing Combinators
// =============================================================================

/// Table/field identifier, optionally escaped with backticks.
fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
        take_while1(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Field path such as `address.city` or `tags[*]`.
fn field_path(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
        take_while1(|c: char| c.is_alphanumeric() || "_.[]*".contains(c)),
    ))(input)
}

/// Optional `OVERWRITE` / `IF NOT EXISTS` between the kind keyword and the name.
fn define_modifier(input: &str) -> IResult<&str, ()> {
    map(
        opt(alt((
            value((), terminated(tag_no_case("OVERWRITE"), multispace1)),
            value(
                (),
                tuple((
                    tag_no_case("IF"),
                    multispace1,
                    tag_no_case("NOT"),
                    multispace1,
                    tag_no_case("EXISTS"),
                    multispace1,
                )),
            ),
        ))),
        |_| (),
    )(input)
}

/// `DEFINE TABLE [OVERWRITE] name`, yielding the name.
fn define_table(input: &str) -> IResult<&str, &str> {
    let (input, _) = tuple((
        tag_no_case("DEFINE"),
        multispace1,
        tag_no_case("TABLE"),
        multispace1,
    ))(input)?;
    let (input, _) = define_modifier(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, name))
}

/// `DEFINE FIELD [OVERWRITE] name ON [TABLE] table`, yielding (field, table).
fn define_field(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = tuple((
        tag_no_case("DEFINE"),
        multispace1,
        tag_no_case("FIELD"),
        multispace1,
    ))(input)?;
    let (input, _) = define_modifier(input)?;
    let (input, field) = field_path(input)?;
    let (input, _) = tuple((multispace1, tag_no_case("ON"), multispace1))(input)?;
    let (input, _) = opt(pair(tag_no_case("TABLE"), multispace1))(input)?;
    let (input, table) = preceded(multispace0, identifier)(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (field, table)))
}
