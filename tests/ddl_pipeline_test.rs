use pretty_assertions::assert_eq;
use schemashape::prelude::*;
use schemashape::{ddl, parse_schema};

const BLOG: &str = r#"
-- Registered accounts
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string ASSERT string::is::email($value);
DEFINE FIELD created ON user TYPE datetime DEFAULT time::now() READONLY;

DEFINE TABLE OVERWRITE post SCHEMAFULL COMMENT 'Blog posts';
-- Headline shown in lists
DEFINE FIELD title ON post TYPE string;
DEFINE FIELD author ON post TYPE record<user>;
DEFINE FIELD reviewer ON post TYPE option<record<user>>;
DEFINE FIELD tags ON post TYPE array
    COMMENT "Free-form labels";
DEFINE FIELD tags[*] ON post TYPE record<tag>;
DEFINE FIELD embedding ON post TYPE array<float, 1536>;
DEFINE FIELD IF NOT EXISTS meta ON post FLEXIBLE TYPE object;
DEFINE FIELD meta.views ON post TYPE int DEFAULT 0;
"#;

#[test]
fn test_blog_schema_pipeline() {
    let tables = parse_schema(BLOG);
    assert_eq!(tables.len(), 2);

    let user = &tables[0];
    assert_eq!(user.name, "user");
    assert_eq!(user.description, Some("Registered accounts".to_string()));
    let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "email", "created"]);
    assert_eq!(user.fields[2].kind, BaseKind::Datetime);
    assert_eq!(user.fields[2].default_value, Some("time::now()".to_string()));

    let post = &tables[1];
    assert_eq!(post.description, Some("Blog posts".to_string()));
    let names: Vec<&str> = post.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["title", "author", "reviewer", "tags", "embedding", "meta", "meta.views"]
    );

    let title = post.find_field("title").unwrap();
    assert_eq!(title.description, Some("Headline shown in lists".to_string()));

    let reviewer = post.find_field("reviewer").unwrap();
    assert!(reviewer.optional);
    assert_eq!(reviewer.reference, Some(Reference::new("user", true)));

    // `tag` is never declared, so the refined collection is downgraded again.
    let tags = post.find_field("tags").unwrap();
    assert_eq!(tags.kind, BaseKind::Array);
    assert_eq!(tags.reference, None);
    assert_eq!(tags.description, Some("Free-form labels".to_string()));

    assert_eq!(post.find_field("embedding").unwrap().kind, BaseKind::ArrayOfFloat);
    assert_eq!(post.find_field("meta").unwrap().kind, BaseKind::Object);
    assert_eq!(
        post.find_field("meta.views").unwrap().default_value,
        Some("0".to_string())
    );
}

#[test]
fn test_table_and_field_counts() {
    let ddl = "
DEFINE TABLE a;
DEFINE FIELD one ON a TYPE string;
DEFINE FIELD two ON a TYPE int;
DEFINE FIELD three ON a TYPE bool;
DEFINE TABLE b;
DEFINE FIELD one ON b TYPE string;
DEFINE FIELD two ON b TYPE int;
DEFINE FIELD three ON b TYPE bool;
DEFINE FIELD four ON b TYPE datetime;
";
    let tables = parse_schema(ddl);
    let counts: Vec<(&str, usize)> = tables
        .iter()
        .map(|t| (t.name.as_str(), t.fields.len()))
        .collect();
    assert_eq!(counts, vec![("a", 3), ("b", 4)]);
}

#[test]
fn test_comment_priority() {
    let tables = ddl::parse("DEFINE TABLE t;\n-- desc A\nDEFINE FIELD x ON t TYPE string COMMENT \"desc B\";");
    assert_eq!(tables[0].fields[0].description, Some("desc B".to_string()));
}

#[test]
fn test_reference_downgrade_on_one_line() {
    let tables = parse_schema("DEFINE TABLE t; DEFINE FIELD r ON t TYPE record<missing>;");
    let field = &tables[0].fields[0];
    assert_eq!(field.kind, BaseKind::Record);
    assert_eq!(field.reference, None);
}

#[test]
fn test_validate_is_idempotent() {
    let once = parse_schema(BLOG);
    assert_eq!(validate(&once), once);
}

#[test]
fn test_redefinition_is_last_write_wins() {
    let tables = parse_schema(
        "DEFINE TABLE t;
DEFINE FIELD a ON t TYPE string;
DEFINE FIELD b ON t TYPE string;
DEFINE FIELD OVERWRITE a ON t TYPE int;",
    );
    let fields: Vec<(&str, &BaseKind)> = tables[0]
        .fields
        .iter()
        .map(|f| (f.name.as_str(), &f.kind))
        .collect();
    assert_eq!(fields, vec![("a", &BaseKind::Integer), ("b", &BaseKind::String)]);
}

#[test]
fn test_model_serializes_for_codegen() {
    let tables = parse_schema("DEFINE TABLE t; DEFINE FIELD tags ON t TYPE array<record<t>>;");
    let json = serde_json::to_value(&tables).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "name": "t",
            "fields": [{
                "name": "tags",
                "type": "array_of_record",
                "optional": false,
                "reference": { "table": "t", "is_optional": false }
            }]
        }])
    );

    let back: Vec<TableDefinition> = serde_json::from_value(json).unwrap();
    assert_eq!(back, tables);
}
