use pretty_assertions::assert_eq;
use schemashape::prelude::*;
use schemashape::registry_from_ddl;
use serde_json::json;

const SCHEMA: &str = r#"
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON user TYPE string;
DEFINE FIELD age ON user TYPE int;

DEFINE TABLE post SCHEMAFULL;
DEFINE FIELD title ON post TYPE string;
DEFINE FIELD author ON post TYPE record<user>;
DEFINE FIELD comments ON post TYPE array<record<comment>>;
DEFINE FIELD rating ON post TYPE option<decimal>;

DEFINE TABLE comment SCHEMAFULL;
DEFINE FIELD text ON comment TYPE string;
DEFINE FIELD author ON comment TYPE record<user>;
"#;

fn user_struct() -> ShapeDescriptor {
    ShapeDescriptor::structure([
        ("name", ShapeDescriptor::from(Leaf::String)),
        ("age", Leaf::Integer.into()),
    ])
}

#[test]
fn test_select_star_limit_one_is_single_struct() {
    let registry = registry_from_ddl(SCHEMA);
    let shape = infer_query("SELECT * FROM user LIMIT 1", &registry);
    assert_eq!(shape, user_struct());
    assert!(!shape.is_array());
}

#[test]
fn test_nested_wildcard_expands_singular_record() {
    let registry = registry_from_ddl(SCHEMA);
    let shape = infer_query("SELECT *, author.* FROM post LIMIT 1", &registry);
    assert_eq!(
        shape,
        ShapeDescriptor::structure([
            ("title", ShapeDescriptor::from(Leaf::String)),
            ("author", user_struct()),
            (
                "comments",
                ShapeDescriptor::array(Leaf::Reference("comment".into()).into())
            ),
            ("rating", ShapeDescriptor::optional(Leaf::Number.into())),
        ])
    );
}

#[test]
fn test_without_limit_wraps_in_array() {
    let registry = registry_from_ddl(SCHEMA);
    let shape = infer_query("SELECT *, author.* FROM post", &registry);
    assert!(shape.is_array());
    assert_eq!(shape.member("author"), Some(&user_struct()));
}

#[test]
fn test_deep_chain_through_collection() {
    let registry = registry_from_ddl(SCHEMA);
    let shape = infer_query("SELECT comments.*.author.* FROM ONLY post:1", &registry);
    assert_eq!(
        shape,
        ShapeDescriptor::structure([(
            "comments",
            ShapeDescriptor::array(ShapeDescriptor::structure([("author", user_struct())]))
        )])
    );
    assert_eq!(shape.to_string(), "{ comments: { author: { name: string, age: integer } }[] }");
}

#[test]
fn test_non_select_shape() {
    let registry = registry_from_ddl(SCHEMA);
    let shape = infer_query("UPDATE post SET title = 'x'", &registry);
    assert_eq!(shape.to_string(), "{ status: string, time: string, result: unknown }");
}

#[test]
fn test_info_dump_matches_ddl() {
    let db = normalize(&json!({
        "tables": {
            "user": "DEFINE TABLE user SCHEMAFULL",
            "post": { "name": "post" }
        }
    }));
    let infos = json!({
        "user": { "fields": {
            "name": "DEFINE FIELD name ON user TYPE string",
            "age": { "kind": "int" }
        }},
        "post": { "fields": {
            "title": { "type": "string" },
            "author": "DEFINE FIELD author ON post TYPE record<user>",
            "comments": "DEFINE FIELD comments ON post TYPE array",
            "comments[*]": "DEFINE FIELD comments[*] ON post TYPE record<comment>",
            "rating": { "kind": "option<decimal>" }
        }}
    });

    let tables = validate(&fetch_tables_from_responses(&db, infos.as_object().unwrap()));
    let registry = SchemaRegistry::from_tables(&tables);
    let from_ddl = registry_from_ddl(SCHEMA);

    // `comment` is not part of the dump, so the collection loses its reference.
    assert_eq!(
        registry.field("post", "comments").unwrap().kind,
        BaseKind::Array
    );

    let query = "SELECT *, author.* FROM post LIMIT 1";
    let live = infer_query(query, &registry);
    let offline = infer_query(query, &from_ddl);
    assert_eq!(live.member("author"), offline.member("author"));
    assert_eq!(live.member("title"), offline.member("title"));
    assert_eq!(live.member("rating"), offline.member("rating"));
}

#[test]
fn test_registry_handle_publishes_new_schema() {
    let handle = RegistryHandle::new(registry_from_ddl(SCHEMA));
    let snapshot = handle.load();

    handle.publish(registry_from_ddl(
        "DEFINE TABLE user;\nDEFINE FIELD name ON user TYPE string;\nDEFINE FIELD email ON user TYPE string;",
    ));

    let old = infer_query("SELECT * FROM user LIMIT 1", &snapshot);
    let new = infer_query("SELECT * FROM user LIMIT 1", &handle.load());
    assert_eq!(old, user_struct());
    assert_eq!(new.to_string(), "{ name: string, email: string }");
}
