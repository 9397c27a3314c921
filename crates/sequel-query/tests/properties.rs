//! Structural properties of compiled statements over generated criteria.

use proptest::prelude::*;
use sequel_core::Options;
use sequel_query::{AttributeDef, AttributeType, QueryObject, Schema, Sequel, TableSchema};
use serde_json::{json, Map, Value as Json};

fn schema() -> Schema {
    Schema::new().with_table(
        "person",
        TableSchema::new("person")
            .attribute("id", AttributeDef::new(AttributeType::Integer).primary_key())
            .attribute("name", AttributeDef::new(AttributeType::String))
            .attribute("age", AttributeDef::new(AttributeType::Integer)),
    )
}

fn arb_attribute() -> impl Strategy<Value = String> {
    // `nick` is not in the schema and passes through as a raw column.
    prop_oneof![Just("name"), Just("age"), Just("nick")].prop_map(str::to_string)
}

fn arb_scalar() -> impl Strategy<Value = Json> {
    prop_oneof![
        "[a-zA-Z ]{0,6}".prop_map(Json::from),
        any::<i32>().prop_map(Json::from),
        any::<bool>().prop_map(Json::from),
    ]
}

fn arb_operator_filter() -> impl Strategy<Value = Json> {
    let comparison = (
        prop_oneof![
            Just("<"),
            Just("<="),
            Just(">"),
            Just(">="),
            Just("!"),
            Just("contains"),
            Just("startsWith"),
            Just("endsWith"),
            Just("like"),
        ],
        arb_scalar(),
    )
        .prop_map(|(op, value)| json!({ op: value }));
    let negated_list =
        prop::collection::vec(arb_scalar(), 0..4).prop_map(|items| json!({ "not": items }));
    prop_oneof![comparison, negated_list, Just(json!({"not": null}))]
}

fn arb_filter() -> impl Strategy<Value = Json> {
    prop_oneof![
        arb_scalar(),
        Just(Json::Null),
        prop::collection::vec(arb_scalar(), 0..4).prop_map(Json::from),
        arb_operator_filter(),
    ]
}

fn arb_leaf() -> impl Strategy<Value = Map<String, Json>> {
    prop::collection::vec((arb_attribute(), arb_filter()), 0..3)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// A criteria object: attribute filters plus nested `and`/`or` groups whose
/// elements may be empty objects.
fn arb_criteria() -> impl Strategy<Value = Map<String, Json>> {
    arb_leaf().prop_recursive(3, 32, 3, |inner| {
        (
            arb_leaf(),
            prop_oneof![Just("and"), Just("or")],
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(mut criteria, keyword, elements)| {
                let elements = elements.into_iter().map(Json::Object).collect::<Vec<_>>();
                criteria.insert(keyword.to_string(), Json::Array(elements));
                criteria
            })
    })
}

fn find(options: Options, criteria: Map<String, Json>) -> sequel_query::FindQuery {
    let query: QueryObject = serde_json::from_value(json!({ "where": criteria })).unwrap();
    Sequel::new(schema(), options).find("person", &query).unwrap()
}

/// Placeholder numbers in order of appearance.
fn placeholders(sql: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut rest = sql;
    while let Some(start) = rest.find('$') {
        rest = &rest[start + 1..];
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(n) = digits.parse() {
            found.push(n);
        }
        rest = &rest[digits.len()..];
    }
    found
}

fn assert_balanced(sql: &str) -> Result<(), TestCaseError> {
    let dangling = [
        "( AND", "( OR", "AND )", "OR )", "AND AND", "OR OR", "AND OR", "OR AND", "()", ", FROM",
        "WHERE  ",
    ];
    for fragment in dangling {
        prop_assert!(!sql.contains(fragment), "`{}` in {}", fragment, sql);
    }
    let trimmed = sql.trim_end();
    for keyword in ["AND", "OR", "WHERE"] {
        prop_assert!(!trimmed.ends_with(keyword), "trailing `{}` in {}", keyword, sql);
    }
    prop_assert_eq!(sql.matches('(').count(), sql.matches(')').count());
    Ok(())
}

proptest! {
    #[test]
    fn placeholders_match_values(criteria in arb_criteria()) {
        let find = find(Options::postgres(), criteria);
        let expected: Vec<usize> = (1..=find.values.len()).collect();
        prop_assert_eq!(placeholders(&find.query), expected);
    }

    #[test]
    fn no_dangling_connectives(criteria in arb_criteria()) {
        let find = find(Options::postgres(), criteria);
        assert_balanced(&find.query)?;
    }

    #[test]
    fn compile_is_deterministic(criteria in arb_criteria()) {
        let first = find(Options::postgres(), criteria.clone());
        let second = find(Options::postgres(), criteria);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn inline_dialect_binds_nothing(criteria in arb_criteria()) {
        let find = find(Options::mysql(), criteria);
        prop_assert!(find.values.is_empty());
        prop_assert!(placeholders(&find.query).is_empty());
    }

    #[test]
    fn case_folding_is_idempotent(name in "[a-zA-Z]{1,8}") {
        let mixed = find(
            Options::postgres(),
            json!({"name": name.as_str()}).as_object().cloned().unwrap(),
        );
        let lower = find(
            Options::postgres(),
            json!({"name": name.to_lowercase()}).as_object().cloned().unwrap(),
        );
        prop_assert_eq!(&mixed.query, &lower.query);
        prop_assert_eq!(&mixed.values, &lower.values);
    }
}

#[test]
fn negated_null_binds_nothing() {
    let find = find(
        Options::postgres(),
        json!({"age": {"not": null}}).as_object().cloned().unwrap(),
    );
    assert!(find.query.contains("\"person\".\"age\" IS NOT NULL"));
    assert!(find.values.is_empty());
}

#[test]
fn empty_or_alternative_drops_its_values() {
    let find = find(
        Options::postgres(),
        json!({"or": [{"age": 3}, {}], "name": "x"}).as_object().cloned().unwrap(),
    );
    assert_eq!(
        find.query,
        "SELECT \"person\".\"id\", \"person\".\"name\", \"person\".\"age\" FROM \"person\" AS \"person\"  \
         WHERE LOWER(\"person\".\"name\") = $1 "
    );
    assert_eq!(find.values, vec![sequel_query::Value::from("x")]);
}
