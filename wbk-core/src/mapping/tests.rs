//! Unit tests for mapping configuration parsing and validation.

use super::*;
use rstest::rstest;
use serde_json::json;

fn rule_from(value: serde_json::Value) -> MappingRule {
    serde_json::from_value(value).expect("parse mapping rule")
}

#[rstest]
fn parses_every_value_spec_shape() {
    let statement: StatementDefinition = serde_json::from_value(json!({
        "property": "population",
        "datatype": "quantity",
        "value": ["{count}", {"column": "unit"}, {"value": 5}, {"label": "person", "snak": {"property": "P17", "value": "{country}"}}]
    }))
    .expect("parse statement");

    let Some(ValueSpec::Composite(parts)) = statement.value else {
        panic!("expected a composite value spec");
    };
    assert_eq!(
        parts,
        vec![
            ValueSpec::Literal("{count}".into()),
            ValueSpec::Column("unit".into()),
            ValueSpec::Static("5".into()),
            ValueSpec::Label(LabelRef {
                label: "person".into(),
                snak: Some(SnakMatcher {
                    property: "P17".into(),
                    value: "{country}".into(),
                }),
            }),
        ]
    );
    assert_eq!(statement.datatype, Some(Datatype::Quantity));
}

#[rstest]
fn value_map_without_known_key_is_rejected() {
    let result: Result<StatementDefinition, _> = serde_json::from_value(json!({
        "property": "P31",
        "value": {"colum": "typo"}
    }));
    let err = result.expect_err("unknown value map must fail");
    assert!(
        err.to_string().contains("'column', 'value', or 'label'"),
        "unexpected error: {err}"
    );
}

#[rstest]
fn value_spec_serialises_back_to_config_shape() {
    let spec = ValueSpec::Composite(vec![
        ValueSpec::Column("amount".into()),
        ValueSpec::label("kilogram"),
    ]);
    let json = serde_json::to_value(&spec).expect("serialise spec");
    assert_eq!(json, json!([{"column": "amount"}, {"label": "kilogram"}]));
}

#[rstest]
#[case(json!({"label": "{name}"}), SearchMode::Label)]
#[case(json!({"label": "{name}", "description": "School in {district}"}), SearchMode::LabelDescription)]
#[case(json!({"label": "{name}", "description": "x", "snak": {"property": "P1", "value": "{code}"}}), SearchMode::LabelSnak)]
fn derives_search_mode(#[case] item: serde_json::Value, #[case] expected: SearchMode) {
    let item: ItemDefinition = serde_json::from_value(item).expect("parse item");
    assert_eq!(item.search_mode(), expected);
}

#[rstest]
fn accepts_camel_case_update_action() {
    let rule = rule_from(json!({
        "item": {"label": "{name}"},
        "updateAction": "merge_qualifiers_or_append"
    }));
    assert_eq!(rule.update_action, Some(UpdateAction::MergeQualifiersOrAppend));
    assert!(rule.create_missing);
}

#[rstest]
#[case(Some(UpdateAction::ForceAppend), false, true)]
#[case(Some(UpdateAction::ForceAppend), true, false)]
#[case(None, false, false)]
fn duplicates_require_update_only_runs(
    #[case] action: Option<UpdateAction>,
    #[case] create_missing: bool,
    #[case] valid: bool,
) {
    let mut rule = MappingRule::new(ItemDefinition::labelled("{name}"));
    rule.update_action = action;
    rule.create_missing = create_missing;
    rule.allow_duplicates = true;

    let outcome = rule.validate(3, None);
    if valid {
        assert!(outcome.is_ok(), "expected valid rule: {outcome:?}");
    } else {
        assert_eq!(
            outcome,
            Err(ConfigError::DuplicatesRequireUpdateOnly { rule: 3 })
        );
    }
}

#[rstest]
fn file_default_action_counts_for_validation() {
    let mut rule = MappingRule::new(ItemDefinition::labelled("{name}"));
    rule.create_missing = false;
    rule.allow_duplicates = true;
    assert!(rule.validate(0, Some(UpdateAction::Keep)).is_ok());
    assert_eq!(
        rule.effective_action(Some(UpdateAction::Keep)),
        Some(UpdateAction::Keep)
    );
}

#[rstest]
fn rejects_blank_labels_and_properties() {
    let blank = MappingRule::new(ItemDefinition::labelled("  "));
    assert_eq!(blank.validate(0, None), Err(ConfigError::EmptyLabel { rule: 0 }));

    let mut rule = MappingRule::new(ItemDefinition::labelled("{name}"));
    let mut statement = StatementDefinition::new("P31", ValueSpec::Static("Q5".into()));
    statement
        .qualifiers
        .push(StatementDefinition::new("", ValueSpec::Static("x".into())));
    rule.statements.push(statement);
    assert_eq!(
        rule.validate(1, None),
        Err(ConfigError::MissingProperty { rule: 1 })
    );
}

#[rstest]
fn collects_property_references_once() {
    let rule = rule_from(json!({
        "item": {"label": "{name}", "snak": {"property": "code", "value": "{code}"}},
        "statements": [
            {
                "property": "instance of",
                "value": {"label": "school", "snak": {"property": "country", "value": "CL"}},
                "qualifiers": [{"property": "start time", "value": "{opened}"}],
                "references": [{"property": "reference URL", "value": "{url}"}]
            },
            {"property": "instance of", "value": "{kind}"}
        ]
    }));

    assert_eq!(
        rule.property_references(),
        vec!["code", "instance of", "country", "start time", "reference URL"]
    );
}

#[rstest]
fn file_overrides_dialect() {
    let config: MappingConfig = serde_json::from_value(json!({
        "name": "schools",
        "delimiter": ";",
        "csv_files": [{"file_path": "a.csv", "encoding": "latin1", "decimal_separator": ","}]
    }))
    .expect("parse config");

    let dialect = config.dialect_for(&config.csv_files[0]);
    assert_eq!(
        dialect,
        CsvDialect {
            encoding: "latin1".into(),
            delimiter: ';',
            decimal_separator: ',',
        }
    );
}
