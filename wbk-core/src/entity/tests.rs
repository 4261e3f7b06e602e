//! Unit tests for the entity model, wire format and comparison primitives.

use super::compare::{
    claims_equal, merge_qualifiers, merge_references, same_main_value, snak_groups_equal,
};
use super::{Claim, DataValue, Entity, EntityKind, Rank, Reference, Snak, SnakGroup, SnakValue};
use crate::Datatype;
use proptest::prelude::*;
use rstest::{fixture, rstest};

const SCHOOL_JSON: &str = r#"{
    "type": "item",
    "id": "Q10",
    "labels": {"en": {"language": "en", "value": "Colegio A"}},
    "descriptions": [],
    "aliases": {"en": [{"language": "en", "value": "Col. A"}]},
    "claims": {
        "P31": [{
            "mainsnak": {
                "snaktype": "value",
                "property": "P31",
                "datatype": "wikibase-item",
                "datavalue": {"value": {"entity-type": "item", "numeric-id": 3914, "id": "Q3914"}, "type": "wikibase-entityid"}
            },
            "type": "statement",
            "id": "Q10$abc",
            "rank": "preferred",
            "qualifiers": {
                "P580": [{"snaktype": "value", "property": "P580", "datavalue": {"type": "time", "value": {"time": "+2001-00-00T00:00:00Z", "timezone": 0, "before": 0, "after": 0, "precision": 9, "calendarmodel": "http://www.wikidata.org/entity/Q1985727"}}}],
                "P1114": [{"snaktype": "value", "property": "P1114", "datavalue": {"type": "quantity", "value": {"amount": "+5", "unit": "1"}}}]
            },
            "qualifiers-order": ["P1114", "P999"],
            "references": [{
                "hash": "deadbeef",
                "snaks": {"P854": [{"snaktype": "value", "property": "P854", "datavalue": {"type": "string", "value": "https://example.org"}}]},
                "snaks-order": ["P854"]
            }]
        }],
        "P625": [{
            "mainsnak": {"snaktype": "value", "property": "P625", "datavalue": {"type": "globecoordinate", "value": {"latitude": -33.4, "longitude": -70.6, "altitude": null, "precision": 0.0001, "globe": "http://www.wikidata.org/entity/Q2"}}},
            "rank": "normal"
        }],
        "P1448": [{
            "mainsnak": {"snaktype": "novalue", "property": "P1448"}
        }]
    }
}"#;

fn string_snak(property: &str, value: &str) -> Snak {
    Snak::value(property, DataValue::String(value.into()))
}

#[fixture]
fn school() -> Entity {
    serde_json::from_str(SCHOOL_JSON).expect("parse school document")
}

#[rstest]
fn parses_wikibase_document(school: Entity) {
    assert_eq!(school.id.as_deref(), Some("Q10"));
    assert_eq!(school.kind, EntityKind::Item);
    assert_eq!(school.label("en"), Some("Colegio A"));
    assert!(school.descriptions.is_empty());
    assert_eq!(school.aliases["en"], vec!["Col. A".to_owned()]);

    let claim = &school.claims_for("P31")[0];
    assert_eq!(claim.id.as_deref(), Some("Q10$abc"));
    assert_eq!(claim.rank, Rank::Preferred);
    assert_eq!(claim.mainsnak.datatype, Some(Datatype::WikibaseItem));
    assert_eq!(
        claim.mainsnak.datavalue(),
        Some(&DataValue::EntityId("Q3914".into()))
    );
    assert_eq!(claim.references[0].hash.as_deref(), Some("deadbeef"));
    assert_eq!(school.claims_for("P1448")[0].mainsnak.value, SnakValue::NoValue);
}

#[rstest]
fn rebuilds_inconsistent_qualifier_order(school: Entity) {
    let claim = &school.claims_for("P31")[0];
    let order: Vec<_> = claim.qualifiers.properties().collect();
    assert_eq!(order, vec!["P1114", "P580"]);
}

#[rstest]
fn serialises_order_lists_matching_keys(school: Entity) {
    let json = serde_json::to_value(&school).expect("serialise school");
    let claim = &json["claims"]["P31"][0];
    assert_eq!(claim["qualifiers-order"], serde_json::json!(["P1114", "P580"]));
    assert_eq!(claim["type"], "statement");
    assert_eq!(
        claim["mainsnak"]["datavalue"]["value"]["numeric-id"],
        serde_json::json!(3914)
    );
    assert_eq!(json["labels"]["en"]["language"], "en");

    let reparsed: Entity = serde_json::from_value(json).expect("reparse school");
    assert_eq!(reparsed, school);
}

#[rstest]
fn entity_reference_without_id_uses_numeric_id() {
    let snak: Snak = serde_json::from_str(
        r#"{"snaktype":"value","property":"P17","datavalue":{"type":"wikibase-entityid","value":{"entity-type":"item","numeric-id":298}}}"#,
    )
    .expect("parse snak");
    assert_eq!(snak.datavalue(), Some(&DataValue::EntityId("Q298".into())));
}

#[rstest]
fn value_snak_without_datavalue_is_rejected() {
    let result: Result<Snak, _> =
        serde_json::from_str(r#"{"snaktype":"value","property":"P17"}"#);
    let err = result.expect_err("value snak needs a datavalue");
    assert!(err.to_string().contains("P17"), "unexpected error: {err}");
}

#[rstest]
fn aliases_are_not_duplicated() {
    let mut entity = Entity::item();
    entity.add_alias("en", "A");
    entity.add_alias("en", "A");
    entity.add_alias("en", "B");
    assert_eq!(entity.aliases["en"], vec!["A".to_owned(), "B".to_owned()]);
}

#[rstest]
fn shell_carries_kind_from_identifier() {
    let shell = Entity::shell("P31", "en", "instance of");
    assert_eq!(shell.kind, EntityKind::Property);
    assert_eq!(shell.numeric_id(), Some(31));
}

#[rstest]
fn claim_ids_are_assigned_without_reuse(school: Entity) {
    let mut entity = school;
    entity.push_claim(Claim::new(string_snak("P31", "Q3914")));
    entity.push_claim(Claim::new(string_snak("P17", "Q298")));
    entity.assign_claim_ids();

    let ids: Vec<_> = entity
        .claims
        .values()
        .flatten()
        .map(|claim| claim.id.clone().expect("claim id assigned"))
        .collect();
    let unique: std::collections::BTreeSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(entity.claims_for("P31")[0].id.as_deref(), Some("Q10$abc"));
    assert!(ids.iter().all(|id| id.starts_with("Q10$")));
}

#[rstest]
fn qualifier_differences_break_claim_equality() {
    let main = string_snak("P1", "x");
    let plain = Claim::new(main.clone());
    let qualified = Claim::new(main)
        .with_qualifiers(SnakGroup::from_snaks([string_snak("P2", "q")]));

    assert!(same_main_value(&plain, &qualified));
    assert!(!claims_equal(&plain, &qualified));
}

#[rstest]
fn snak_group_equality_respects_value_sequences() {
    let ab = SnakGroup::from_snaks([string_snak("P2", "a"), string_snak("P2", "b")]);
    let ba = SnakGroup::from_snaks([string_snak("P2", "b"), string_snak("P2", "a")]);
    let a = SnakGroup::from_snaks([string_snak("P2", "a")]);
    let other_key = SnakGroup::from_snaks([string_snak("P3", "a")]);

    assert!(snak_groups_equal(&ab, &ab.clone()));
    assert!(!snak_groups_equal(&ab, &ba));
    assert!(!snak_groups_equal(&ab, &a));
    assert!(!snak_groups_equal(&a, &other_key));
    assert!(snak_groups_equal(&SnakGroup::default(), &SnakGroup::default()));
}

#[rstest]
fn merging_references_skips_known_blocks() {
    let source = Reference::new(SnakGroup::from_snaks([string_snak("P854", "a")]));
    let other = Reference::new(SnakGroup::from_snaks([string_snak("P854", "b")]));
    let mut claim = Claim::new(string_snak("P1", "x")).with_reference(source.clone());

    let added = merge_references(&mut claim, [&source, &other, &other]);

    assert_eq!(added, 1);
    assert_eq!(claim.references.len(), 2);
}

#[rstest]
fn merging_qualifiers_never_removes_values() {
    let mut claim = Claim::new(string_snak("P1", "x"))
        .with_qualifiers(SnakGroup::from_snaks([string_snak("P2", "a")]));
    let incoming = SnakGroup::from_snaks([
        string_snak("P2", "a"),
        string_snak("P2", "b"),
        string_snak("P3", "c"),
    ]);

    let added = merge_qualifiers(&mut claim, &incoming);

    assert_eq!(added, 2);
    let p2: Vec<_> = claim
        .qualifiers
        .get("P2")
        .unwrap_or_default()
        .iter()
        .filter_map(Snak::datavalue)
        .cloned()
        .collect();
    assert_eq!(
        p2,
        vec![DataValue::String("a".into()), DataValue::String("b".into())]
    );
    assert_eq!(claim.qualifiers.properties().collect::<Vec<_>>(), vec!["P2", "P3"]);
    assert_eq!(merge_qualifiers(&mut claim, &incoming), 0);
}

fn arb_claim() -> impl Strategy<Value = Claim> {
    let value = prop_oneof![
        "[a-c]{1,2}".prop_map(DataValue::String),
        (1u32..4).prop_map(|n| DataValue::EntityId(format!("Q{n}"))),
        (0i32..3).prop_map(|n| DataValue::Quantity {
            amount: format!("+{n}"),
            unit: "1".into(),
        }),
    ];
    let qualifier = ("P[1-3]", "[a-b]").prop_map(|(p, v)| string_snak(&p, &v));
    (
        "P[1-2]",
        value,
        prop::collection::vec(qualifier, 0..3),
        prop::option::of("Q1\\$[a-z]{3}"),
    )
        .prop_map(|(property, value, qualifiers, id)| {
            let mut claim = Claim::new(Snak::value(property, value))
                .with_qualifiers(SnakGroup::from_snaks(qualifiers));
            claim.id = id;
            claim
        })
}

proptest! {
    #[test]
    fn claim_equality_is_symmetric(a in arb_claim(), b in arb_claim()) {
        prop_assert_eq!(claims_equal(&a, &b), claims_equal(&b, &a));
    }

    #[test]
    fn claim_equality_ignores_id(a in arb_claim(), b in arb_claim(), id in "Q9\\$[a-z]{4}") {
        let before = claims_equal(&a, &b);
        let mut relabelled = a.clone();
        relabelled.id = Some(id);
        prop_assert_eq!(claims_equal(&relabelled, &b), before);
        prop_assert!(claims_equal(&relabelled, &a));
    }

    #[test]
    fn snak_group_order_survives_round_trip(a in arb_claim()) {
        let json = serde_json::to_string(&a).expect("serialise claim");
        let back: Claim = serde_json::from_str(&json).expect("parse claim");
        let before: Vec<_> = a.qualifiers.properties().collect();
        let after: Vec<_> = back.qualifiers.properties().collect();
        prop_assert_eq!(before, after);
    }
}
