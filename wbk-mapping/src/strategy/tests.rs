//! Tests for the update strategies.

use super::*;
use proptest::prelude::*;
use rstest::{fixture, rstest};
use wbk_core::{DataValue, Reference, Snak, SnakGroup};

fn item_claim(property: &str, target: &str) -> Claim {
    Claim::new(Snak::value(property, DataValue::EntityId(target.to_owned())))
}

fn text_claim(property: &str, text: &str) -> Claim {
    Claim::new(Snak::value(property, DataValue::String(text.to_owned())))
}

fn source(url: &str) -> Reference {
    Reference::new(SnakGroup::from_snaks([Snak::value(
        "P854",
        DataValue::String(url.to_owned()),
    )]))
}

#[fixture]
fn school() -> WorkingEntity {
    let mut entity = Entity::shell("Q10", "en", "Colegio A");
    entity.push_claim(item_claim("P31", "Q3914").with_id("Q10$1"));
    entity.push_claim(
        text_claim("P1448", "Colegio A")
            .with_id("Q10$2")
            .with_reference(source("https://a.example")),
    );
    WorkingEntity::new(entity)
}

#[rstest]
#[case(UpdateAction::ReplaceAll)]
#[case(UpdateAction::AppendOrReplace)]
#[case(UpdateAction::ForceAppend)]
#[case(UpdateAction::Keep)]
#[case(UpdateAction::MergeRefsOrAppend)]
#[case(UpdateAction::MergeQualifiersOrAppend)]
fn factory_selects_matching_strategy(#[case] action: UpdateAction) {
    assert_eq!(strategy_for(action).action(), action);
}

#[rstest]
fn replace_all_is_destructive(mut school: WorkingEntity) {
    let tally = ReplaceAll.apply(&mut school, vec![item_claim("P17", "Q298")]);

    assert_eq!(tally.appended, 1);
    assert!(!school.entity().has_claims_for("P31"));
    assert!(!school.entity().has_claims_for("P1448"));
    assert_eq!(school.entity().claims_for("P17").len(), 1);
}

#[rstest]
fn replace_all_clears_once_per_working_copy(mut school: WorkingEntity) {
    ReplaceAll.apply(&mut school, vec![item_claim("P17", "Q298")]);
    ReplaceAll.apply(&mut school, vec![item_claim("P17", "Q414")]);
    assert_eq!(school.entity().claims_for("P17").len(), 2);
}

#[rstest]
fn keep_never_loses_data(mut school: WorkingEntity) {
    let tally = Keep.apply(
        &mut school,
        vec![item_claim("P31", "Q9826"), item_claim("P17", "Q298")],
    );

    assert_eq!(tally.kept, 1);
    assert_eq!(tally.appended, 1);
    let instance_of = school.entity().claims_for("P31");
    assert_eq!(instance_of.len(), 1);
    assert_eq!(instance_of[0].id.as_deref(), Some("Q10$1"));
    assert_eq!(school.entity().claims_for("P17").len(), 1);
}

#[rstest]
fn keep_accumulates_new_properties_within_a_chunk(mut school: WorkingEntity) {
    Keep.apply(&mut school, vec![item_claim("P17", "Q298")]);
    let tally = Keep.apply(&mut school, vec![item_claim("P17", "Q414")]);
    assert_eq!(tally.appended, 1);
    assert_eq!(school.entity().claims_for("P17").len(), 2);
}

#[rstest]
fn keep_without_changes_is_unmodified(mut school: WorkingEntity) {
    Keep.apply(&mut school, vec![item_claim("P31", "Q9826")]);
    assert!(!school.is_modified());
}

#[rstest]
fn force_append_duplicates(mut school: WorkingEntity) {
    let tally = ForceAppend.apply(&mut school, vec![item_claim("P31", "Q3914")]);
    assert_eq!(tally.appended, 1);
    assert_eq!(school.entity().claims_for("P31").len(), 2);
}

#[rstest]
fn append_or_replace_preserves_claim_id(mut school: WorkingEntity) {
    let incoming = item_claim("P31", "Q3914").with_reference(source("https://b.example"));
    let tally = AppendOrReplace.apply(
        &mut school,
        vec![incoming, item_claim("P31", "Q9826")],
    );

    assert_eq!(tally.replaced, 1);
    assert_eq!(tally.appended, 1);
    let instance_of = school.entity().claims_for("P31");
    assert_eq!(instance_of.len(), 2);
    assert_eq!(instance_of[0].id.as_deref(), Some("Q10$1"));
    assert_eq!(instance_of[0].references.len(), 1);
    assert!(instance_of[1].id.is_none());
}

#[rstest]
fn merge_refs_adds_new_blocks_only(mut school: WorkingEntity) {
    let incoming = vec![
        text_claim("P1448", "Colegio A")
            .with_reference(source("https://a.example"))
            .with_reference(source("https://b.example")),
    ];
    let tally = MergeRefsOrAppend.apply(&mut school, incoming);

    assert_eq!(tally.merged, 1);
    let claims = school.entity().claims_for("P1448");
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].references.len(), 2);
}

#[rstest]
fn merge_refs_appends_when_qualifiers_differ(mut school: WorkingEntity) {
    let qualified = text_claim("P1448", "Colegio A").with_qualifiers(SnakGroup::from_snaks([
        Snak::value("P585", DataValue::String("2020".into())),
    ]));
    let tally = MergeRefsOrAppend.apply(&mut school, vec![qualified]);
    assert_eq!(tally.appended, 1);
    assert_eq!(school.entity().claims_for("P1448").len(), 2);
}

#[rstest]
fn merge_qualifiers_keeps_existing_values(mut school: WorkingEntity) {
    let first = text_claim("P1448", "Colegio A").with_qualifiers(SnakGroup::from_snaks([
        Snak::value("P585", DataValue::String("2020".into())),
    ]));
    let second = text_claim("P1448", "Colegio A").with_qualifiers(SnakGroup::from_snaks([
        Snak::value("P585", DataValue::String("2021".into())),
        Snak::value("P585", DataValue::String("2020".into())),
    ]));
    MergeQualifiersOrAppend.apply(&mut school, vec![first]);
    let tally = MergeQualifiersOrAppend.apply(&mut school, vec![second]);

    assert_eq!(tally.merged, 1);
    let claims = school.entity().claims_for("P1448");
    assert_eq!(claims.len(), 1);
    let values: Vec<_> = claims[0]
        .qualifiers
        .get("P585")
        .expect("qualifiers")
        .iter()
        .map(|snak| snak.datavalue().map(DataValue::key_text))
        .collect();
    assert_eq!(values, vec![Some("2020".to_owned()), Some("2021".to_owned())]);
    assert_eq!(claims[0].references.len(), 1);
}

#[rstest]
fn working_set_submits_only_modified_entities() {
    let mut set = WorkingSet::new();
    let untouched = Entity::shell("Q1", "en", "Los Andes");
    let changed = Entity::shell("Q2", "en", "Colegio A");

    set.get_or_insert_with("Q2", || changed.clone());
    set.get_or_insert_with("Q1", || untouched.clone());
    let working = set.get_or_insert_with("Q2", || panic!("already fetched"));
    ForceAppend.apply(working, vec![item_claim("P31", "Q3914")]);

    assert_eq!(set.len(), 2);
    let (modified, unchanged) = set.into_modified();
    assert_eq!(unchanged, 1);
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].id.as_deref(), Some("Q2"));
}

proptest! {
    #[test]
    fn force_append_grows_by_claim_count(count in 0usize..8) {
        let mut working = WorkingEntity::new(Entity::shell("Q1", "en", "Colegio A"));
        let claims = (0..count).map(|_| item_claim("P31", "Q3914")).collect();
        let tally = ForceAppend.apply(&mut working, claims);
        prop_assert_eq!(tally.appended, count);
        prop_assert_eq!(working.entity().claims_for("P31").len(), count);
        prop_assert_eq!(working.is_modified(), count > 0);
    }
}
