//! Behavioural tests for `MappingProcessor` using rstest-bdd.

use std::cell::RefCell;
use std::io;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use wbk_core::{
    Claim, DataValue, Datatype, Entity, MappingConfig, Snak, test_support::MemoryBackend,
};
use wbk_mapping::{MappingProcessor, MappingReport};

/// Shared state for mapping scenarios.
struct MappingWorld {
    backend: MemoryBackend,
    rule: RefCell<serde_json::Value>,
    school: RefCell<Option<String>>,
    report: RefCell<Option<MappingReport>>,
}

#[fixture]
fn world() -> MappingWorld {
    MappingWorld {
        backend: MemoryBackend::new(),
        rule: RefCell::new(json!(null)),
        school: RefCell::new(None),
        report: RefCell::new(None),
    }
}

fn district_rule(update_action: Option<&str>) -> serde_json::Value {
    let mut rule = json!({
        "item": {"label": "{name}"},
        "statements": [{"property": "instance of", "value": {"label": "{district}"}}]
    });
    if let Some(action) = update_action {
        rule["update_action"] = json!(action);
    }
    rule
}

fn process(world: &MappingWorld, csv: &str) {
    let config: MappingConfig = serde_json::from_value(json!({
        "name": "schools",
        "csv_files": [{"file_path": "schools.csv", "mappings": [world.rule.borrow().clone()]}]
    }))
    .expect("parse mapping");
    let mut processor = MappingProcessor::new(&world.backend, "en");
    let report = processor
        .process_mapping(&config, |_| Ok::<_, io::Error>(csv.as_bytes()))
        .expect("process mapping");
    world.report.replace(Some(report));
}

fn report(world: &MappingWorld) -> MappingReport {
    world
        .report
        .borrow()
        .clone()
        .expect("a mapping run is recorded")
}

fn created_school(world: &MappingWorld) -> Entity {
    let submissions = world.backend.submissions();
    let created = submissions
        .iter()
        .find(|submission| submission.is_new)
        .expect("a create submission");
    created.entities[0].clone()
}

fn instance_of(entity: &Entity) -> Option<DataValue> {
    entity
        .claims_for("P1")
        .first()
        .and_then(|claim| claim.mainsnak.datavalue().cloned())
}

#[given("a backend with an instance of property")]
fn given_backend(world: &MappingWorld) {
    world
        .backend
        .add_property("en", "instance of", Datatype::WikibaseItem);
}

#[given("an item labelled Los Andes")]
fn given_district(world: &MappingWorld) {
    world.backend.add_item("en", "Los Andes");
}

#[given("two items labelled Escuela Básica")]
fn given_shared_label(world: &MappingWorld) {
    world.backend.add_item("en", "Escuela Básica");
    world.backend.add_item("en", "Escuela Básica");
}

#[given("a school Colegio A that is an instance of Q7")]
fn given_existing_school(world: &MappingWorld) {
    let mut school = Entity::item();
    school.set_label("en", "Colegio A");
    school.push_claim(Claim::new(Snak::value(
        "P1",
        DataValue::EntityId("Q7".into()),
    )));
    world.school.replace(Some(world.backend.insert(school)));
}

#[given("a create-only mapping of schools to districts")]
fn given_create_mapping(world: &MappingWorld) {
    world.rule.replace(district_rule(None));
}

#[given("a keep mapping of schools to districts")]
fn given_keep_mapping(world: &MappingWorld) {
    world.rule.replace(district_rule(Some("keep")));
}

#[when("the row Colegio A in Los Andes is processed")]
fn when_school_processed(world: &MappingWorld) {
    process(world, "name,district\nColegio A,Los Andes\n");
}

#[when("the row Escuela Básica in Los Andes is processed")]
fn when_shared_processed(world: &MappingWorld) {
    process(world, "name,district\nEscuela Básica,Los Andes\n");
}

#[then("one entity is created")]
fn then_one_created(world: &MappingWorld) {
    assert_eq!(report(world).created, 1);
}

#[then("no entity is created")]
fn then_none_created(world: &MappingWorld) {
    assert_eq!(report(world).created, 0);
    assert!(world.backend.submissions().is_empty());
}

#[then("the created school is an instance of Q1")]
fn then_resolved(world: &MappingWorld) {
    let school = created_school(world);
    assert_eq!(school.label("en"), Some("Colegio A"));
    assert_eq!(instance_of(&school), Some(DataValue::EntityId("Q1".into())));
}

#[then("the created school refers to the label Los Andes")]
fn then_unresolved(world: &MappingWorld) {
    let school = created_school(world);
    assert_eq!(
        instance_of(&school),
        Some(DataValue::String("Los Andes".into()))
    );
}

#[then("{count} label reference is pending")]
fn then_pending(count: usize, world: &MappingWorld) {
    assert_eq!(report(world).pending_references, count);
}

#[then("the row is recorded as matching {count} candidates")]
fn then_ambiguous(count: usize, world: &MappingWorld) {
    let report = report(world);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.ambiguities.len(), 1);
    assert_eq!(report.ambiguities[0].candidates.len(), count);
}

#[then("{count} claim is kept")]
fn then_kept(count: usize, world: &MappingWorld) {
    assert_eq!(report(world).claims_kept, count);
}

#[then("the stored school is still an instance of Q7")]
fn then_untouched(world: &MappingWorld) {
    let id = world.school.borrow().clone().expect("a seeded school");
    let stored = world.backend.entity(&id).expect("stored school");
    assert_eq!(instance_of(&stored), Some(DataValue::EntityId("Q7".into())));
}

#[scenario(path = "tests/features/mapping.feature", index = 0)]
fn resolved_district(world: MappingWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mapping.feature", index = 1)]
fn unresolved_district(world: MappingWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mapping.feature", index = 2)]
fn ambiguous_school(world: MappingWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mapping.feature", index = 3)]
fn keep_existing(world: MappingWorld) {
    let _ = world;
}
