//! Behavioural tests for `SqliteWikibase` using rstest-bdd.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use wbk_core::{Entity, EntityWriter, ItemSearch, SearchHit, SqliteWikibase};

/// Shared state for store scenarios.
struct StoreWorld {
    store: SqliteWikibase,
    hit: RefCell<Option<SearchHit>>,
    loaded: RefCell<Option<Entity>>,
}

#[fixture]
fn world() -> StoreWorld {
    StoreWorld {
        store: SqliteWikibase::in_memory().expect("open in-memory store"),
        hit: RefCell::new(None),
        loaded: RefCell::new(None),
    }
}

fn create_items(world: &StoreWorld, label: &str, count: usize) {
    let items = (0..count)
        .map(|_| {
            let mut item = Entity::item();
            item.set_label("en", label);
            item
        })
        .collect();
    world.store.submit(items, true).expect("create items");
}

fn search(world: &StoreWorld, label: &str, allow_ambiguous: bool) {
    let mut hits = world
        .store
        .find_items_by_labels(&[label.to_owned()], "en", allow_ambiguous)
        .expect("search labels");
    world.hit.replace(hits.remove(label));
}

#[given("an empty SQLite entity store")]
fn given_store(world: &StoreWorld) {
    assert!(world.store.load("Q1").expect("load").is_none());
}

#[given("an item labelled Colegio A")]
fn given_school(world: &StoreWorld) {
    create_items(world, "Colegio A", 1);
}

#[given("two items labelled Escuela Básica")]
fn given_shared_label(world: &StoreWorld) {
    create_items(world, "Escuela Básica", 2);
}

#[when("I search for the label Colegio A")]
fn when_search_school(world: &StoreWorld) {
    search(world, "Colegio A", false);
}

#[when("I search for the label Escuela Básica")]
fn when_search_shared(world: &StoreWorld) {
    search(world, "Escuela Básica", false);
}

#[when("I search for the label Escuela Básica tolerating ambiguity")]
fn when_search_tolerant(world: &StoreWorld) {
    search(world, "Escuela Básica", true);
}

#[when("I load the identifier q7")]
fn when_load(world: &StoreWorld) {
    let mut found = world
        .store
        .find_items_by_qids(&["q7".to_owned()], "en")
        .expect("load qids");
    world.loaded.replace(found.remove("Q7"));
}

#[then("the search finds item Q1")]
fn then_found(world: &StoreWorld) {
    let hit = world.hit.borrow();
    let hit = hit.as_ref().expect("a search result is recorded");
    assert_eq!(hit.id(), Some("Q1"));
}

#[then("the search reports {count} candidates")]
fn then_ambiguous(count: usize, world: &StoreWorld) {
    let hit = world.hit.borrow();
    let Some(SearchHit::Ambiguous(ambiguous)) = hit.as_ref() else {
        panic!("expected an ambiguous hit");
    };
    assert_eq!(ambiguous.candidates.len(), count);
}

#[then("the loaded entity Q7 has no labels")]
fn then_shell(world: &StoreWorld) {
    let loaded = world.loaded.borrow();
    let entity = loaded.as_ref().expect("Q7 is returned");
    assert_eq!(entity.id.as_deref(), Some("Q7"));
    assert!(entity.labels.is_empty());
}

#[scenario(path = "tests/features/sqlite_store.feature", index = 0)]
fn unique_label(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_store.feature", index = 1)]
fn ambiguous_label(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_store.feature", index = 2)]
fn tolerated_ambiguity(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_store.feature", index = 3)]
fn qid_shells(world: StoreWorld) {
    let _ = world;
}
