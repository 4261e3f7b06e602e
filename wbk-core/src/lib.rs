//! Core domain types for the Wikibase bulk loader.
//!
//! The crate owns the typed entity document model and its Wikibase JSON wire
//! format, the claim comparison primitives shared by the update strategies,
//! the declarative mapping configuration, and the collaborator traits used to
//! search and persist entities. Storage adapters live behind feature flags.
#![forbid(unsafe_code)]

pub mod datatype;
pub mod entity;
pub mod mapping;
pub mod normalise;
pub mod search;
pub mod template;

#[cfg(feature = "store-sqlite")]
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use datatype::Datatype;
pub use entity::{
    Claim, DataValue, Entity, EntityKind, Reference, Rank, Snak, SnakGroup, SnakValue,
    compare::{
        claims_equal, merge_qualifiers, merge_references, same_main_value, snak_groups_equal,
        snaks_equal,
    },
};
pub use mapping::{
    ConfigError, CsvDialect, CsvFileConfig, ItemDefinition, LabelRef, MappingConfig, MappingRule,
    SearchMode, SnakMatcher, StatementDefinition, UpdateAction, ValueSpec,
};
pub use search::{
    AmbiguousMatch, EntityWriter, ItemSearch, PropertyInfo, PropertyLookup, SearchBackend,
    SearchError, SearchHit, SubmitError, WikibaseBackend, require_unambiguous,
};

#[cfg(feature = "store-sqlite")]
pub use store::{SqliteWikibase, SqliteWikibaseError};
