//! Facade crate for the Wikibase bulk loader.
//!
//! This crate re-exports the entity model, mapping configuration, and
//! collaborator traits from `wbk-core` together with the mapping engine from
//! `wbk-mapping`. The SQLite entity store is exposed behind a feature flag.

#![forbid(unsafe_code)]

pub use wbk_core::{
    AmbiguousMatch, Claim, ConfigError, DataValue, Datatype, Entity, EntityKind, EntityWriter,
    ItemSearch, MappingConfig, MappingRule, PropertyInfo, PropertyLookup, Rank, SearchBackend,
    SearchError, SearchHit, Snak, SnakValue, SubmitError, UpdateAction, ValueSpec,
    WikibaseBackend,
};

#[cfg(feature = "store-sqlite")]
pub use wbk_core::{SqliteWikibase, SqliteWikibaseError};

pub use wbk_mapping::{
    CreateStep, MappingProcessor, MappingReport, ProcessError, ResolutionContext, ResolvedValue,
    UpdateStrategy, resolve, strategy_for,
};
