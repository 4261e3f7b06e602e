//! CSV-to-Wikibase mapping engine.
//!
//! The engine turns CSV rows into entity documents following a
//! [`wbk_core::MappingConfig`]. Values are resolved against a
//! [`ResolutionContext`] that caches property and label lookups for the
//! whole run, claims are built per statement, and rows are reconciled with
//! existing entities through one of the [`UpdateStrategy`] implementations.
//! [`MappingProcessor`] ties the pieces together over bounded CSV chunks.
//!
//! # Examples
//!
//! ```
//! use wbk_core::{MappingConfig, test_support::MemoryBackend};
//! use wbk_mapping::MappingProcessor;
//!
//! let config: MappingConfig = serde_json::from_str(r#"{
//!     "name": "schools",
//!     "csv_files": [{
//!         "file_path": "schools.csv",
//!         "mappings": [{"item": {"label": "{name}"}}]
//!     }]
//! }"#).expect("parse mapping");
//!
//! let backend = MemoryBackend::new();
//! let mut processor = MappingProcessor::new(&backend, "en");
//! let report = processor
//!     .process_mapping(&config, |_| Ok::<_, std::io::Error>(&b"name\nColegio A\n"[..]))
//!     .expect("process mapping");
//! assert_eq!(report.created, 1);
//! ```
#![forbid(unsafe_code)]

mod claims;
pub mod context;
pub mod create;
pub mod csv_source;
pub mod processor;
pub mod resolve;
mod row;
pub mod strategy;
pub mod terms;

pub use claims::{
    BuiltClaims, ClaimError, ConvertError, apply_statements, build_claim, build_claims,
    pending_labels, record_pending, to_datavalue,
};
pub use context::{CacheStats, ContextError, LookupKey, ResolutionContext};
pub use create::{CreateStep, Created};
pub use csv_source::{CsvChunks, CsvError, DEFAULT_CHUNK_SIZE};
pub use processor::{AmbiguityRecord, MappingProcessor, MappingReport, ProcessError, SearchKey};
pub use resolve::{ResolveError, ResolvedValue, resolve};
pub use row::Row;
pub use strategy::{StrategyTally, UpdateStrategy, WorkingEntity, WorkingSet, strategy_for};
