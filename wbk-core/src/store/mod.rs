//! SQLite-backed Wikibase stand-in.
//!
//! The store keeps one JSON document per entity alongside a term index used
//! for label and description searches. It implements every collaborator
//! trait, so mappings can run end to end against a local file.
//!
//! - [`schema`] creates the tables and tracks the schema version.
//! - [`search`] answers item and property lookups.
//! - [`persistence`] creates and overwrites documents.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use rusqlite::Connection;
use thiserror::Error;

use crate::EntityKind;

mod persistence;
mod schema;
mod search;

pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};


/// Errors raised by the SQLite store.
#[derive(Debug, Error)]
pub enum SqliteWikibaseError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The schema could not be created or verified.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A query failed.
    #[error("SQLite query failed during {operation}")]
    Query {
        /// Operation being performed.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A stored document was not a valid entity.
    #[error("failed to decode stored document for {id}")]
    Decode {
        /// Identifier of the entity.
        id: String,
        /// JSON decoding failure.
        #[source]
        source: simd_json::Error,
    },
}

impl SqliteWikibaseError {
    fn query(operation: &'static str) -> impl Fn(rusqlite::Error) -> Self {
        move |source| Self::Query { operation, source }
    }
}

const fn kind_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Item => "item",
        EntityKind::Property => "property",
    }
}

/// Entity store backed by a single SQLite database.
pub struct SqliteWikibase {
    connection: Connection,
}

impl fmt::Debug for SqliteWikibase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteWikibase")
            .field("path", &self.connection.path())
            .finish_non_exhaustive()
    }
}

impl SqliteWikibase {
    /// Open or create a store at `path`, initialising the schema.
    pub fn open<P>(path: P) -> Result<Self, SqliteWikibaseError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let connection =
            Connection::open(path).map_err(|source| SqliteWikibaseError::OpenDatabase {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// A transient store held in memory.
    pub fn in_memory() -> Result<Self, SqliteWikibaseError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteWikibaseError::OpenDatabase {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, SqliteWikibaseError> {
        initialise_schema(&mut connection)?;
        Ok(Self { connection })
    }
}
