//! SQLite schema for the entity store.

use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Errors raised when initialising the entity schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Foreign key enforcement could not be enabled.
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A migration statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Name of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was written by a newer schema.
    #[error(
        "expected entity schema version {expected} but found {found}; use a matching release of the loader"
    )]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}

/// Create or verify the entity tables.
///
/// Fresh databases are migrated to [`SCHEMA_VERSION`]; databases already at
/// that version are left untouched.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use wbk_core::store::{SCHEMA_VERSION, initialise_schema};
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create entity schema");
/// initialise_schema(&mut conn).expect("schema initialisation is idempotent");
///
/// let version: i64 = conn
///     .pragma_query_value(None, "user_version", |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, SCHEMA_VERSION);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| SchemaError::ForeignKeys { source })?;

    let found: i64 = connection
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;
    match found {
        SCHEMA_VERSION => return Ok(()),
        0 => {}
        found => {
            return Err(SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
    }

    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    create_indexes(&transaction)?;
    transaction
        .pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|source| SchemaError::Migration {
            step: "record schema version",
            source,
        })?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_tables(transaction: &rusqlite::Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create entities",
        "CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
            kind TEXT NOT NULL CHECK (kind IN ('item', 'property')),
            numeric_id INTEGER NOT NULL CHECK (numeric_id > 0),
            document TEXT NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create entity_terms",
        "CREATE TABLE IF NOT EXISTS entity_terms (
            entity_id TEXT NOT NULL,
            language TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('label', 'description', 'alias')),
            value TEXT NOT NULL,
            FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE
        )",
    )
}

fn create_indexes(transaction: &rusqlite::Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "index entities by kind",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_kind_numeric
            ON entities(kind, numeric_id)",
    )?;
    run_migration_step(
        transaction,
        "index entity_terms lookup",
        "CREATE INDEX IF NOT EXISTS idx_entity_terms_lookup
            ON entity_terms(language, kind, value, entity_id)",
    )?;
    run_migration_step(
        transaction,
        "index entity_terms owner",
        "CREATE INDEX IF NOT EXISTS idx_entity_terms_entity ON entity_terms(entity_id)",
    )
}

fn run_migration_step(
    transaction: &rusqlite::Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}
