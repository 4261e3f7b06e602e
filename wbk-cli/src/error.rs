//! Error types for the `wbk` command.

use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;
use wbk_core::SqliteWikibaseError;
use wbk_mapping::ProcessError;

/// Errors emitted by the `wbk` CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The mapping file could not be opened or read.
    #[error("failed to read mapping file at {path:?}: {source}")]
    ReadMapping {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The mapping file is not a valid mapping configuration.
    #[error("failed to parse mapping file at {path:?}: {source}")]
    ParseMapping {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The directory holding the mapping file could not be opened.
    #[error("failed to open mapping directory {path:?}: {source}")]
    OpenMappingDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite entity store failed.
    #[error("failed to open entity store at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: SqliteWikibaseError,
    },
    /// Applying the mapping failed.
    #[error("failed to apply mapping: {0}")]
    Process(#[from] ProcessError),
    /// Writing the run summary failed.
    #[error("failed to write load summary: {0}")]
    WriteReport(#[source] std::io::Error),
}
