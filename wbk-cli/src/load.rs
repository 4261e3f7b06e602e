//! Load command implementation for the `wbk` CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use wbk_core::{MappingConfig, SqliteWikibase, WikibaseBackend};
use wbk_mapping::{MappingProcessor, MappingReport};

use crate::{
    ARG_CHUNK_SIZE, ARG_DATABASE, ARG_LANGUAGE, ARG_MAPPING, CliError, ENV_DATABASE, ENV_MAPPING,
    fs::{open_input, open_parent_dir, open_utf8_file},
};

/// CLI arguments for the `load` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply a JSON mapping configuration to its CSV files and \
                 write the resulting entities into a SQLite entity store. \
                 CSV paths are resolved relative to the mapping file.",
    about = "Load CSV rows into a Wikibase entity store"
)]
#[ortho_config(prefix = "WBK")]
pub(crate) struct LoadArgs {
    /// Path to the JSON mapping configuration.
    #[arg(long = ARG_MAPPING, value_name = "path")]
    #[serde(default)]
    pub(crate) mapping: Option<Utf8PathBuf>,
    /// Path to the SQLite entity store; created when missing.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Rows per chunk, overriding the mapping's `chunk_size`.
    #[arg(long = ARG_CHUNK_SIZE, value_name = "rows")]
    #[serde(default)]
    pub(crate) chunk_size: Option<usize>,
    /// Term language, overriding the mapping's `language`.
    #[arg(long = ARG_LANGUAGE, value_name = "code")]
    #[serde(default)]
    pub(crate) language: Option<String>,
}

impl LoadArgs {
    pub(crate) fn into_config(self) -> Result<LoadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LoadConfig::try_from(merged)
    }
}

/// Resolved `load` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadConfig {
    /// Path to the mapping configuration.
    pub(crate) mapping: Utf8PathBuf,
    /// Path to the SQLite entity store.
    pub(crate) database: Utf8PathBuf,
    /// Chunk size override.
    pub(crate) chunk_size: Option<usize>,
    /// Language override.
    pub(crate) language: Option<String>,
}

impl TryFrom<LoadArgs> for LoadConfig {
    type Error = CliError;

    fn try_from(args: LoadArgs) -> Result<Self, Self::Error> {
        let mapping = args.mapping.ok_or(CliError::MissingArgument {
            field: ARG_MAPPING,
            env: ENV_MAPPING,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DATABASE,
        })?;
        Ok(Self {
            mapping,
            database,
            chunk_size: args.chunk_size,
            language: args.language,
        })
    }
}

pub(super) fn run_load(args: LoadArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_load_with(args, &mut stdout)
}

pub(super) fn run_load_with(args: LoadArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store =
        SqliteWikibase::open(&config.database).map_err(|source| CliError::OpenStore {
            path: config.database.clone(),
            source,
        })?;
    let report = execute_load(&config, &store)?;
    write_report(writer, &report)
}

/// Apply the configured mapping against `backend`.
pub(crate) fn execute_load(
    config: &LoadConfig,
    backend: &dyn WikibaseBackend,
) -> Result<MappingReport, CliError> {
    let mapping = load_mapping(&config.mapping)?;
    let language = config
        .language
        .clone()
        .unwrap_or_else(|| mapping.language.clone());
    let dir = open_parent_dir(&config.mapping).map_err(|source| {
        CliError::OpenMappingDirectory {
            path: config.mapping.clone(),
            source,
        }
    })?;

    info!(
        "loading mapping '{}' ({} files) in language {language}",
        mapping.name,
        mapping.csv_files.len()
    );
    let mut processor = MappingProcessor::new(backend, language);
    if let Some(chunk_size) = config.chunk_size {
        processor = processor.with_chunk_size(chunk_size);
    }
    let report = processor.process_mapping(&mapping, |path| open_input(&dir, path))?;
    info!(
        "mapping '{}' done: {} created, {} updated",
        mapping.name, report.created, report.updated
    );
    Ok(report)
}

/// Loads a JSON-encoded [`MappingConfig`] from disk.
pub(super) fn load_mapping(path: &Utf8Path) -> Result<MappingConfig, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::ReadMapping {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|source| CliError::ParseMapping {
        path: path.to_path_buf(),
        source,
    })
}

fn write_report(writer: &mut dyn Write, report: &MappingReport) -> Result<(), CliError> {
    writeln!(writer, "{report}").map_err(CliError::WriteReport)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<LoadConfig, CliError> {
    let merged = LoadArgs::merge_from_layers(layers).map_err(CliError::from)?;
    LoadConfig::try_from(merged)
}
