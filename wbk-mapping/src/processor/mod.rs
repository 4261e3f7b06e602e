//! Mapping processor: drives rules over CSV chunks.
//!
//! For every file and rule the processor reads the CSV in chunks, derives a
//! search key per row, finds the target entities with one bulk search per
//! chunk, then routes rows to the update strategy or the create step. New
//! entities are submitted before updates. A chunk's working set is dropped
//! once it has been submitted, so an entity hit again in a later chunk is
//! fetched afresh and sees the earlier write.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, error, info, warn};
use thiserror::Error;
use wbk_core::{
    AmbiguousMatch, ConfigError, Datatype, MappingConfig, MappingRule, PropertyInfo,
    SearchError, SearchHit, SubmitError, UpdateAction, WikibaseBackend, template::TemplateError,
};

use crate::{
    Row,
    claims::{ClaimError, apply_statements, build_claims, record_pending},
    context::{ContextError, LookupKey, ResolutionContext},
    create::CreateStep,
    csv_source::{CsvChunks, CsvError, DEFAULT_CHUNK_SIZE},
    resolve::{
        ItemLookup, extract_columns, extract_item_lookups, missing_columns,
        missing_template_columns,
    },
    strategy::{UpdateStrategy, WorkingSet, strategy_for},
    terms::apply_terms,
};

mod keys;
mod report;

pub use keys::{SearchKey, search, search_key};
pub use report::{AmbiguityRecord, MappingReport};

/// Errors that abort a rule or the whole run.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The mapping configuration is invalid.
    #[error("invalid mapping configuration")]
    Config(#[from] ConfigError),
    /// A CSV file could not be opened.
    #[error("failed to open CSV file {path}")]
    Open {
        /// File as named in the mapping.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A CSV file could not be read or decoded.
    #[error("failed to read CSV input")]
    Csv(#[from] CsvError),
    /// Property or entity resolution failed.
    #[error("mapping rule {rule} could not resolve its references")]
    Context {
        /// Index of the rule within its file.
        rule: usize,
        /// Underlying failure.
        #[source]
        source: ContextError,
    },
    /// The bulk search for target entities failed.
    #[error("mapping rule {rule} could not search for target entities")]
    Search {
        /// Index of the rule within its file.
        rule: usize,
        /// Underlying failure.
        #[source]
        source: SearchError,
    },
    /// Claims for a row could not be built.
    #[error("mapping rule {rule} failed on line {line}")]
    Claim {
        /// Index of the rule within its file.
        rule: usize,
        /// 1-based data line.
        line: usize,
        /// Underlying failure.
        #[source]
        source: ClaimError,
    },
    /// A label, description or key template could not be rendered.
    #[error("mapping rule {rule} could not render line {line}")]
    Render {
        /// Index of the rule within its file.
        rule: usize,
        /// 1-based data line.
        line: usize,
        /// Underlying failure.
        #[source]
        source: TemplateError,
    },
    /// Writing entities failed.
    #[error("mapping rule {rule} could not submit entities")]
    Submit {
        /// Index of the rule within its file.
        rule: usize,
        /// Underlying failure.
        #[source]
        source: SubmitError,
    },
    /// Several rows of a chunk share a search key.
    #[error("mapping rule {rule} has duplicate search keys: {}", keys.join(", "))]
    DuplicateKeys {
        /// Index of the rule within its file.
        rule: usize,
        /// Keys seen more than once.
        keys: Vec<String>,
    },
}

/// Everything a rule needs per chunk, derived once per rule.
struct RulePlan<'r> {
    index: usize,
    file: &'r Utf8Path,
    rule: &'r MappingRule,
    snak: Option<PropertyInfo>,
    columns: BTreeSet<String>,
    lookups: Vec<ItemLookup<'r>>,
    strategy: Option<Box<dyn UpdateStrategy>>,
    creates_missing: bool,
}

/// Applies mapping configurations against a Wikibase backend.
pub struct MappingProcessor<'b> {
    backend: &'b dyn WikibaseBackend,
    context: ResolutionContext<'b>,
    chunk_size: Option<usize>,
}

impl<'b> MappingProcessor<'b> {
    /// A processor writing terms in `language`.
    pub fn new(backend: &'b dyn WikibaseBackend, language: impl Into<String>) -> Self {
        Self {
            backend,
            context: ResolutionContext::new(backend, language),
            chunk_size: None,
        }
    }

    /// Override the configured chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Resolution caches shared by every rule of the run.
    #[must_use]
    pub const fn context(&self) -> &ResolutionContext<'b> {
        &self.context
    }

    /// Run every rule of every file in `config`.
    ///
    /// `open` maps a file path from the configuration to a reader, letting
    /// callers decide how relative paths are resolved.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, input or collaborator failure.
    /// Ambiguous rows are recorded in the report instead.
    pub fn process_mapping<R, F>(
        &mut self,
        config: &MappingConfig,
        mut open: F,
    ) -> Result<MappingReport, ProcessError>
    where
        R: Read,
        F: FnMut(&Utf8Path) -> io::Result<R>,
    {
        config.validate()?;
        let chunk_size = self
            .chunk_size
            .or(config.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let mut report = MappingReport::default();
        for file in &config.csv_files {
            let dialect = config.dialect_for(file);
            for (index, rule) in file.mappings.iter().enumerate() {
                let reader = open(&file.file_path).map_err(|source| ProcessError::Open {
                    path: file.file_path.clone(),
                    source,
                })?;
                let chunks = CsvChunks::new(reader, &dialect, chunk_size)?;
                let action = rule.effective_action(file.update_action);
                report += self.run_rule(&file.file_path, index, rule, action, chunks)?;
            }
        }
        self.context.log_stats();
        Ok(report)
    }

    fn run_rule<R: Read>(
        &mut self,
        file: &Utf8Path,
        index: usize,
        rule: &MappingRule,
        action: Option<UpdateAction>,
        chunks: CsvChunks<R>,
    ) -> Result<MappingReport, ProcessError> {
        let headers: BTreeSet<String> = chunks.headers().iter().cloned().collect();
        check_columns(index, rule, &headers)?;

        let context_error = |source| ProcessError::Context {
            rule: index,
            source,
        };
        self.context
            .ensure_properties(rule)
            .map_err(context_error)?;
        let snak = match &rule.item.snak {
            Some(matcher) => self
                .context
                .property_info(&matcher.property)
                .map_err(context_error)?,
            None => None,
        };
        let mut lookups = Vec::new();
        for statement in rule.statements.iter().flat_map(|s| s.walk()) {
            let Some(value) = &statement.value else {
                continue;
            };
            let datatype = match &statement.datatype {
                Some(datatype) => datatype.clone(),
                None => self
                    .context
                    .property_info(&statement.property)
                    .map_err(context_error)?
                    .map_or(Datatype::String, |info| info.datatype),
            };
            lookups.extend(extract_item_lookups(value, &datatype));
        }

        let plan = RulePlan {
            index,
            file,
            rule,
            snak,
            columns: rule_columns(rule)
                .into_iter()
                .filter(|column| headers.contains(column))
                .collect(),
            lookups,
            strategy: action.map(strategy_for),
            creates_missing: rule.creates_missing(action),
        };

        let pending_before = self.context.pending_count();
        let mut report = MappingReport::default();
        for (number, chunk) in chunks.enumerate() {
            let rows = chunk?;
            let count = rows.len();
            report += self.process_chunk(&plan, rows)?;
            info!(
                "{file} rule {index}: chunk {} done ({count} rows)",
                number + 1
            );
        }
        report.pending_references = self.context.pending_count() - pending_before;
        Ok(report)
    }

    fn process_chunk(
        &mut self,
        plan: &RulePlan<'_>,
        rows: Vec<Row>,
    ) -> Result<MappingReport, ProcessError> {
        let rule_index = plan.index;
        let mut report = MappingReport {
            rows_seen: rows.len(),
            ..MappingReport::default()
        };

        let mut seen = BTreeSet::new();
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.project(&plan.columns);
            if !seen.insert(row.cells().clone()) {
                report.duplicates_dropped += 1;
                continue;
            }
            let key = search_key(&plan.rule.item, plan.snak.as_ref(), &row).map_err(
                |source| ProcessError::Render {
                    rule: rule_index,
                    line: row.line(),
                    source,
                },
            )?;
            let Some(key) = key else {
                warn!(
                    "{} line {}: blank item label, row skipped",
                    plan.file,
                    row.line()
                );
                report.rows_skipped += 1;
                continue;
            };
            keyed.push((row, key));
        }
        if !plan.rule.allow_duplicates {
            check_duplicate_keys(rule_index, &keyed)?;
        }
        if keyed.is_empty() {
            return Ok(report);
        }

        let lookup_keys: BTreeSet<LookupKey> = keyed
            .iter()
            .flat_map(|(row, _)| plan.lookups.iter().filter_map(|lookup| lookup.render(row)))
            .collect();
        let lookup_keys: Vec<LookupKey> = lookup_keys.into_iter().collect();
        self.context
            .ensure_lookups(&lookup_keys)
            .map_err(|source| ProcessError::Context {
                rule: rule_index,
                source,
            })?;

        let search_keys: BTreeSet<SearchKey> = keyed.iter().map(|(_, key)| key.clone()).collect();
        let hits = search(
            self.backend,
            &search_keys,
            plan.snak.as_ref(),
            self.context.language(),
        )
        .map_err(|source| ProcessError::Search {
            rule: rule_index,
            source,
        })?;

        let language = self.context.language().to_owned();
        let mut create = CreateStep::new(language.clone());
        let mut working = WorkingSet::new();
        let mut untouched = BTreeSet::new();
        for (row, key) in keyed {
            let hit = hits.get(&key).cloned().unwrap_or(SearchHit::NotFound);
            match hit {
                SearchHit::Ambiguous(ambiguous) => {
                    record_ambiguity(&mut report, plan.file, row.line(), ambiguous);
                }
                SearchHit::Found(entity) => {
                    let Some(strategy) = &plan.strategy else {
                        untouched.insert(entity.id.clone().unwrap_or_default());
                        continue;
                    };
                    let built = match build_claims(&plan.rule.statements, &row, &mut self.context)
                    {
                        Ok(built) => built,
                        Err(ClaimError::Ambiguous(ambiguous)) => {
                            record_ambiguity(&mut report, plan.file, row.line(), ambiguous);
                            continue;
                        }
                        Err(source) => {
                            return Err(ProcessError::Claim {
                                rule: rule_index,
                                line: row.line(),
                                source,
                            });
                        }
                    };
                    let id = entity.id.clone().unwrap_or_default();
                    let target = working.get_or_insert_with(&id, || *entity);
                    apply_terms(target.entity_mut(), &plan.rule.item, &row, &language).map_err(
                        |source| ProcessError::Render {
                            rule: rule_index,
                            line: row.line(),
                            source,
                        },
                    )?;
                    record_pending(
                        built
                            .claims
                            .iter()
                            .filter(|claim| strategy.admits(target, claim)),
                        &mut self.context,
                    );
                    report.record_tally(strategy.apply(target, built.claims));
                    report.claims_skipped += built.skipped;
                }
                SearchHit::NotFound if plan.creates_missing => {
                    let mut entity = create.new_entity(&plan.rule.item, &row).map_err(
                        |source| ProcessError::Render {
                            rule: rule_index,
                            line: row.line(),
                            source,
                        },
                    )?;
                    match apply_statements(
                        &mut entity,
                        &row,
                        &plan.rule.statements,
                        &mut self.context,
                    ) {
                        Ok(built) => {
                            report.claims_appended += built.claims.len();
                            report.claims_skipped += built.skipped;
                            create.push(entity);
                        }
                        Err(ClaimError::Ambiguous(ambiguous)) => {
                            record_ambiguity(&mut report, plan.file, row.line(), ambiguous);
                        }
                        Err(source) => {
                            return Err(ProcessError::Claim {
                                rule: rule_index,
                                line: row.line(),
                                source,
                            });
                        }
                    }
                }
                SearchHit::NotFound => {
                    debug!(
                        "{} line {}: no entity matches '{key}', creation disabled",
                        plan.file,
                        row.line()
                    );
                    report.rows_skipped += 1;
                }
            }
        }

        let submit_error = |source| ProcessError::Submit {
            rule: rule_index,
            source,
        };
        let created = create.submit(self.backend).map_err(submit_error)?;
        report.created += created.len();
        for entry in &created {
            if let Some(label) = &entry.label {
                self.context.learn_label(label, &entry.id);
            }
        }

        let (modified, unchanged) = working.into_modified();
        report.unchanged += unchanged + untouched.len();
        if !modified.is_empty() {
            report.updated += modified.len();
            self.backend
                .submit(modified, false)
                .map_err(submit_error)?;
        }
        Ok(report)
    }
}

impl std::fmt::Debug for MappingProcessor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingProcessor")
            .field("context", &self.context)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

fn record_ambiguity(
    report: &mut MappingReport,
    file: &Utf8Path,
    line: usize,
    ambiguous: AmbiguousMatch,
) {
    error!("{file} line {line}: Ambiguous match: {ambiguous}");
    report.rows_skipped += 1;
    report.ambiguities.push(AmbiguityRecord {
        file: file.to_owned(),
        line,
        key: ambiguous.key,
        candidates: ambiguous.candidates,
    });
}

fn check_duplicate_keys(rule: usize, keyed: &[(Row, SearchKey)]) -> Result<(), ProcessError> {
    let mut counts: BTreeMap<&SearchKey, usize> = BTreeMap::new();
    for (_, key) in keyed {
        *counts.entry(key).or_default() += 1;
    }
    let keys: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    if keys.is_empty() {
        Ok(())
    } else {
        Err(ProcessError::DuplicateKeys { rule, keys })
    }
}

/// Fail when the rule reads a column the header does not declare.
fn check_columns(
    rule_index: usize,
    rule: &MappingRule,
    headers: &BTreeSet<String>,
) -> Result<(), ConfigError> {
    let item = &rule.item;
    let templates = std::iter::once(&item.label)
        .chain(&item.description)
        .chain(&item.aliases)
        .chain(item.snak.iter().map(|snak| &snak.value));
    let mut missing: Vec<String> = templates
        .flat_map(|text| missing_template_columns(text, headers))
        .collect();
    for statement in rule.statements.iter().flat_map(|s| s.walk()) {
        if let Some(value) = &statement.value {
            missing.extend(missing_columns(value, headers));
        }
    }
    match missing.into_iter().next() {
        Some(column) => Err(ConfigError::UnknownColumn {
            rule: rule_index,
            column,
        }),
        None => Ok(()),
    }
}

/// Every column the rule may read; callers intersect with the header.
fn rule_columns(rule: &MappingRule) -> BTreeSet<String> {
    let item = &rule.item;
    let templates = std::iter::once(&item.label)
        .chain(&item.description)
        .chain(&item.aliases)
        .chain(item.snak.iter().map(|snak| &snak.value));
    let mut columns = BTreeSet::new();
    for text in templates {
        columns.insert(text.clone());
        columns.extend(
            wbk_core::template::placeholders(text)
                .into_iter()
                .map(str::to_owned),
        );
    }
    for statement in rule.statements.iter().flat_map(|s| s.walk()) {
        if let Some(value) = &statement.value {
            columns.extend(extract_columns(value));
        }
    }
    columns
}
