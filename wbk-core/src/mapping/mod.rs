//! Declarative mapping configuration.
//!
//! A mapping configuration names one or more CSV files and, for each, the
//! rules that turn a row into an entity. The structures deserialise from
//! JSON; validation of rule combinations happens in [`MappingRule::validate`]
//! so that programmatically built rules are checked the same way.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Datatype, Rank};

mod value_spec;

pub use value_spec::{LabelRef, ValueSpec};

#[cfg(test)]
mod tests;

const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_ENCODING: &str = "utf-8";

/// Errors raised by invalid mapping configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// An item definition had an empty label template.
    #[error("mapping rule {rule} has an empty item label")]
    EmptyLabel {
        /// Index of the offending rule within its file.
        rule: usize,
    },
    /// A statement, qualifier or reference named no property.
    #[error("mapping rule {rule} has a statement without a property")]
    MissingProperty {
        /// Index of the offending rule within its file.
        rule: usize,
    },
    /// A snak matcher lacked its property or value template.
    #[error("mapping rule {rule} has an incomplete snak matcher")]
    IncompleteSnakMatcher {
        /// Index of the offending rule within its file.
        rule: usize,
    },
    /// Duplicate search keys were tolerated outside an update-only run.
    #[error(
        "mapping rule {rule} allows duplicates but is not update-only; set an update action and create_missing = false"
    )]
    DuplicatesRequireUpdateOnly {
        /// Index of the offending rule within its file.
        rule: usize,
    },
    /// A value map named none of `column`, `value` or `label`.
    #[error("invalid value spec: {reason}")]
    InvalidValueSpec {
        /// Why the value spec was rejected.
        reason: String,
    },
    /// The encoding label is not known to the WHATWG encoding standard, or
    /// cannot be decoded field by field.
    #[error("unsupported CSV encoding '{label}'")]
    UnsupportedEncoding {
        /// Configured encoding label.
        label: String,
    },
    /// The delimiter is not a single-byte ASCII character.
    #[error("unsupported CSV delimiter {delimiter:?}; use a single ASCII character")]
    UnsupportedDelimiter {
        /// Configured delimiter.
        delimiter: char,
    },
    /// The rule reads a column the CSV header does not declare.
    #[error("mapping rule {rule} references unknown column '{column}'")]
    UnknownColumn {
        /// Index of the offending rule within its file.
        rule: usize,
        /// Missing column name.
        column: String,
    },
}

/// Root of a mapping configuration file.
///
/// # Examples
///
/// ```
/// use wbk_core::MappingConfig;
///
/// let config: MappingConfig = serde_json::from_str(r#"{
///     "name": "schools",
///     "csv_files": [{
///         "file_path": "schools.csv",
///         "mappings": [{"item": {"label": "{name}"}}]
///     }]
/// }"#).expect("parse mapping");
///
/// assert_eq!(config.language, "en");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Human-readable name of the mapping.
    pub name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Language for labels, descriptions and aliases.
    #[serde(default = "default_language")]
    pub language: String,
    /// Default file encoding label.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Default field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Default decimal separator in numeric cells.
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    /// Rows per processing chunk, when overriding the processor default.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Files to load, in order.
    pub csv_files: Vec<CsvFileConfig>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_owned()
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_owned()
}

const fn default_delimiter() -> char {
    ','
}

const fn default_decimal_separator() -> char {
    '.'
}

impl MappingConfig {
    /// Validate every rule of every file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for file in &self.csv_files {
            for (index, rule) in file.mappings.iter().enumerate() {
                rule.validate(index, file.update_action)?;
            }
        }
        Ok(())
    }

    /// Effective CSV dialect for a file, applying its overrides.
    #[must_use]
    pub fn dialect_for(&self, file: &CsvFileConfig) -> CsvDialect {
        CsvDialect {
            encoding: file
                .encoding
                .clone()
                .unwrap_or_else(|| self.encoding.clone()),
            delimiter: file.delimiter.unwrap_or(self.delimiter),
            decimal_separator: file.decimal_separator.unwrap_or(self.decimal_separator),
        }
    }
}

/// One CSV file and the rules applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvFileConfig {
    /// Path to the file, relative to the configuration file.
    pub file_path: Utf8PathBuf,
    /// Encoding override.
    #[serde(default)]
    pub encoding: Option<String>,
    /// Delimiter override.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Decimal separator override.
    #[serde(default)]
    pub decimal_separator: Option<char>,
    /// Update action applied to rules that do not set their own.
    #[serde(default, alias = "updateAction")]
    pub update_action: Option<UpdateAction>,
    /// Rules applied to every row, in order.
    #[serde(default)]
    pub mappings: Vec<MappingRule>,
}

/// Resolved reading options for one CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDialect {
    /// Encoding label understood by the WHATWG encoding standard.
    pub encoding: String,
    /// Field delimiter.
    pub delimiter: char,
    /// Decimal separator in numeric cells.
    pub decimal_separator: char,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            delimiter: default_delimiter(),
            decimal_separator: default_decimal_separator(),
        }
    }
}

/// Policy used to reconcile rows with existing entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    /// Clear existing claims and write the new ones.
    ReplaceAll,
    /// Replace equal claims in place, append the rest.
    AppendOrReplace,
    /// Append every claim, duplicates included.
    ForceAppend,
    /// Leave populated properties untouched.
    Keep,
    /// Merge references into equal claims, append the rest.
    MergeRefsOrAppend,
    /// Merge qualifiers into claims with the same value, append the rest.
    MergeQualifiersOrAppend,
}

/// How a rule identifies its target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Label only.
    Label,
    /// Label and description.
    LabelDescription,
    /// Label and one property value.
    LabelSnak,
}

/// One row-to-entity transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    /// How the entity is identified and labelled.
    pub item: ItemDefinition,
    /// Statements written for every row, in order.
    #[serde(default)]
    pub statements: Vec<StatementDefinition>,
    /// Update policy; absence means rows only create entities.
    #[serde(default, alias = "updateAction")]
    pub update_action: Option<UpdateAction>,
    /// Whether an update run also creates entities for unmatched rows.
    #[serde(default = "default_create_missing")]
    pub create_missing: bool,
    /// Tolerate repeated search keys within a chunk (update-only runs).
    #[serde(default)]
    pub allow_duplicates: bool,
}

const fn default_create_missing() -> bool {
    true
}

impl MappingRule {
    /// A create-only rule with no statements.
    #[must_use]
    pub fn new(item: ItemDefinition) -> Self {
        Self {
            item,
            statements: Vec::new(),
            update_action: None,
            create_missing: true,
            allow_duplicates: false,
        }
    }

    /// Update action in effect, falling back to the file default.
    #[must_use]
    pub fn effective_action(&self, file_default: Option<UpdateAction>) -> Option<UpdateAction> {
        self.update_action.or(file_default)
    }

    /// Whether unmatched rows produce new entities.
    #[must_use]
    pub const fn creates_missing(&self, action: Option<UpdateAction>) -> bool {
        action.is_none() || self.create_missing
    }

    /// Check the rule for combinations that cannot run.
    ///
    /// `rule` is the index reported in errors; `file_default` is the update
    /// action inherited from the enclosing file.
    pub fn validate(
        &self,
        rule: usize,
        file_default: Option<UpdateAction>,
    ) -> Result<(), ConfigError> {
        if self.item.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel { rule });
        }
        if let Some(snak) = &self.item.snak
            && (snak.property.trim().is_empty() || snak.value.trim().is_empty())
        {
            return Err(ConfigError::IncompleteSnakMatcher { rule });
        }
        for statement in &self.statements {
            statement.validate(rule)?;
        }
        let action = self.effective_action(file_default);
        if self.allow_duplicates && (action.is_none() || self.create_missing) {
            return Err(ConfigError::DuplicatesRequireUpdateOnly { rule });
        }
        Ok(())
    }

    /// Every property label or id the rule refers to, in first-seen order.
    #[must_use]
    pub fn property_references(&self) -> Vec<&str> {
        let item_snak = self.item.snak.iter().map(|snak| snak.property.as_str());
        let statements = self
            .statements
            .iter()
            .flat_map(StatementDefinition::walk)
            .flat_map(|nested| {
                let matchers = nested
                    .value
                    .iter()
                    .flat_map(ValueSpec::snak_matchers)
                    .map(|matcher| matcher.property.as_str());
                std::iter::once(nested.property.as_str()).chain(matchers)
            });

        let mut properties: Vec<&str> = Vec::new();
        for property in item_snak.chain(statements) {
            if !property.is_empty() && !properties.contains(&property) {
                properties.push(property);
            }
        }
        properties
    }
}

/// Identity and terms of the target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Label template, or a bare column name.
    pub label: String,
    /// Description template.
    #[serde(default)]
    pub description: Option<String>,
    /// Alias templates.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Property value that disambiguates equal labels.
    #[serde(default)]
    pub snak: Option<SnakMatcher>,
}

impl ItemDefinition {
    /// An item identified by label alone.
    #[must_use]
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            aliases: Vec::new(),
            snak: None,
        }
    }

    /// Search mode derived from the populated fields.
    #[must_use]
    pub const fn search_mode(&self) -> SearchMode {
        if self.snak.is_some() {
            SearchMode::LabelSnak
        } else if self.description.is_some() {
            SearchMode::LabelDescription
        } else {
            SearchMode::Label
        }
    }
}

/// A property paired with a value template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnakMatcher {
    /// Property label or id.
    pub property: String,
    /// Value template rendered against the row.
    pub value: String,
}

/// A statement, qualifier or reference definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementDefinition {
    /// Property label or id.
    pub property: String,
    /// Where the value comes from.
    #[serde(default)]
    pub value: Option<ValueSpec>,
    /// Datatype override; defaults to the property's datatype.
    #[serde(default)]
    pub datatype: Option<Datatype>,
    /// Qualifier definitions.
    #[serde(default)]
    pub qualifiers: Vec<StatementDefinition>,
    /// Reference definitions, built into a single reference block.
    #[serde(default)]
    pub references: Vec<StatementDefinition>,
    /// Statement rank.
    #[serde(default)]
    pub rank: Rank,
}

impl StatementDefinition {
    /// A statement with a value and no qualifiers or references.
    #[must_use]
    pub fn new(property: impl Into<String>, value: ValueSpec) -> Self {
        Self {
            property: property.into(),
            value: Some(value),
            datatype: None,
            qualifiers: Vec::new(),
            references: Vec::new(),
            rank: Rank::Normal,
        }
    }

    /// Set the datatype override.
    #[must_use]
    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = Some(datatype);
        self
    }

    /// Iterate over this definition and its qualifiers and references.
    pub fn walk(&self) -> impl Iterator<Item = &Self> {
        std::iter::once(self)
            .chain(self.qualifiers.iter())
            .chain(self.references.iter())
    }

    fn validate(&self, rule: usize) -> Result<(), ConfigError> {
        for nested in self.walk() {
            if nested.property.trim().is_empty() {
                return Err(ConfigError::MissingProperty { rule });
            }
        }
        Ok(())
    }
}
