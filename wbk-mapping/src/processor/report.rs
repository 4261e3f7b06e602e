//! Counters produced by a mapping run.

use std::fmt;
use std::ops::AddAssign;

use camino::Utf8PathBuf;

use crate::strategy::StrategyTally;

/// A row skipped because its target or a referenced entity was ambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguityRecord {
    /// CSV file the row came from.
    pub file: Utf8PathBuf,
    /// 1-based data line.
    pub line: usize,
    /// Key that matched several entities.
    pub key: String,
    /// Matching entity ids, lowest first.
    pub candidates: Vec<String>,
}

/// What a run did, summed over rules and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingReport {
    /// Rows read.
    pub rows_seen: usize,
    /// Rows skipped for a blank key, an ambiguity or a disabled create.
    pub rows_skipped: usize,
    /// Exact duplicate rows dropped within a chunk.
    pub duplicates_dropped: usize,
    /// Entities created.
    pub created: usize,
    /// Existing entities submitted with changes.
    pub updated: usize,
    /// Existing entities matched but left as they were.
    pub unchanged: usize,
    /// Claims added.
    pub claims_appended: usize,
    /// Claims overwritten in place.
    pub claims_replaced: usize,
    /// Claims that absorbed qualifiers or references.
    pub claims_merged: usize,
    /// Claims skipped because the property was already populated.
    pub claims_kept: usize,
    /// Statements that produced no claim.
    pub claims_skipped: usize,
    /// Claims written with an unresolved item label.
    pub pending_references: usize,
    /// Rows skipped for ambiguity.
    pub ambiguities: Vec<AmbiguityRecord>,
}

impl MappingReport {
    /// Fold a strategy tally into the claim counters.
    pub fn record_tally(&mut self, tally: StrategyTally) {
        self.claims_appended += tally.appended;
        self.claims_replaced += tally.replaced;
        self.claims_merged += tally.merged;
        self.claims_kept += tally.kept;
    }
}

impl AddAssign for MappingReport {
    fn add_assign(&mut self, other: Self) {
        self.rows_seen += other.rows_seen;
        self.rows_skipped += other.rows_skipped;
        self.duplicates_dropped += other.duplicates_dropped;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.claims_appended += other.claims_appended;
        self.claims_replaced += other.claims_replaced;
        self.claims_merged += other.claims_merged;
        self.claims_kept += other.claims_kept;
        self.claims_skipped += other.claims_skipped;
        self.pending_references += other.pending_references;
        self.ambiguities.extend(other.ambiguities);
    }
}

impl fmt::Display for MappingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rows: {} seen, {} skipped, {} duplicates dropped",
            self.rows_seen, self.rows_skipped, self.duplicates_dropped
        )?;
        writeln!(
            f,
            "entities: {} created, {} updated, {} unchanged",
            self.created, self.updated, self.unchanged
        )?;
        writeln!(
            f,
            "claims: {} appended, {} replaced, {} merged, {} kept, {} skipped",
            self.claims_appended,
            self.claims_replaced,
            self.claims_merged,
            self.claims_kept,
            self.claims_skipped
        )?;
        write!(
            f,
            "pending label references: {}",
            self.pending_references
        )?;
        for record in &self.ambiguities {
            write!(
                f,
                "\nambiguous: {}:{} '{}' matches [{}]",
                record.file,
                record.line,
                record.key,
                record.candidates.join(", ")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn reports_sum_and_render() {
        let mut total = MappingReport {
            rows_seen: 2,
            created: 1,
            ..MappingReport::default()
        };
        let mut other = MappingReport {
            rows_seen: 3,
            rows_skipped: 1,
            updated: 1,
            ..MappingReport::default()
        };
        other.record_tally(StrategyTally {
            appended: 2,
            kept: 1,
            ..StrategyTally::default()
        });
        other.ambiguities.push(AmbiguityRecord {
            file: "schools.csv".into(),
            line: 3,
            key: "Escuela Básica".into(),
            candidates: vec!["Q1".into(), "Q2".into()],
        });
        total += other;

        assert_eq!(total.rows_seen, 5);
        assert_eq!(total.claims_appended, 2);
        assert_eq!(
            total.to_string(),
            "rows: 5 seen, 1 skipped, 0 duplicates dropped\n\
             entities: 1 created, 1 updated, 0 unchanged\n\
             claims: 2 appended, 0 replaced, 0 merged, 1 kept, 0 skipped\n\
             pending label references: 0\n\
             ambiguous: schools.csv:3 'Escuela Básica' matches [Q1, Q2]"
        );
    }
}
