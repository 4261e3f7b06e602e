//! Data rows read from CSV.

use std::collections::{BTreeMap, BTreeSet};

use wbk_core::template::{self, TemplateError};

/// One CSV record keyed by column name.
///
/// Cells are stored trimmed; empty cells are kept as empty strings so that
/// column presence and cell emptiness stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    line: usize,
    cells: BTreeMap<String, String>,
}

impl Row {
    /// A row at a 1-based data line.
    pub fn new<I, K, V>(line: usize, cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            line,
            cells: cells
                .into_iter()
                .map(|(column, value)| (column.into(), value.into().trim().to_owned()))
                .collect(),
        }
    }

    /// 1-based data line of the record, header excluded.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Cell of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Whether the row has the column.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Render a `{column}` template against the row.
    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        template::render(template, |column| self.get(column))
    }

    /// Keep only the listed columns.
    #[must_use]
    pub fn project(&self, columns: &BTreeSet<String>) -> Self {
        Self {
            line: self.line,
            cells: self
                .cells
                .iter()
                .filter(|(column, _)| columns.contains(*column))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
        }
    }

    /// Cells keyed by column.
    #[must_use]
    pub const fn cells(&self) -> &BTreeMap<String, String> {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn trims_cells_and_projects() {
        let row = Row::new(3, [("name", " Colegio A "), ("district", "Los Andes")]);
        assert_eq!(row.get("name"), Some("Colegio A"));

        let projected = row.project(&BTreeSet::from(["name".to_owned()]));
        assert!(!projected.has_column("district"));
        assert_eq!(projected.line(), 3);
    }

    #[rstest]
    fn cells_ignore_line() {
        let a = Row::new(1, [("name", "Colegio A")]);
        let b = Row::new(2, [("name", "Colegio A")]);
        assert_eq!(a.cells(), b.cells());
        assert_ne!(a, b);
    }
}
