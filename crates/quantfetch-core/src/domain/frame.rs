use serde::{Deserialize, Serialize};

/// Row-major table of numeric cells with a string row index (a date, a
/// timestamp or a contract symbol) and named columns. Missing cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl Frame {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            index: Vec::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with `None`, long rows truncated.
    pub fn push_row(&mut self, label: impl Into<String>, mut cells: Vec<Option<f64>>) {
        cells.resize(self.columns.len(), None);
        self.index.push(label.into());
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = Option<f64>> + '_> {
        let position = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row.get(position).copied().flatten()))
    }

    /// Row label and cells of the last row.
    pub fn last_row(&self) -> Option<(&str, &[Option<f64>])> {
        let label = self.index.last()?;
        let row = self.rows.last()?;
        Some((label.as_str(), row.as_slice()))
    }

    /// Position of `label` in the row index.
    pub fn row_position(&self, label: &str) -> Option<usize> {
        self.index.iter().position(|candidate| candidate == label)
    }
}

/// Payloads that can be checked as tables.
pub trait Tabular {
    /// Named frames making up the payload.
    fn frames(&self) -> Vec<(&'static str, &Frame)>;
}

impl Tabular for Frame {
    fn frames(&self) -> Vec<(&'static str, &Frame)> {
        vec![("data", self)]
    }
}
