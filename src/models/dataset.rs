use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Ordered rows of string cells addressed by column name.
///
/// Row positions are the row indices used by match mappings. Cells are kept
/// as text: every consumer (matching, prompting, output) works on the
/// string form of a value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "DatasetRepr")]
pub struct TabularDataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TabularDataset {
    pub fn new(columns: Vec<String>) -> Self {
        let index = build_index(&columns);
        Self {
            columns,
            rows: Vec::new(),
            index,
        }
    }

    /// Build a dataset from `(column, value)` records. Columns are collected
    /// in first-seen order; cells missing from a record stay empty.
    pub fn from_records<I, R, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut dataset = Self::default();
        for record in records {
            let pairs: Vec<(String, String)> = record
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect();
            for (column, _) in &pairs {
                dataset.ensure_column(column);
            }
            let mut row = vec![String::new(); dataset.columns.len()];
            for (column, value) in pairs {
                if let Some(&idx) = dataset.index.get(&column) {
                    row[idx] = value;
                }
            }
            dataset.rows.push(row);
        }
        dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Append a row. Short rows are padded, long rows truncated.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.columns.len(), String::new());
        self.rows.push(cells);
    }

    /// Add `column` with empty cells if it does not exist yet.
    /// Returns `true` when the column was created.
    pub fn ensure_column(&mut self, column: &str) -> bool {
        if self.has_column(column) {
            return false;
        }
        self.index.insert(column.to_string(), self.columns.len());
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        true
    }

    /// Cell value, `None` if the row or column does not exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Overwrite a cell. Returns `false` if the row or column does not exist.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) -> bool {
        let Some(col) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }

    /// `(row_index, value)` for every row of `column`, or `None` if the column
    /// does not exist.
    pub fn column_values(&self, column: &str) -> Option<Vec<(usize, &str)>> {
        let col = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .enumerate()
                .map(|(i, r)| (i, r.get(col).map_or("", String::as_str)))
                .collect(),
        )
    }

    /// `(column, value)` pairs of one row in column order.
    pub fn row(&self, row: usize) -> Option<Vec<(&str, &str)>> {
        self.rows.get(row).map(|cells| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(cells.iter().map(String::as_str))
                .collect()
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Serialized form. Rows are padded or cut to the column count on the way in.
#[derive(Deserialize)]
struct DatasetRepr {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

impl From<DatasetRepr> for TabularDataset {
    fn from(repr: DatasetRepr) -> Self {
        let mut dataset = Self::new(repr.columns);
        for row in repr.rows {
            dataset.push_row(row);
        }
        dataset
    }
}

fn build_index(columns: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(columns.len());
    for (i, c) in columns.iter().enumerate() {
        index.entry(c.clone()).or_insert(i);
    }
    index
}
