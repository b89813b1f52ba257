use std::fs::File;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;

use super::{DocumentError, DocumentParser};
use crate::models::TabularDataset;

const UTF8_BOM: char = '\u{feff}';

/// Comma- or tab-separated file with a header row.
///
/// `.tsv` files are tab-separated, everything else comma-separated. Rows
/// may be ragged; short rows are padded with empty cells. Cells beyond the
/// header width are dropped, with a warning when any of them held text.
#[derive(Debug, Clone)]
pub struct CsvDocumentParser {
    path: PathBuf,
    dataset: TabularDataset,
    truncated_rows: usize,
}

impl CsvDocumentParser {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        };
        let file = File::open(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let csv_err = |source| DocumentError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches(UTF8_BOM) } else { h };
                h.trim().to_string()
            })
            .collect();
        if columns.iter().all(String::is_empty) {
            return Err(DocumentError::Empty(path.to_path_buf()));
        }

        let width = columns.len();
        let mut dataset = TabularDataset::new(columns);
        let mut truncated_rows = 0;
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            if record.iter().skip(width).any(|cell| !cell.trim().is_empty()) {
                truncated_rows += 1;
                tracing::warn!(
                    path = %path.display(),
                    row = dataset.len() + 1,
                    line = record.position().map(|p| p.line()),
                    fields = record.len(),
                    columns = width,
                    "Row has more fields than the header, extra cells dropped"
                );
            }
            dataset.push_row(record.iter().map(str::to_string).collect());
        }

        tracing::debug!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.columns().len(),
            "Parsed delimited document"
        );
        Ok(Self {
            path: path.to_path_buf(),
            dataset,
            truncated_rows,
        })
    }

    /// Rows that lost non-empty cells past the header width.
    pub fn truncated_rows(&self) -> usize {
        self.truncated_rows
    }

    pub fn into_dataset(self) -> TabularDataset {
        self.dataset
    }
}

impl DocumentParser for CsvDocumentParser {
    fn path(&self) -> &Path {
        &self.path
    }

    fn dataset(&self) -> &TabularDataset {
        &self.dataset
    }
}
