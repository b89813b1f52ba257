//! Document parsers: expose a file as a `TabularDataset`.
//!
//! Only delimited text is parsed here. Spreadsheet, PDF and Word formats
//! are reported as unsupported.

pub mod columns;
pub mod csv_parser;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::TabularDataset;

pub use columns::{detect_columns, DetectedColumns};
pub use csv_parser::CsvDocumentParser;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed delimited file {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Document has no header row: {0}")]
    Empty(PathBuf),
}

/// Tabular view of a parsed document.
pub trait DocumentParser: Send + Sync {
    fn path(&self) -> &Path;

    fn dataset(&self) -> &TabularDataset;

    /// Header and cells as plain text, one row per line.
    fn text_content(&self) -> String {
        let dataset = self.dataset();
        let mut text = dataset.columns().join(" ");
        for row in dataset.rows() {
            text.push('\n');
            text.push_str(&row.join(" "));
        }
        text
    }

    fn estimate_tokens(&self) -> usize {
        estimate_tokens(&self.text_content())
    }
}

/// Rough token count: `words * 1.3` for mostly-Latin text, otherwise
/// `chars * 0.5`.
pub fn estimate_tokens(text: &str) -> usize {
    let total = text.chars().count();
    if total == 0 {
        return 0;
    }
    let latin = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if latin * 2 > total {
        (text.split_whitespace().count() as f64 * 1.3) as usize
    } else {
        (total as f64 * 0.5) as usize
    }
}

/// Parser for `path`, chosen by extension. `sheet` selects a worksheet in
/// formats that have them and is ignored otherwise.
pub fn parser_for_path(
    path: &Path,
    sheet: Option<&str>,
) -> Result<Box<dyn DocumentParser>, DocumentError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "tsv" => {
            if let Some(sheet) = sheet {
                tracing::debug!(path = %path.display(), sheet, "Sheet selector ignored for delimited file");
            }
            Ok(Box::new(CsvDocumentParser::open(path)?))
        }
        _ => Err(DocumentError::UnsupportedFormat(if ext.is_empty() {
            path.display().to_string()
        } else {
            ext
        })),
    }
}
