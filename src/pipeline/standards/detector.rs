use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::catalog::{self, CatalogEntry, CATALOG};
use super::{StandardDetector, StandardError};
use crate::models::{StandardInfo, TabularDataset, UNKNOWN_STANDARD_ID};

/// Rows sampled for content detection.
pub const SAMPLE_ROWS: usize = 20;

struct CompiledEntry {
    entry: &'static CatalogEntry,
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl CompiledEntry {
    fn hits(&self, lower_text: &str) -> bool {
        self.keywords.iter().any(|k| lower_text.contains(k.as_str()))
            || self.patterns.iter().any(|p| p.is_match(lower_text))
    }
}

static COMPILED: LazyLock<Vec<CompiledEntry>> = LazyLock::new(|| {
    CATALOG
        .iter()
        .map(|entry| CompiledEntry {
            entry,
            keywords: entry.keywords.iter().map(|k| k.to_lowercase()).collect(),
            patterns: entry
                .patterns
                .iter()
                .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
                .collect(),
        })
        .collect()
});

/// Id of the first catalog standard mentioned in `text`.
pub fn detect_in_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    COMPILED
        .iter()
        .find(|compiled| compiled.hits(&lower))
        .map(|compiled| compiled.entry.id)
}

/// Keyword and pattern detector over the built-in catalog.
///
/// Looks at the file-name hint first, then the column names, then the
/// text of the first `SAMPLE_ROWS` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordStandardDetector;

impl KeywordStandardDetector {
    pub fn new() -> Self {
        Self
    }
}

impl StandardDetector for KeywordStandardDetector {
    fn detect(&self, dataset: &TabularDataset, hint: Option<&str>) -> Result<String, StandardError> {
        if let Some(found) = hint.and_then(detect_in_text) {
            tracing::debug!(standard = found, source = "file name", "Standard detected");
            return Ok(found.to_string());
        }

        if let Some(found) = detect_in_text(&dataset.columns().join(" ")) {
            tracing::debug!(standard = found, source = "columns", "Standard detected");
            return Ok(found.to_string());
        }

        let sample = dataset
            .rows()
            .take(SAMPLE_ROWS)
            .flat_map(|row| row.iter())
            .filter(|cell| !cell.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(found) = detect_in_text(&sample) {
            tracing::debug!(standard = found, source = "content", "Standard detected");
            return Ok(found.to_string());
        }

        Ok(UNKNOWN_STANDARD_ID.to_string())
    }

    fn info(&self, id: &str) -> StandardInfo {
        catalog::standard_info(id)
    }
}
