//! Standard detection: tag a review sheet with the technical standard it
//! refers to. The tag only decorates prompts.

pub mod catalog;
pub mod detector;

use thiserror::Error;

use crate::models::{StandardInfo, TabularDataset};

pub use catalog::{all_standards, standard_info, CATALOG};
pub use detector::{detect_in_text, KeywordStandardDetector};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StandardError {
    #[error("Standard detection failed: {0}")]
    Detection(String),
}

/// Classifies a dataset by the standard it refers to.
pub trait StandardDetector: Send + Sync {
    /// Standard id, or `UNKNOWN`. `hint` is typically the source file name.
    fn detect(&self, dataset: &TabularDataset, hint: Option<&str>) -> Result<String, StandardError>;

    fn info(&self, id: &str) -> StandardInfo;
}
