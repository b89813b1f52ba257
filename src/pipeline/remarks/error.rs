//! Remark pipeline error types.
//!
//! `RemarkError` is fatal and raised before any concurrent work starts.
//! `ItemError` is per mapped item and ends up in that item's output cell.

use thiserror::Error;

use crate::pipeline::documents::DocumentError;
use crate::pipeline::gateway::GatewayError;
use crate::pipeline::matching::MatchingError;
use crate::pipeline::output::PersistenceError;
use crate::pipeline::prompting::PromptStoreError;

/// Prefix of the text written into a cell whose generation failed.
pub const ERROR_MARKER: &str = "[ERROR]";

#[derive(Error, Debug)]
pub enum RemarkError {
    #[error("Missing required setting: {0}")]
    Validation(String),

    #[error("Required column '{column}' not found in {side} dataset")]
    MissingColumn { side: &'static str, column: String },

    #[error("None of the selected prompts are available for remark generation: {0:?}")]
    NoPrompts(Vec<String>),

    #[error("Configuration error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Matching failed: {0}")]
    Matching(#[from] MatchingError),

    #[error("Prompt store error: {0}")]
    PromptStore(#[from] PromptStoreError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Error, Debug)]
pub enum ItemError {
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("Source row {0} does not exist")]
    MissingSourceRow(usize),
}

impl ItemError {
    /// Text written into the output cell in place of a remark.
    pub fn cell_marker(&self) -> String {
        format!("{ERROR_MARKER} {self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_marker_is_visible_and_readable() {
        let err = ItemError::from(GatewayError::Timeout(30));
        assert_eq!(err.cell_marker(), "[ERROR] Request timed out after 30s");
        assert!(ItemError::MissingSourceRow(7).cell_marker().starts_with(ERROR_MARKER));
    }

    #[test]
    fn validation_names_the_missing_field() {
        let err = RemarkError::Validation("target_config.output_col".into());
        assert!(err.to_string().contains("target_config.output_col"));
    }
}
