//! Document matching: align rows of a review sheet with rows of a target
//! document by clause identifier.
//!
//! Two strategies sit behind `DocumentMatcher`:
//! - `DeterministicMatcher`: tiered exact/normalized/prefix/similarity match
//! - `LlmMatcher`: asks the model to align both lists, degrading to the
//!   deterministic matcher on any failure
//!
//! `create_matcher` picks one from a mode string.

pub mod deterministic;
pub mod llm;
pub mod normalize;

use std::sync::Arc;

use thiserror::Error;

use crate::models::{ItemMatch, MatchMapping, TabularDataset};
use crate::pipeline::gateway::{LlmGateway, UsageSnapshot};

pub use deterministic::DeterministicMatcher;
pub use llm::LlmMatcher;
pub use normalize::{normalize, similarity};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    #[error("Matching column '{column}' not found in {side} dataset")]
    MissingColumn { side: &'static str, column: String },
}

/// Matching strategy.
pub trait DocumentMatcher: Send + Sync {
    /// Map source rows to target rows on `source_col` / `target_col`.
    /// Unmatched source rows produce no mapping.
    fn match_documents(
        &self,
        source: &TabularDataset,
        target: &TabularDataset,
        source_col: &str,
        target_col: &str,
    ) -> Result<Vec<MatchMapping>, MatchingError>;

    /// Best target row for a single free-text item.
    fn match_item(
        &self,
        item: &str,
        target: &TabularDataset,
        target_col: &str,
    ) -> Result<Option<ItemMatch>, MatchingError>;

    /// API usage of the last `match_documents` call, for matchers that call
    /// a model.
    fn api_usage(&self) -> Option<UsageSnapshot> {
        None
    }

    fn name(&self) -> &'static str;
}

/// Matching mode selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Exact tier only.
    Exact,
    /// All deterministic tiers.
    Flexible,
    /// Model-assisted.
    Llm,
}

impl MatchMode {
    /// Parse a mode string. `None` for anything unrecognized.
    pub fn parse(mode: &str) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "basic" | "flexible" => Some(Self::Flexible),
            "ai" | "llm" => Some(Self::Llm),
            _ => None,
        }
    }
}

/// Build the matcher for `mode`.
///
/// Unknown modes, and the model-assisted mode without a gateway, fall back
/// to the flexible deterministic matcher with a warning.
pub fn create_matcher(
    mode: &str,
    gateway: Option<Arc<dyn LlmGateway>>,
) -> Box<dyn DocumentMatcher> {
    match (MatchMode::parse(mode), gateway) {
        (Some(MatchMode::Exact), _) => Box::new(DeterministicMatcher::exact()),
        (Some(MatchMode::Flexible), _) => Box::new(DeterministicMatcher::flexible()),
        (Some(MatchMode::Llm), Some(gateway)) => Box::new(LlmMatcher::new(gateway)),
        (Some(MatchMode::Llm), None) => {
            tracing::warn!(mode, "No LLM gateway available, using deterministic matching");
            Box::new(DeterministicMatcher::flexible())
        }
        (None, _) => {
            tracing::warn!(mode, "Unsupported matching mode, using deterministic matching");
            Box::new(DeterministicMatcher::flexible())
        }
    }
}

/// Fail with `MissingColumn` unless `dataset` has `column`.
pub(crate) fn require_column(
    dataset: &TabularDataset,
    column: &str,
    side: &'static str,
) -> Result<(), MatchingError> {
    if dataset.has_column(column) {
        Ok(())
    } else {
        Err(MatchingError::MissingColumn {
            side,
            column: column.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::MockGateway;

    #[test]
    fn mode_parsing_accepts_aliases() {
        assert_eq!(MatchMode::parse("basic"), Some(MatchMode::Flexible));
        assert_eq!(MatchMode::parse(" AI "), Some(MatchMode::Llm));
        assert_eq!(MatchMode::parse("exact"), Some(MatchMode::Exact));
        assert_eq!(MatchMode::parse("semantic"), None);
    }

    #[test]
    fn factory_selects_strategy() {
        let gateway: Arc<dyn LlmGateway> = Arc::new(MockGateway::new("[]"));
        assert_eq!(create_matcher("exact", None).name(), "exact");
        assert_eq!(create_matcher("basic", None).name(), "flexible");
        assert_eq!(create_matcher("ai", Some(gateway)).name(), "llm");
    }

    #[test]
    fn invalid_mode_falls_back_to_deterministic() {
        assert_eq!(create_matcher("nonsense", None).name(), "flexible");
        assert_eq!(create_matcher("llm", None).name(), "flexible");
    }
}
