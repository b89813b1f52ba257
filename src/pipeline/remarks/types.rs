use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RemarkError;
use crate::models::TabularDataset;
use crate::pipeline::documents::detect_columns;
use crate::pipeline::gateway::UsageSnapshot;

// ═══════════════════════════════════════════
// Column roles
// ═══════════════════════════════════════════

/// Column roles in the review sheet. Both are required; they are optional
/// here so a missing setting is reported by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub clause_col: Option<String>,
    pub title_col: Option<String>,
}

impl SourceConfig {
    pub fn new(clause_col: &str, title_col: &str) -> Self {
        Self {
            clause_col: Some(clause_col.to_string()),
            title_col: Some(title_col.to_string()),
        }
    }
}

/// Column roles in the target document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub clause_col: Option<String>,
    /// Created with empty cells when absent.
    pub output_col: Option<String>,
}

impl TargetConfig {
    pub fn new(clause_col: &str, output_col: &str) -> Self {
        Self {
            clause_col: Some(clause_col.to_string()),
            output_col: Some(output_col.to_string()),
        }
    }
}

/// Resolved column names of a run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Columns {
    pub source_clause: String,
    pub source_title: String,
    pub target_clause: String,
    pub output: String,
}

impl Columns {
    pub(crate) fn resolve(source: &SourceConfig, target: &TargetConfig) -> Result<Self, RemarkError> {
        fn required(value: &Option<String>, name: &str) -> Result<String, RemarkError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| RemarkError::Validation(name.to_string()))
        }
        Ok(Self {
            source_clause: required(&source.clause_col, "source_config.clause_col")?,
            source_title: required(&source.title_col, "source_config.title_col")?,
            target_clause: required(&target.clause_col, "target_config.clause_col")?,
            output: required(&target.output_col, "target_config.output_col")?,
        })
    }
}

// ═══════════════════════════════════════════
// Request
// ═══════════════════════════════════════════

/// Parameters of one remark generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemarkRequest {
    pub source_config: SourceConfig,
    pub target_config: TargetConfig,
    /// Remark templates to apply, by name.
    pub prompt_names: Vec<String>,
    /// `basic`, `exact` or `ai`.
    pub matching_mode: String,
    /// Explicit standard; detected from the review sheet when `None`.
    #[serde(default)]
    pub standard_id: Option<String>,
    /// Review sheet file name, used as a detection hint.
    #[serde(default)]
    pub source_hint: Option<String>,
    /// Target file path, used to name the output file.
    #[serde(default)]
    pub target_hint: Option<PathBuf>,
}

impl RemarkRequest {
    pub fn new(source_config: SourceConfig, target_config: TargetConfig, prompt_names: &[&str]) -> Self {
        Self {
            source_config,
            target_config,
            prompt_names: prompt_names.iter().map(|n| n.to_string()).collect(),
            matching_mode: "basic".to_string(),
            standard_id: None,
            source_hint: None,
            target_hint: None,
        }
    }

    pub fn with_matching_mode(mut self, mode: &str) -> Self {
        self.matching_mode = mode.to_string();
        self
    }

    pub fn with_standard(mut self, standard_id: &str) -> Self {
        self.standard_id = Some(standard_id.to_string());
        self
    }

    /// Fill unset column settings from the datasets' headers. Settings that
    /// are already given are kept.
    pub fn fill_missing_columns(&mut self, source: &TabularDataset, target: &TabularDataset) {
        fn fill(slot: &mut Option<String>, guess: Option<String>) {
            if slot.as_deref().map_or(true, |v| v.trim().is_empty()) {
                if let Some(guess) = guess {
                    *slot = Some(guess);
                }
            }
        }
        let src = detect_columns(source.columns());
        let tgt = detect_columns(target.columns());
        fill(&mut self.source_config.clause_col, src.clause);
        fill(&mut self.source_config.title_col, src.title);
        fill(&mut self.target_config.clause_col, tgt.clause);
        fill(&mut self.target_config.output_col, tgt.remark);
    }
}

// ═══════════════════════════════════════════
// Results
// ═══════════════════════════════════════════

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub mappings: usize,
    /// Units whose LLM call was started.
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Started but not written because the run was cancelled.
    pub abandoned: usize,
    pub cancelled: bool,
}

/// Result of `RemarkPipeline::generate`.
#[derive(Debug, Clone)]
pub struct RemarkOutcome {
    pub run_id: Uuid,
    pub target: TabularDataset,
    /// Remark generation calls.
    pub usage: UsageSnapshot,
    /// Matching calls, for model-assisted matching.
    pub matching_usage: Option<UsageSnapshot>,
    pub standard_id: String,
    pub stats: RunStats,
}

/// Result of `RemarkPipeline::run`: the outcome after saving.
#[derive(Debug, Clone, Serialize)]
pub struct RemarkRunReport {
    pub run_id: Uuid,
    pub output_path: PathBuf,
    pub usage: UsageSnapshot,
    pub matching_usage: Option<UsageSnapshot>,
    pub standard_id: String,
    pub stats: RunStats,
}

// ═══════════════════════════════════════════
// Progress events
// ═══════════════════════════════════════════

/// Progress reported on the orchestrating thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RemarkProgress {
    Started { total: usize },
    Progress { completed: usize, total: usize, clause: String },
    Cancelled { completed: usize, total: usize },
    Completed { succeeded: usize, failed: usize },
}
