//! RemarkPipeline: matches review rows to target rows and fills the
//! target's output column with one generated remark per match.
//!
//! Validate → ensure output column → resolve standard → match → select
//! prompts → generate concurrently → (run only) save.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::cancel::CancellationToken;
use super::error::{ItemError, RemarkError};
use super::pool::run_bounded;
use super::types::*;
use crate::config::AppConfig;
use crate::models::{MatchMapping, PromptUsage, StandardInfo, TabularDataset, UNKNOWN_STANDARD_ID};
use crate::pipeline::documents::parser_for_path;
use crate::pipeline::gateway::{GeminiGateway, LlmGateway, UsageStats};
use crate::pipeline::matching::create_matcher;
use crate::pipeline::output::ResultWriter;
use crate::pipeline::prompting::{
    CachedPromptStore, JsonPromptStore, PromptComposer, PromptInputs, PromptStore, RowContext,
};
use crate::pipeline::standards::{KeywordStandardDetector, StandardDetector};

/// Completions between progress reports.
const PROGRESS_EVERY: usize = 5;
/// Ceiling on concurrent remark calls, whatever `parallel_requests` says.
pub const MAX_WORKERS: usize = 10;

/// Orchestrates a remark generation run.
pub struct RemarkPipeline {
    gateway: Arc<dyn LlmGateway>,
    prompts: Arc<dyn PromptStore>,
    detector: Box<dyn StandardDetector>,
    writer: ResultWriter,
    config: AppConfig,
}

impl RemarkPipeline {
    pub fn new(gateway: Arc<dyn LlmGateway>, prompts: Arc<dyn PromptStore>, config: AppConfig) -> Self {
        Self {
            gateway,
            prompts,
            detector: Box::new(KeywordStandardDetector::new()),
            writer: ResultWriter::new(config.files.output_dir.clone()),
            config,
        }
    }

    /// Gemini gateway with the key from the environment, templates from
    /// `files.prompt_dir`. Fails early when the API key is missing.
    pub fn from_config(config: AppConfig) -> Result<Self, RemarkError> {
        let gateway = GeminiGateway::from_env(&config.api).inspect_err(|e| {
            tracing::error!(error = %e, "Cannot create LLM gateway");
        })?;
        let prompts = CachedPromptStore::new(JsonPromptStore::new(config.files.prompt_dir.clone()));
        Ok(Self::new(Arc::new(gateway), Arc::new(prompts), config))
    }

    pub fn with_detector(mut self, detector: Box<dyn StandardDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_writer(mut self, writer: ResultWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Generate remarks into `target` and return it with usage and counters.
    ///
    /// Configuration problems (missing settings or columns, no usable
    /// prompts, matching on absent columns) fail before any LLM call. A
    /// failing item gets an error marker in its cell and the run continues.
    pub fn generate(
        &self,
        source: &TabularDataset,
        mut target: TabularDataset,
        request: &RemarkRequest,
        cancel: &CancellationToken,
        progress_fn: Option<&dyn Fn(RemarkProgress)>,
    ) -> Result<RemarkOutcome, RemarkError> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        let columns = Columns::resolve(&request.source_config, &request.target_config)
            .inspect_err(|e| tracing::error!(%run_id, error = %e, "Invalid remark request"))?;
        check_columns(
            source,
            &[columns.source_clause.as_str(), columns.source_title.as_str()],
            "source",
        )
        .and_then(|_| check_columns(&target, &[columns.target_clause.as_str()], "target"))
        .inspect_err(|e| tracing::error!(%run_id, error = %e, "Invalid remark request"))?;

        if target.ensure_column(&columns.output) {
            tracing::info!(%run_id, column = %columns.output, "Created output column");
        }

        let standard = self.resolve_standard(source, request);
        tracing::info!(
            %run_id,
            standard = %standard.id,
            mode = %request.matching_mode,
            source_rows = source.len(),
            target_rows = target.len(),
            "Starting remark generation"
        );

        let matcher = create_matcher(&request.matching_mode, Some(self.gateway.clone()));
        let mappings = matcher
            .match_documents(source, &target, &columns.source_clause, &columns.target_clause)
            .inspect_err(|e| tracing::error!(%run_id, error = %e, "Matching failed"))?;
        let matching_usage = matcher.api_usage();
        tracing::info!(%run_id, matcher = matcher.name(), mappings = mappings.len(), "Matching complete");

        let usage = UsageStats::new();
        let mut stats = RunStats {
            mappings: mappings.len(),
            ..RunStats::default()
        };

        if mappings.is_empty() {
            tracing::info!(%run_id, "No matched items, nothing to generate");
            return Ok(RemarkOutcome {
                run_id,
                target,
                usage: usage.snapshot(),
                matching_usage,
                standard_id: standard.id,
                stats,
            });
        }

        let composer = PromptComposer::from_store(self.prompts.as_ref(), PromptUsage::Remark)
            .inspect_err(|e| tracing::error!(%run_id, error = %e, "Cannot load prompt templates"))?;
        if composer.select(&request.prompt_names, PromptUsage::Remark).is_empty() {
            let err = RemarkError::NoPrompts(request.prompt_names.clone());
            tracing::error!(%run_id, error = %err, "No usable prompts");
            return Err(err);
        }

        let total = mappings.len();
        let workers = self.config.api.parallel_requests.clamp(1, MAX_WORKERS).min(total);
        if let Some(f) = progress_fn {
            f(RemarkProgress::Started { total });
        }
        tracing::info!(%run_id, items = total, workers, "Generating remarks");

        let generate_one = |mapping: &MatchMapping| -> Result<String, ItemError> {
            let row = RowContext::from_row(
                source,
                mapping.source_row,
                &columns.source_clause,
                &columns.source_title,
            )
            .ok_or(ItemError::MissingSourceRow(mapping.source_row))?;
            let request_text = row.remark_request(Some(&standard));
            let prompt = composer.compose(
                &request.prompt_names,
                &PromptInputs {
                    row: Some(&row),
                    standard: Some(&standard),
                    ..PromptInputs::new(PromptUsage::Remark, &request_text)
                },
            );
            match self.gateway.call(&prompt) {
                Ok(reply) => {
                    usage.record(&prompt, &reply);
                    Ok(reply)
                }
                Err(e) => {
                    usage.record(&prompt, "");
                    Err(e.into())
                }
            }
        };

        let mut completed = 0;
        let summary = run_bounded(&mappings, workers, cancel, generate_one, |index, result| {
            let mapping = mappings[index];
            let clause = source
                .get(mapping.source_row, &columns.source_clause)
                .unwrap_or_default()
                .trim()
                .to_string();
            let cell = match result {
                Ok(reply) => {
                    stats.succeeded += 1;
                    reply
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(
                        %run_id,
                        clause = %clause,
                        target_row = mapping.target_row,
                        error = %e,
                        "Remark generation failed for item"
                    );
                    e.cell_marker()
                }
            };
            target.set(mapping.target_row, &columns.output, cell);

            completed += 1;
            if completed % PROGRESS_EVERY == 0 || completed == total {
                tracing::info!(
                    %run_id,
                    completed,
                    total,
                    percent = completed * 100 / total,
                    "Remark progress"
                );
                if let Some(f) = progress_fn {
                    f(RemarkProgress::Progress { completed, total, clause });
                }
            }
        });

        stats.submitted = summary.submitted;
        stats.abandoned = summary.submitted.saturating_sub(summary.completed);
        stats.cancelled = summary.cancelled;

        let usage = usage.snapshot();
        if stats.cancelled {
            tracing::info!(
                %run_id,
                completed = summary.completed,
                abandoned = stats.abandoned,
                "Remark generation cancelled"
            );
            if let Some(f) = progress_fn {
                f(RemarkProgress::Cancelled {
                    completed: summary.completed,
                    total,
                });
            }
        } else {
            tracing::info!(
                %run_id,
                succeeded = stats.succeeded,
                failed = stats.failed,
                calls = usage.calls,
                approx_tokens = usage.approx_tokens,
                duration_ms = start.elapsed().as_millis() as u64,
                "Remark generation complete"
            );
            if let Some(f) = progress_fn {
                f(RemarkProgress::Completed {
                    succeeded: stats.succeeded,
                    failed: stats.failed,
                });
            }
        }

        Ok(RemarkOutcome {
            run_id,
            target,
            usage,
            matching_usage,
            standard_id: standard.id,
            stats,
        })
    }

    /// `generate`, then save the target through the result writer.
    pub fn run(
        &self,
        source: &TabularDataset,
        target: TabularDataset,
        request: &RemarkRequest,
        cancel: &CancellationToken,
        progress_fn: Option<&dyn Fn(RemarkProgress)>,
    ) -> Result<RemarkRunReport, RemarkError> {
        let outcome = self.generate(source, target, request, cancel, progress_fn)?;
        let output_path = self
            .writer
            .save(&outcome.target, request.target_hint.as_deref())?;

        Ok(RemarkRunReport {
            run_id: outcome.run_id,
            output_path,
            usage: outcome.usage,
            matching_usage: outcome.matching_usage,
            standard_id: outcome.standard_id,
            stats: outcome.stats,
        })
    }

    /// `run` on two files. Unset column settings are guessed from the
    /// headers. The review sheet's file name is the detection hint and the
    /// target's path names the output file, unless the request already sets
    /// them.
    pub fn run_files(
        &self,
        source_path: &Path,
        sheet: Option<&str>,
        target_path: &Path,
        request: &RemarkRequest,
        cancel: &CancellationToken,
        progress_fn: Option<&dyn Fn(RemarkProgress)>,
    ) -> Result<RemarkRunReport, RemarkError> {
        let source = parser_for_path(source_path, sheet)
            .inspect_err(|e| tracing::error!(path = %source_path.display(), error = %e, "Cannot load review sheet"))?;
        let target = parser_for_path(target_path, None)
            .inspect_err(|e| tracing::error!(path = %target_path.display(), error = %e, "Cannot load target document"))?;
        tracing::debug!(
            source_tokens = source.estimate_tokens(),
            target_tokens = target.estimate_tokens(),
            "Documents loaded"
        );

        let mut request = request.clone();
        request.fill_missing_columns(source.dataset(), target.dataset());
        if request.source_hint.is_none() {
            request.source_hint = source_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string);
        }
        if request.target_hint.is_none() {
            request.target_hint = Some(target_path.to_path_buf());
        }

        self.run(source.dataset(), target.dataset().clone(), &request, cancel, progress_fn)
    }

    fn resolve_standard(&self, source: &TabularDataset, request: &RemarkRequest) -> StandardInfo {
        let id = match request.standard_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ if !self.config.standards.auto_detect => UNKNOWN_STANDARD_ID.to_string(),
            _ => self
                .detector
                .detect(source, request.source_hint.as_deref())
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Standard detection failed, continuing without standard");
                    UNKNOWN_STANDARD_ID.to_string()
                }),
        };
        self.detector.info(&id)
    }
}

fn check_columns(dataset: &TabularDataset, required: &[&str], side: &'static str) -> Result<(), RemarkError> {
    match required.iter().find(|c| !dataset.has_column(c)) {
        Some(column) => Err(RemarkError::MissingColumn {
            side,
            column: column.to_string(),
        }),
        None => Ok(()),
    }
}
