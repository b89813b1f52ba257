use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::deterministic::DeterministicMatcher;
use super::{require_column, DocumentMatcher, MatchingError};
use crate::models::{ItemMatch, MatchMapping, TabularDataset};
use crate::pipeline::gateway::{GatewayError, LlmGateway, UsageSnapshot, UsageStats};
use crate::pipeline::json_block::{parse_json_block, JsonBlockError, JsonShape};

/// Most target items listed in one prompt.
pub const TARGET_LIST_CAP: usize = 100;
/// Character budget for the joined target list before it is cut further.
pub const TARGET_TEXT_LIMIT: usize = 5000;
/// Target items kept when the list exceeds `TARGET_TEXT_LIMIT`.
pub const TARGET_TRUNCATED_LEN: usize = 50;
/// Source items per prompt.
pub const SOURCE_BATCH_SIZE: usize = 50;
/// Candidates listed for a single-item lookup.
pub const ITEM_CANDIDATE_CAP: usize = 50;

/// Internal failure of a model-assisted attempt. Never leaves this module:
/// every variant triggers the deterministic fallback.
#[derive(Error, Debug)]
enum AttemptError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Json(#[from] JsonBlockError),
    #[error(transparent)]
    Matching(#[from] MatchingError),
}

/// Model-assisted matcher.
///
/// Lists both columns as numbered items, asks the model for a JSON array of
/// `{source_index, target_index, confidence}`, and maps the 1-based display
/// numbers back to dataset rows. Any failure returns exactly what the
/// flexible deterministic matcher returns for the same input.
pub struct LlmMatcher {
    gateway: Arc<dyn LlmGateway>,
    fallback: DeterministicMatcher,
    usage: UsageStats,
}

/// A non-empty cell offered to the model. Its display number is its
/// position in the list plus one.
#[derive(Debug, Clone, Copy)]
struct ListedItem<'a> {
    row: usize,
    text: &'a str,
}

/// One entry of a model reply. Fields are read leniently: whole numbers
/// and numeric strings are accepted, anything else reads as absent.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawMapping {
    source_index: Option<i64>,
    target_index: Option<i64>,
    confidence: Option<f64>,
}

impl RawMapping {
    fn from_value(entry: &Value) -> Self {
        Self {
            source_index: entry.get("source_index").and_then(index_value),
            target_index: entry.get("target_index").and_then(index_value),
            confidence: entry.get("confidence").and_then(number_value),
        }
    }
}

impl LlmMatcher {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            fallback: DeterministicMatcher::flexible(),
            usage: UsageStats::new(),
        }
    }

    fn call(&self, prompt: &str) -> Result<String, GatewayError> {
        match self.gateway.call(prompt) {
            Ok(response) => {
                self.usage.record(prompt, &response);
                Ok(response)
            }
            Err(e) => {
                self.usage.record(prompt, "");
                Err(e)
            }
        }
    }

    fn try_match_documents(
        &self,
        source: &TabularDataset,
        target: &TabularDataset,
        source_col: &str,
        target_col: &str,
    ) -> Result<Vec<MatchMapping>, AttemptError> {
        require_column(source, source_col, "source")?;
        require_column(target, target_col, "target")?;

        let sources = listed_items(source, source_col);
        let targets = bounded_targets(listed_items(target, target_col));
        if sources.is_empty() || targets.is_empty() {
            return Ok(Vec::new());
        }

        let target_text = render_list(&targets);
        let mut mappings = Vec::new();
        let mut seen = HashSet::new();

        for (batch_no, batch) in sources.chunks(SOURCE_BATCH_SIZE).enumerate() {
            let prompt = build_batch_prompt(&render_list(batch), &target_text);
            let response = self.call(&prompt)?;
            let raw: Vec<Value> = parse_json_block(&response, JsonShape::Array)?;

            let before = mappings.len();
            for value in &raw {
                let entry = RawMapping::from_value(value);
                let (Some(src), Some(tgt)) = (
                    resolve(batch, entry.source_index),
                    resolve(&targets, entry.target_index),
                ) else {
                    tracing::debug!(entry = %value, "Discarding unusable match entry");
                    continue;
                };
                if seen.insert(src.row) {
                    mappings.push(MatchMapping::new(
                        src.row,
                        tgt.row,
                        entry.confidence.unwrap_or(0.0),
                    ));
                }
            }
            tracing::debug!(
                batch = batch_no + 1,
                items = batch.len(),
                matches = mappings.len() - before,
                "LLM matching batch complete"
            );
        }

        Ok(mappings)
    }

    fn try_match_item(
        &self,
        item: &str,
        target: &TabularDataset,
        target_col: &str,
    ) -> Result<Option<ItemMatch>, AttemptError> {
        require_column(target, target_col, "target")?;

        let mut candidates = listed_items(target, target_col);
        candidates.truncate(ITEM_CANDIDATE_CAP);
        if candidates.is_empty() || item.trim().is_empty() {
            return Ok(None);
        }

        let prompt = build_item_prompt(item.trim(), &render_list(&candidates));
        let response = self.call(&prompt)?;
        let raw = RawMapping::from_value(&parse_json_block::<Value>(&response, JsonShape::Object)?);

        let confidence = raw.confidence.unwrap_or(0.0);
        if confidence <= 0.0 {
            return Ok(None);
        }
        Ok(resolve(&candidates, raw.target_index).map(|hit| ItemMatch {
            target_row: hit.row,
            confidence: confidence.clamp(0.0, 1.0),
        }))
    }
}

impl DocumentMatcher for LlmMatcher {
    fn match_documents(
        &self,
        source: &TabularDataset,
        target: &TabularDataset,
        source_col: &str,
        target_col: &str,
    ) -> Result<Vec<MatchMapping>, MatchingError> {
        self.usage.reset();
        match self.try_match_documents(source, target, source_col, target_col) {
            Ok(mappings) => {
                let usage = self.usage.snapshot();
                tracing::info!(
                    model = self.gateway.model_name(),
                    mappings = mappings.len(),
                    calls = usage.calls,
                    approx_tokens = usage.approx_tokens,
                    "LLM matching complete"
                );
                Ok(mappings)
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM matching failed, using deterministic matcher");
                self.fallback
                    .match_documents(source, target, source_col, target_col)
            }
        }
    }

    fn match_item(
        &self,
        item: &str,
        target: &TabularDataset,
        target_col: &str,
    ) -> Result<Option<ItemMatch>, MatchingError> {
        match self.try_match_item(item, target, target_col) {
            Ok(hit) => Ok(hit),
            Err(e) => {
                tracing::warn!(error = %e, "LLM item matching failed, using deterministic matcher");
                self.fallback.match_item(item, target, target_col)
            }
        }
    }

    fn api_usage(&self) -> Option<UsageSnapshot> {
        Some(self.usage.snapshot())
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

fn listed_items<'a>(dataset: &'a TabularDataset, column: &str) -> Vec<ListedItem<'a>> {
    dataset
        .column_values(column)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(row, value)| {
            let text = value.trim();
            (!text.is_empty()).then_some(ListedItem { row, text })
        })
        .collect()
}

/// Cap the target list, cutting it further when the text gets too long.
fn bounded_targets(mut items: Vec<ListedItem<'_>>) -> Vec<ListedItem<'_>> {
    items.truncate(TARGET_LIST_CAP);
    let text_len: usize = items.iter().map(|i| i.text.chars().count() + 1).sum();
    if text_len > TARGET_TEXT_LIMIT {
        tracing::debug!(
            text_len,
            kept = TARGET_TRUNCATED_LEN,
            "Target list too long, truncating"
        );
        items.truncate(TARGET_TRUNCATED_LEN);
    }
    items
}

fn render_list(items: &[ListedItem<'_>]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Display number from a JSON number or numeric string. Fractions are rejected.
fn index_value(value: &Value) -> Option<i64> {
    let n = number_value(value)?;
    (n.fract() == 0.0 && n.abs() < i64::MAX as f64).then_some(n as i64)
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Item for a 1-based display number, if in range.
fn resolve<'l, 'a>(items: &'l [ListedItem<'a>], display: Option<i64>) -> Option<&'l ListedItem<'a>> {
    let display = usize::try_from(display?).ok()?;
    items.get(display.checked_sub(1)?)
}

fn build_batch_prompt(source_list: &str, target_list: &str) -> String {
    format!(
        "Match the items of Document A to the items of Document B. \
Items are clause identifiers or short clause titles; match items that refer to the same clause.\n\n\
Document A:\n{source_list}\n\n\
Document B:\n{target_list}\n\n\
Return only a JSON array using the item numbers shown above, for example:\n\
[\n  {{\"source_index\": 1, \"target_index\": 5, \"confidence\": 0.95}},\n  \
{{\"source_index\": 2, \"target_index\": 3, \"confidence\": 0.8}}\n]\n\
Leave out items of Document A that have no counterpart."
    )
}

fn build_item_prompt(item: &str, candidates: &str) -> String {
    format!(
        "Find the entry in the list that best matches this item.\n\n\
Item: {item}\n\n\
Candidates:\n{candidates}\n\n\
Return only a JSON object using the candidate number shown above:\n\
{{\"target_index\": 5, \"target_item\": \"closest candidate\", \"confidence\": 0.95}}\n\
If nothing matches, set confidence to 0."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::MockGateway;

    fn dataset(column: &str, values: &[&str]) -> TabularDataset {
        TabularDataset::from_records(values.iter().map(|v| vec![(column, *v)]))
    }

    fn matcher(gateway: MockGateway) -> (Arc<MockGateway>, LlmMatcher) {
        let gateway = Arc::new(gateway);
        let matcher = LlmMatcher::new(gateway.clone());
        (gateway, matcher)
    }

    #[test]
    fn display_numbers_map_back_to_rows() {
        // Empty rows are not listed, so display numbers differ from rows.
        let source = dataset("clause", &["", "4.1", "4.2"]);
        let target = dataset("clause", &["4.2", "", "4.1"]);
        let (_, matcher) = matcher(MockGateway::new(
            "Sure! Here you go:\n```json\n[{\"source_index\": 1, \"target_index\": 2, \"confidence\": 0.9},\
             {\"source_index\": 2, \"target_index\": 1, \"confidence\": 0.85}]\n```",
        ));

        let mappings = matcher
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(
            mappings,
            vec![MatchMapping::new(1, 2, 0.9), MatchMapping::new(2, 0, 0.85)]
        );
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let source = dataset("clause", &["4.1", "4.2", "4.3", "4.4"]);
        let target = dataset("clause", &["4.2", "4.1", "4.3", "4.4"]);
        let (gateway, matcher) = matcher(MockGateway::new(
            r#"[{"source_index": 1, "target_index": 2, "confidence": 0.9},
                {"source_index": "2", "target_index": 1, "confidence": "0.8"},
                {"source_index": 3.0, "target_index": 3, "confidence": 0.7},
                {"source_index": "four", "target_index": 4, "confidence": 0.6},
                {"source_index": 4, "target_index": 1.5},
                "not an object"]"#,
        ));

        let mappings = matcher
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(
            mappings,
            vec![
                MatchMapping::new(0, 1, 0.9),
                MatchMapping::new(1, 0, 0.8),
                MatchMapping::new(2, 2, 0.7),
            ]
        );
        // Confidences come from the reply, so no fallback happened.
        assert_eq!(gateway.call_count(), 1);
    }

    #[test]
    fn match_item_accepts_numeric_strings() {
        let target = dataset("clause", &["4.1", "4.2"]);
        let (_, matcher) = matcher(MockGateway::new(
            r#"{"target_index": "2", "target_item": "4.2", "confidence": 0.9}"#,
        ));
        let hit = matcher.match_item("4.2", &target, "clause").unwrap().unwrap();
        assert_eq!(hit.target_row, 1);
    }

    #[test]
    fn out_of_range_indices_are_discarded() {
        let source = dataset("clause", &["4.1"]);
        let target = dataset("clause", &["4.1"]);
        let (_, matcher) = matcher(MockGateway::new(
            r#"[{"source_index": 0, "target_index": 1, "confidence": 1.0},
                {"source_index": 1, "target_index": 7, "confidence": 1.0},
                {"source_index": 1, "target_index": 1, "confidence": 0.7}]"#,
        ));
        let mappings = matcher
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, vec![MatchMapping::new(0, 0, 0.7)]);
    }

    #[test]
    fn gateway_failure_falls_back_to_deterministic() {
        let source = dataset("clause", &["4.1", "8.2.1", "zz"]);
        let target = dataset("clause", &["8.2", "4.1"]);
        let (gateway, matcher) =
            matcher(MockGateway::failing(GatewayError::Http("connection refused".into())));

        let expected = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        let mappings = matcher
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, expected);
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(matcher.api_usage().unwrap().calls, 1);
    }

    #[test]
    fn unparsable_response_falls_back_to_deterministic() {
        let source = dataset("clause", &["4.1", "5.3"]);
        let target = dataset("clause", &["5.3", "4.1"]);
        let (_, matcher) = matcher(MockGateway::new("I could not find any matches."));

        let expected = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(
            matcher
                .match_documents(&source, &target, "clause", "clause")
                .unwrap(),
            expected
        );
    }

    #[test]
    fn missing_column_surfaces_deterministic_error() {
        let source = dataset("clause", &["4.1"]);
        let target = dataset("clause", &["4.1"]);
        let (gateway, matcher) = matcher(MockGateway::new("[]"));
        assert!(matches!(
            matcher.match_documents(&source, &target, "clause", "nope"),
            Err(MatchingError::MissingColumn { side: "target", .. })
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[test]
    fn large_source_lists_are_batched() {
        let values: Vec<String> = (1..=120).map(|i| format!("{i}.1")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let source = dataset("clause", &refs);
        let target = dataset("clause", &["1.1"]);
        let (gateway, matcher) = matcher(MockGateway::new("[]"));

        let mappings = matcher
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert!(mappings.is_empty());
        assert_eq!(gateway.call_count(), 3);
        let prompts = gateway.prompts();
        assert!(prompts[2].contains("20. 120.1"));
        assert!(!prompts[2].contains("21. "));
    }

    #[test]
    fn long_target_lists_are_truncated() {
        let long: Vec<String> = (1..=150)
            .map(|i| format!("{i} {}", "requirement text ".repeat(5)))
            .collect();
        let refs: Vec<&str> = long.iter().map(String::as_str).collect();
        let source = dataset("clause", &["1"]);
        let target = dataset("clause", &refs);
        let (gateway, matcher) = matcher(MockGateway::new("[]"));

        matcher
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        let prompt = &gateway.prompts()[0];
        assert!(prompt.contains("\n50. 50 requirement"));
        assert!(!prompt.contains("\n51. 51 requirement"));
    }

    #[test]
    fn usage_is_reset_per_call_and_weighted() {
        let source = dataset("clause", &["4.1"]);
        let target = dataset("clause", &["4.1"]);
        let response = r#"[{"source_index": 1, "target_index": 1, "confidence": 1.0}]"#;
        let (gateway, matcher) = matcher(MockGateway::new(response));

        matcher.match_documents(&source, &target, "clause", "clause").unwrap();
        matcher.match_documents(&source, &target, "clause", "clause").unwrap();

        let prompt = &gateway.prompts()[1];
        let expected = prompt.split_whitespace().count() as f64
            + 1.5 * response.split_whitespace().count() as f64;
        let usage = matcher.api_usage().unwrap();
        assert_eq!(usage.calls, 1);
        assert!((usage.approx_tokens - expected).abs() < 1e-9);
    }

    #[test]
    fn match_item_parses_object_reply() {
        let target = dataset("clause", &["", "Scope", "Terms and definitions"]);
        let (gateway, matcher) = matcher(MockGateway::new(
            r#"Best match: {"target_index": 2, "target_item": "Terms and definitions", "confidence": 0.9}"#,
        ));
        let hit = matcher.match_item("Definitions", &target, "clause").unwrap();
        assert_eq!(
            hit,
            Some(ItemMatch {
                target_row: 2,
                confidence: 0.9
            })
        );
        assert!(gateway.prompts()[0].contains("Item: Definitions"));
    }

    #[test]
    fn match_item_zero_confidence_is_no_match() {
        let target = dataset("clause", &["Scope"]);
        let (_, matcher) = matcher(MockGateway::new(
            r#"{"target_index": 1, "target_item": "Scope", "confidence": 0}"#,
        ));
        assert_eq!(matcher.match_item("Annex", &target, "clause").unwrap(), None);
    }

    #[test]
    fn match_item_failure_falls_back() {
        let target = dataset("clause", &["6.1", "8.2"]);
        let (_, matcher) = matcher(MockGateway::new("no json"));
        let hit = matcher.match_item("8.2", &target, "clause").unwrap();
        assert_eq!(
            hit,
            Some(ItemMatch {
                target_row: 1,
                confidence: 1.0
            })
        );
    }
}
