use super::normalize::{normalize, similarity};
use super::{require_column, DocumentMatcher, MatchingError};
use crate::models::{ItemMatch, MatchMapping, TabularDataset};

/// Confidence for a prefix-tier match.
pub const PREFIX_CONFIDENCE: f64 = 0.8;

/// Similarity scores must exceed this to be accepted.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Minimum normalized length before the similarity tier is attempted.
const MIN_SIMILARITY_LEN: usize = 3;

/// Tier that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Normalized,
    Prefix,
    Similarity,
}

/// Tiered clause-identifier matcher.
///
/// Tiers, first hit wins:
/// 1. trimmed target value equals the source value (1.0)
/// 2. normalized values are equal (1.0)
/// 3. target starts with the source minus its last `.segment` (0.8)
/// 4. best common-prefix similarity above 0.7 (the score itself)
///
/// Exact mode stops after tier 1.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicMatcher {
    exact_only: bool,
}

/// Target cell prepared once per call.
struct TargetEntry<'a> {
    row: usize,
    trimmed: &'a str,
    normalized: String,
}

impl DeterministicMatcher {
    pub fn flexible() -> Self {
        Self { exact_only: false }
    }

    pub fn exact() -> Self {
        Self { exact_only: true }
    }

    pub fn is_exact(&self) -> bool {
        self.exact_only
    }

    fn prepare<'a>(&self, target: &'a TabularDataset, column: &str) -> Vec<TargetEntry<'a>> {
        target
            .column_values(column)
            .unwrap_or_default()
            .into_iter()
            .map(|(row, value)| {
                let trimmed = value.trim();
                TargetEntry {
                    row,
                    trimmed,
                    normalized: if self.exact_only {
                        String::new()
                    } else {
                        normalize(trimmed)
                    },
                }
            })
            .collect()
    }

    /// Run the tiers for one trimmed, non-empty source value.
    fn find(&self, value: &str, targets: &[TargetEntry<'_>]) -> Option<(usize, f64, MatchTier)> {
        if let Some(t) = targets.iter().find(|t| t.trimmed == value) {
            return Some((t.row, 1.0, MatchTier::Exact));
        }
        if self.exact_only {
            return None;
        }

        let normalized = normalize(value);
        if normalized.is_empty() {
            return None;
        }

        if let Some(t) = targets.iter().find(|t| t.normalized == normalized) {
            return Some((t.row, 1.0, MatchTier::Normalized));
        }

        if let Some((prefix, _)) = normalized.rsplit_once('.') {
            if !prefix.is_empty() {
                if let Some(t) = targets.iter().find(|t| t.normalized.starts_with(prefix)) {
                    return Some((t.row, PREFIX_CONFIDENCE, MatchTier::Prefix));
                }
            }
        }

        if normalized.chars().count() >= MIN_SIMILARITY_LEN {
            let mut best: Option<(usize, f64)> = None;
            for t in targets {
                let score = similarity(&normalized, &t.normalized);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((t.row, score));
                }
            }
            if let Some((row, score)) = best {
                if score > SIMILARITY_THRESHOLD {
                    return Some((row, score, MatchTier::Similarity));
                }
            }
        }

        None
    }
}

impl DocumentMatcher for DeterministicMatcher {
    fn match_documents(
        &self,
        source: &TabularDataset,
        target: &TabularDataset,
        source_col: &str,
        target_col: &str,
    ) -> Result<Vec<MatchMapping>, MatchingError> {
        require_column(source, source_col, "source")?;
        require_column(target, target_col, "target")?;

        let targets = self.prepare(target, target_col);
        let mut mappings = Vec::new();

        for (row, raw) in source.column_values(source_col).unwrap_or_default() {
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }
            match self.find(value, &targets) {
                Some((target_row, confidence, tier)) => {
                    tracing::trace!(clause = value, source_row = row, target_row, ?tier, "Matched");
                    mappings.push(MatchMapping::new(row, target_row, confidence));
                }
                None => tracing::trace!(clause = value, source_row = row, "No match"),
            }
        }

        tracing::debug!(
            matcher = self.name(),
            source_rows = source.len(),
            mappings = mappings.len(),
            "Deterministic matching complete"
        );
        Ok(mappings)
    }

    fn match_item(
        &self,
        item: &str,
        target: &TabularDataset,
        target_col: &str,
    ) -> Result<Option<ItemMatch>, MatchingError> {
        require_column(target, target_col, "target")?;

        let value = item.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let targets = self.prepare(target, target_col);
        Ok(self
            .find(value, &targets)
            .map(|(target_row, confidence, _)| ItemMatch {
                target_row,
                confidence,
            }))
    }

    fn name(&self) -> &'static str {
        if self.exact_only {
            "exact"
        } else {
            "flexible"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(column: &str, values: &[&str]) -> TabularDataset {
        TabularDataset::from_records(values.iter().map(|v| vec![(column, *v)]))
    }

    #[test]
    fn exact_tier_beats_earlier_normalized_candidate() {
        let source = dataset("clause", &["4.1"]);
        let target = dataset("clause", &["(4.1)", " 4.1 "]);
        let mappings = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, vec![MatchMapping::new(0, 1, 1.0)]);
    }

    #[test]
    fn normalized_tier_ignores_case_and_punctuation() {
        let source = dataset("clause", &["Clause 5.3"]);
        let target = dataset("clause", &["5.2", "clause-5.3"]);
        let mappings = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, vec![MatchMapping::new(0, 1, 1.0)]);
    }

    #[test]
    fn prefix_tier_matches_parent_clause() {
        let source = dataset("clause", &["8.2.1"]);
        let target = dataset("clause", &["7.1", "8.2"]);
        let mappings = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, vec![MatchMapping::new(0, 1, PREFIX_CONFIDENCE)]);
    }

    #[test]
    fn similarity_tier_reports_literal_score() {
        let source = dataset("clause", &["abcdefgh"]);
        let target = dataset("clause", &["zzz", "abcdefgx"]);
        let mappings = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].target_row, 1);
        assert!((mappings[0].confidence - 0.875).abs() < 1e-9);
    }

    #[test]
    fn similarity_below_threshold_produces_nothing() {
        let source = dataset("clause", &["abcdefgh", "ab"]);
        let target = dataset("clause", &["abcdxxxx", "abzz"]);
        let mappings = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert!(mappings.is_empty());
    }

    #[test]
    fn exact_mode_skips_fuzzy_tiers() {
        let source = dataset("clause", &["8.2.1", "4.1"]);
        let target = dataset("clause", &["8.2", "4.1"]);
        let mappings = DeterministicMatcher::exact()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, vec![MatchMapping::new(1, 1, 1.0)]);
    }

    #[test]
    fn empty_source_values_are_skipped() {
        let source = dataset("clause", &["", "   ", "4.1"]);
        let target = dataset("clause", &["", "4.1"]);
        let mappings = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "clause", "clause")
            .unwrap();
        assert_eq!(mappings, vec![MatchMapping::new(2, 1, 1.0)]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let source = dataset("clause", &["4.1"]);
        let target = dataset("clause", &["4.1"]);
        let err = DeterministicMatcher::flexible()
            .match_documents(&source, &target, "item", "clause")
            .unwrap_err();
        assert_eq!(
            err,
            MatchingError::MissingColumn {
                side: "source",
                column: "item".into()
            }
        );
    }

    #[test]
    fn match_item_uses_the_same_tiers() {
        let target = dataset("clause", &["6.1", "8.2"]);
        let matcher = DeterministicMatcher::flexible();
        let hit = matcher.match_item("8.2.4", &target, "clause").unwrap();
        assert_eq!(
            hit,
            Some(ItemMatch {
                target_row: 1,
                confidence: PREFIX_CONFIDENCE
            })
        );
        assert_eq!(matcher.match_item("  ", &target, "clause").unwrap(), None);
        assert!(matcher.match_item("6.1", &target, "missing").is_err());
    }
}
