use serde::{Deserialize, Serialize};

/// Association of a source row with a target row.
///
/// Confidence is in `[0, 1]` and reflects the tier that produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchMapping {
    pub source_row: usize,
    pub target_row: usize,
    pub confidence: f64,
}

impl MatchMapping {
    pub fn new(source_row: usize, target_row: usize, confidence: f64) -> Self {
        Self {
            source_row,
            target_row,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Best target row for a single free-text item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemMatch {
    pub target_row: usize,
    pub confidence: f64,
}
