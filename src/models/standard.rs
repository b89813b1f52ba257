use serde::{Deserialize, Serialize};

/// Identifier of the "no standard detected" sentinel.
pub const UNKNOWN_STANDARD_ID: &str = "UNKNOWN";

/// Classification tag attached to a generation run. Only decorates the
/// prompt; never required for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub scope: String,
    pub key_sections: Vec<String>,
    pub version: String,
}

impl StandardInfo {
    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_STANDARD_ID.to_string(),
            title: "Unidentified standard".to_string(),
            description: "No standard was detected automatically".to_string(),
            scope: "Unknown".to_string(),
            key_sections: Vec::new(),
            version: "N/A".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_STANDARD_ID
    }
}
