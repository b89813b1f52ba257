use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Priority given to templates that do not declare one.
pub const DEFAULT_PRIORITY: i64 = 999;

/// Where a prompt is used. Passed explicitly by every caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptUsage {
    Remark,
    Chat,
}

impl PromptUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remark => "remark",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for PromptUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named instruction template. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(rename = "prompt_name", default)]
    pub name: String,
    #[serde(default)]
    pub template: String,
    /// Lower applies first.
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// Applicable usage types, e.g. `["remark", "chat"]`.
    #[serde(rename = "type", default, deserialize_with = "one_or_many")]
    pub usages: Vec<String>,
}

impl PromptTemplate {
    pub fn new(name: &str, template: &str, priority: i64, usages: &[PromptUsage]) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            priority,
            usages: usages.iter().map(|u| u.as_str().to_string()).collect(),
        }
    }

    pub fn applies_to(&self, usage: PromptUsage) -> bool {
        self.usages.iter().any(|u| u == usage.as_str())
    }
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

/// Accepts `"remark"`, `["remark", "chat"]` or anything else (treated as none).
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => vec![s],
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_accepts_string_or_list() {
        let single: PromptTemplate =
            serde_json::from_str(r#"{"prompt_name":"A","template":"t","type":"remark"}"#).unwrap();
        assert!(single.applies_to(PromptUsage::Remark));
        assert!(!single.applies_to(PromptUsage::Chat));

        let many: PromptTemplate =
            serde_json::from_str(r#"{"prompt_name":"B","type":["remark","chat"],"priority":2}"#)
                .unwrap();
        assert!(many.applies_to(PromptUsage::Chat));
        assert_eq!(many.priority, 2);
    }

    #[test]
    fn missing_priority_defaults_low() {
        let t: PromptTemplate = serde_json::from_str(r#"{"prompt_name":"C","type":7}"#).unwrap();
        assert_eq!(t.priority, DEFAULT_PRIORITY);
        assert!(t.usages.is_empty());
    }
}
