use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::row_context::RowContext;
use super::store::{PromptStore, PromptStoreError};
use crate::models::{PromptTemplate, PromptUsage, StandardInfo};

/// Instruction used when no named template is selected.
pub const DEFAULT_INSTRUCTION: &str = "You are an expert reviewer of technical compliance documents. \
Answer precisely and concisely, and ground every statement in the information provided.";

/// Additional context placed under its own header, e.g. a chat history excerpt.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSection {
    pub title: String,
    pub body: String,
}

impl ContextSection {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Everything a single prompt is assembled from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub usage: PromptUsage,
    pub row: Option<&'a RowContext>,
    pub standard: Option<&'a StandardInfo>,
    pub extras: &'a [ContextSection],
    pub user_input: &'a str,
}

impl<'a> PromptInputs<'a> {
    pub fn new(usage: PromptUsage, user_input: &'a str) -> Self {
        Self {
            usage,
            row: None,
            standard: None,
            extras: &[],
            user_input,
        }
    }
}

/// Combines prioritized templates and contextual data into one prompt.
///
/// Section order: templates by ascending priority (earlier ones take
/// precedence), standard information, extra sections, row context, and
/// finally the user input.
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    templates: Vec<PromptTemplate>,
}

impl PromptComposer {
    pub fn new(templates: Vec<PromptTemplate>) -> Self {
        Self { templates }
    }

    /// Load the templates for `usage` from `store`.
    pub fn from_store(store: &dyn PromptStore, usage: PromptUsage) -> Result<Self, PromptStoreError> {
        Ok(Self::new(store.load_by_usage(usage)?))
    }

    /// Templates named in `names` that apply to `usage`, sorted by priority.
    /// Ties keep discovery order.
    pub fn select(&self, names: &[String], usage: PromptUsage) -> Vec<&PromptTemplate> {
        let mut selected: Vec<&PromptTemplate> = self
            .templates
            .iter()
            .filter(|t| t.applies_to(usage) && names.iter().any(|n| n == &t.name))
            .collect();
        selected.sort_by_key(|t| t.priority);
        selected
    }

    /// Names of templates available for `usage`.
    pub fn available(&self, usage: PromptUsage) -> Vec<&str> {
        self.templates
            .iter()
            .filter(|t| t.applies_to(usage))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn compose(&self, names: &[String], inputs: &PromptInputs<'_>) -> String {
        let mut sections: Vec<String> = Vec::new();

        let selected = self.select(names, inputs.usage);
        if selected.is_empty() {
            sections.push(format!("# Instructions\n{DEFAULT_INSTRUCTION}"));
        }
        for (i, template) in selected.iter().enumerate() {
            let text = substitute(&template.template, inputs.row, inputs.standard);
            if text.trim().is_empty() {
                continue;
            }
            sections.push(format!(
                "# {} instructions (priority: {}, applied {})\n{}",
                template.name,
                template.priority,
                ordinal(i + 1),
                text
            ));
        }

        if let Some(standard) = inputs.standard.filter(|s| !s.is_unknown()) {
            sections.push(standard_block(standard, inputs.usage));
        }

        for extra in inputs.extras {
            sections.push(format!("# {}\n{}", extra.title, extra.body));
        }

        if let Some(row) = inputs.row {
            let rendered = row.render();
            if !rendered.is_empty() {
                sections.push(format!("# Related information\n{rendered}"));
            }
        }

        sections.push(format!("# User input\n{}", inputs.user_input));
        sections.join("\n\n")
    }
}

fn standard_block(standard: &StandardInfo, usage: PromptUsage) -> String {
    let mut block = String::from("# Standard information\n");
    block.push_str(&format!("- Title: {}\n", standard.title));
    block.push_str(&format!("- Description: {}\n", standard.description));
    block.push_str(&format!("- Scope: {}\n", standard.scope));
    block.push_str(&format!("- Key sections: {}\n\n", standard.key_sections.join(", ")));
    match usage {
        PromptUsage::Remark => block.push_str(
            "Write the review remark against this standard and base it on its requirements.",
        ),
        PromptUsage::Chat => {
            block.push_str("Answer in the context of this standard where it applies.")
        }
    }
    block
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}\n]+)\}").unwrap());

/// Replace `{clause}`, `{title}`, `{standard}` and `{<column>}` tokens.
/// Unknown tokens stay as written.
fn substitute<'t>(
    text: &'t str,
    row: Option<&RowContext>,
    standard: Option<&StandardInfo>,
) -> Cow<'t, str> {
    PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let token = caps[1].trim();
        let value = match token {
            "standard" => standard.map(|s| s.title.as_str()),
            _ => row.and_then(|r| r.placeholder(token)),
        };
        value.map_or_else(|| caps[0].to_string(), str::to_string)
    })
}

/// `1st`, `2nd`, `3rd`, `4th`, `11th`, `21st`, …
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TabularDataset;

    fn composer() -> PromptComposer {
        PromptComposer::new(vec![
            PromptTemplate::new("Tone", "Keep it short.", 5, &[PromptUsage::Remark, PromptUsage::Chat]),
            PromptTemplate::new("Basis", "Cite clause {clause} of {standard}.", 1, &[PromptUsage::Remark]),
            PromptTemplate::new("Format", "Use bullet points.", 5, &[PromptUsage::Remark]),
            PromptTemplate::new("Greeting", "Be friendly.", 0, &[PromptUsage::Chat]),
        ])
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn row() -> RowContext {
        let ds = TabularDataset::from_records(vec![vec![
            ("clause", "4.1"),
            ("title", "Scope"),
            ("remark", "previous remark"),
        ]]);
        RowContext::from_row(&ds, 0, "clause", "title").unwrap()
    }

    fn iec() -> StandardInfo {
        StandardInfo {
            id: "IEC_60204_1".into(),
            title: "IEC 60204-1".into(),
            description: "Electrical equipment of machines".into(),
            scope: "Machinery".into(),
            key_sections: vec!["Protective bonding".into(), "Emergency stop".into()],
            version: "2016".into(),
        }
    }

    #[test]
    fn templates_sorted_by_priority_with_stable_ties() {
        let c = composer();
        let selected = c.select(&names(&["Format", "Tone", "Basis"]), PromptUsage::Remark);
        let order: Vec<_> = selected.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(order, vec!["Basis", "Tone", "Format"]);
    }

    #[test]
    fn usage_filters_templates() {
        let c = composer();
        assert!(c.select(&names(&["Greeting"]), PromptUsage::Remark).is_empty());
        assert_eq!(c.available(PromptUsage::Chat), vec!["Tone", "Greeting"]);
    }

    #[test]
    fn compose_orders_sections() {
        let c = composer();
        let row = row();
        let standard = iec();
        let extras = [ContextSection::new("Chat history", "User: hi")];
        let inputs = PromptInputs {
            row: Some(&row),
            standard: Some(&standard),
            extras: &extras,
            ..PromptInputs::new(PromptUsage::Remark, "Write a review remark.")
        };
        let prompt = c.compose(&names(&["Tone", "Basis"]), &inputs);

        let basis = prompt.find("# Basis instructions (priority: 1, applied 1st)").unwrap();
        let tone = prompt.find("# Tone instructions (priority: 5, applied 2nd)").unwrap();
        let std_block = prompt.find("# Standard information").unwrap();
        let history = prompt.find("# Chat history").unwrap();
        let related = prompt.find("# Related information").unwrap();
        let input = prompt.find("# User input\nWrite a review remark.").unwrap();
        assert!(basis < tone && tone < std_block && std_block < history);
        assert!(history < related && related < input);

        assert!(prompt.contains("Cite clause 4.1 of IEC 60204-1."));
        assert!(prompt.contains("- Key sections: Protective bonding, Emergency stop"));
        assert!(prompt.contains("## Review information\nremark: previous remark"));
    }

    #[test]
    fn unknown_standard_is_not_rendered() {
        let c = composer();
        let unknown = StandardInfo::unknown();
        let inputs = PromptInputs {
            standard: Some(&unknown),
            ..PromptInputs::new(PromptUsage::Remark, "go")
        };
        assert!(!c.compose(&names(&["Tone"]), &inputs).contains("# Standard information"));
    }

    #[test]
    fn no_selected_templates_uses_default_instruction() {
        let c = composer();
        let prompt = c.compose(&[], &PromptInputs::new(PromptUsage::Chat, "What is 4.1?"));
        assert!(prompt.starts_with("# Instructions\n"));
        assert!(prompt.contains(DEFAULT_INSTRUCTION));
        assert!(prompt.ends_with("# User input\nWhat is 4.1?"));
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let row = row();
        let out = substitute("{clause} / {missing} / {title} / {{x}}", Some(&row), None);
        assert_eq!(out, "4.1 / {missing} / Scope / {{x}}");
        assert_eq!(substitute("{standard}", None, None), "{standard}");
    }

    #[test]
    fn ordinals() {
        let got: Vec<_> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 101, 111]
            .iter()
            .map(|n| ordinal(*n))
            .collect();
        assert_eq!(
            got,
            vec!["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "101st", "111th"]
        );
    }

    #[test]
    fn compose_does_not_mutate_inputs() {
        let c = composer();
        let row = row();
        let before = row.clone();
        let inputs = PromptInputs {
            row: Some(&row),
            ..PromptInputs::new(PromptUsage::Remark, "x")
        };
        let _ = c.compose(&names(&["Basis"]), &inputs);
        assert_eq!(row, before);
    }
}
