use crate::models::{StandardInfo, TabularDataset};

/// Semantic grouping of source columns, detected from column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCategory {
    Item,
    Content,
    Review,
    Reference,
}

impl ContextCategory {
    pub const ALL: [ContextCategory; 4] = [Self::Item, Self::Content, Self::Review, Self::Reference];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Item => "Item information",
            Self::Content => "Content information",
            Self::Review => "Review information",
            Self::Reference => "Reference information",
        }
    }

    /// Lower-case substrings that put a column in this category. Review
    /// sheets are often Korean, so both vocabularies are listed.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Item => &["clause", "no", "item", "번호", "항목", "조항"],
            Self::Content => &["title", "제목", "name", "description", "내용", "요구사항"],
            Self::Review => &["review", "검토", "remark", "비고", "의견", "결과"],
            Self::Reference => &["reference", "참고", "note", "비고"],
        }
    }

    /// A column may fall into several categories.
    pub fn matches(&self, column: &str) -> bool {
        let lower = column.to_lowercase();
        self.keywords().iter().any(|k| lower.contains(k))
    }
}

/// Contextual data of one source row, handed to the prompt composer.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub clause: String,
    pub title: String,
    /// Non-empty `(column, value)` pairs in column order.
    pub fields: Vec<(String, String)>,
}

impl RowContext {
    /// Context of `row`, or `None` if the row does not exist.
    pub fn from_row(
        dataset: &TabularDataset,
        row: usize,
        clause_col: &str,
        title_col: &str,
    ) -> Option<Self> {
        let cells = dataset.row(row)?;
        let cell = |column: &str| dataset.get(row, column).unwrap_or("").trim().to_string();
        Some(Self {
            clause: cell(clause_col),
            title: cell(title_col),
            fields: cells
                .into_iter()
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(column, value)| (column.to_string(), value.trim().to_string()))
                .collect(),
        })
    }

    /// Value substituted for a `{token}` placeholder.
    pub fn placeholder(&self, token: &str) -> Option<&str> {
        match token {
            "clause" => Some(&self.clause),
            "title" => Some(&self.title),
            _ => self
                .fields
                .iter()
                .find(|(column, _)| column == token)
                .map(|(_, value)| value.as_str()),
        }
    }

    /// Fields grouped by category, empty categories omitted.
    pub fn grouped(&self) -> Vec<(ContextCategory, Vec<&(String, String)>)> {
        ContextCategory::ALL
            .iter()
            .filter_map(|category| {
                let fields: Vec<_> = self
                    .fields
                    .iter()
                    .filter(|(column, _)| category.matches(column))
                    .collect();
                (!fields.is_empty()).then_some((*category, fields))
            })
            .collect()
    }

    /// Grouped fields rendered as markdown sections.
    pub fn render(&self) -> String {
        self.grouped()
            .into_iter()
            .map(|(category, fields)| {
                let mut section = format!("## {}", category.label());
                for (column, value) in fields {
                    section.push_str(&format!("\n{column}: {value}"));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Task text asking for a review remark on this row.
    pub fn remark_request(&self, standard: Option<&StandardInfo>) -> String {
        let mut request = format!("Item: {}, Title: {}", self.clause, self.title);
        if let Some(std) = standard.filter(|s| !s.is_unknown()) {
            request.push_str(&format!("\nStandard: {}", std.title));
        }
        request.push_str("\n\nWrite a review remark for the item above.");
        request
    }
}
