use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Column role keywords, most specific first.
const CLAUSE_KEYWORDS: &[&str] = &[
    "clause", "항목", "조항", "id", "no", "번호", "item", "subclause", "paragraph",
];
const TITLE_KEYWORDS: &[&str] = &[
    "title", "제목", "name", "내용", "description", "항목명", "requirement", "요구사항",
];
const REMARK_KEYWORDS: &[&str] = &[
    "remark", "comment", "의견", "비고", "결과", "검토의견", "검토결과", "review", "note",
];

/// Header like `8.2 Safety functions`.
static CLAUSE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d+").unwrap());

/// Guessed column roles of a sheet. Each column gets at most one role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedColumns {
    pub clause: Option<String>,
    pub title: Option<String>,
    pub remark: Option<String>,
}

/// Guess which columns hold the clause id, the title and the remark.
///
/// Per role, each keyword is tried as an exact (case-insensitive) header
/// first, then as a substring. Two-letter keywords such as `id` and `no`
/// only match exactly. Without a keyword hit the clause column falls back
/// to a numbering header, then a header containing a clause number, then
/// (with three or more columns) the first column; the title then defaults
/// to the column after the clause.
pub fn detect_columns(columns: &[String]) -> DetectedColumns {
    let lower: Vec<String> = columns.iter().map(|c| c.trim().to_lowercase()).collect();
    let mut taken = vec![false; columns.len()];

    let mut clause = claim(&lower, &mut taken, CLAUSE_KEYWORDS);
    let mut title = claim(&lower, &mut taken, TITLE_KEYWORDS);
    let remark = claim(&lower, &mut taken, REMARK_KEYWORDS);

    if clause.is_none() {
        clause = free(&lower, &taken, |c| c.contains("번호") || c.contains("no.") || c.starts_with("no "))
            .or_else(|| free(&lower, &taken, |c| CLAUSE_NUMBER.is_match(c)))
            .or_else(|| (columns.len() >= 3 && !taken[0]).then_some(0));
        if let Some(idx) = clause {
            taken[idx] = true;
        }
    }
    if title.is_none() && columns.len() >= 3 {
        title = clause
            .map(|idx| idx + 1)
            .filter(|&idx| idx < columns.len() && !taken[idx]);
    }

    let detected = DetectedColumns {
        clause: clause.map(|i| columns[i].clone()),
        title: title.map(|i| columns[i].clone()),
        remark: remark.map(|i| columns[i].clone()),
    };
    tracing::debug!(?detected, "Detected column roles");
    detected
}

fn claim(lower: &[String], taken: &mut [bool], keywords: &[&str]) -> Option<usize> {
    let idx = find_by_keywords(lower, taken, keywords)?;
    taken[idx] = true;
    Some(idx)
}

fn find_by_keywords(lower: &[String], taken: &[bool], keywords: &[&str]) -> Option<usize> {
    keywords.iter().find_map(|keyword| {
        free(lower, taken, |c| c == *keyword).or_else(|| {
            if keyword.chars().count() <= 2 {
                None
            } else {
                free(lower, taken, |c| c.contains(keyword))
            }
        })
    })
}

/// First column not yet assigned that satisfies `pred`.
fn free(lower: &[String], taken: &[bool], pred: impl Fn(&str) -> bool) -> Option<usize> {
    lower
        .iter()
        .enumerate()
        .find(|(i, c)| !taken[*i] && pred(c.as_str()))
        .map(|(i, _)| i)
}
