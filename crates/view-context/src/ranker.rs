//! Keyword extraction and additive relevance scoring over a view catalog.
//!
//! The weights are behavioral contracts: changing them changes which views and
//! files surface for a question.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{QuestionType, View};

pub const MAX_RELEVANT_VIEWS: usize = 3;
pub const MAX_RELEVANT_FILES: usize = 5;

const VIEW_KEYWORD_WEIGHT: f64 = 2.0;
const CATEGORY_BONUS: f64 = 3.0;
const GROUP_KEYWORD_WEIGHT: f64 = 1.0;
const SOURCE_EXTENSION_BONUS: f64 = 0.5;
const TEST_FILE_PENALTY: f64 = 2.0;
const MIN_NAME_WORD_LEN: usize = 3;

pub const DEFAULT_SOURCE_EXTENSION: &str = ".ts";

/// Technical terms that count as keywords whenever they appear in a question.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "adapter",
    "service",
    "cache",
    "repository",
    "client",
    "server",
    "api",
    "database",
    "storage",
    "config",
    "auth",
    "router",
    "handler",
    "controller",
    "model",
    "schema",
    "component",
    "middleware",
    "query",
    "event",
];

#[derive(Debug, Clone)]
pub struct RankingOptions {
    /// Extension of source-code files in the catalog, e.g. ".ts"
    pub source_extension: String,
    pub vocabulary: Vec<String>,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RankingOptions {
    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }
}

struct ScoredCandidate<'a> {
    key: &'a str,
    score: f64,
}

/// Collect keywords from the question: view names, long words of view names,
/// and vocabulary terms. Deduplicated case-insensitively; the first spelling
/// found is kept, in first occurrence order.
pub fn extract_keywords(question: &str, views: &[View], vocabulary: &[String]) -> Vec<String> {
    let lower = question.to_lowercase();
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    let mut push = |word: &str| {
        if seen.insert(word.to_lowercase()) {
            keywords.push(word.to_string());
        }
    };

    for view in views {
        let name = view.name.trim();
        if !name.is_empty() && lower.contains(&name.to_lowercase()) {
            push(name);
        }
        for word in name
            .split_whitespace()
            .filter(|w| w.chars().count() > MIN_NAME_WORD_LEN)
        {
            if lower.contains(&word.to_lowercase()) {
                push(word);
            }
        }
    }

    for term in vocabulary {
        if !term.is_empty() && lower.contains(&term.to_lowercase()) {
            push(term);
        }
    }

    keywords
}

pub fn score_view(view: &View, keywords: &[String], question_type: QuestionType) -> f64 {
    let haystack =
        format!("{} {} {}", view.name, view.description, view.category).to_lowercase();
    let group_names: Vec<String> = view
        .reference_groups
        .keys()
        .map(|name| name.to_lowercase())
        .collect();

    let mut score = 0.0;
    for keyword in keywords {
        let keyword = keyword.to_lowercase();
        if haystack.contains(&keyword) {
            score += VIEW_KEYWORD_WEIGHT;
        }
        if group_names.iter().any(|name| name.contains(&keyword)) {
            score += GROUP_KEYWORD_WEIGHT;
        }
    }

    match (question_type, view.category.as_str()) {
        (QuestionType::Overview, "architecture") | (QuestionType::Usage, "guide") => {
            score += CATEGORY_BONUS;
        }
        _ => {}
    }

    score
}

/// Rank views for a question. Returns at most three ids, best first.
///
/// When no view scores, falls back to the first "architecture" view.
pub fn rank_views(views: &[View], keywords: &[String], question_type: QuestionType) -> Vec<String> {
    let mut candidates: Vec<ScoredCandidate<'_>> = views
        .iter()
        .map(|view| ScoredCandidate {
            key: view.id.as_str(),
            score: score_view(view, keywords, question_type),
        })
        .filter(|c| c.score > 0.0)
        .collect();

    if candidates.is_empty() {
        debug!("no view scored, falling back to first architecture view");
        return views
            .iter()
            .find(|view| view.category == "architecture")
            .map(|view| vec![view.id.clone()])
            .unwrap_or_default();
    }

    sort_descending(&mut candidates);
    candidates
        .into_iter()
        .take(MAX_RELEVANT_VIEWS)
        .map(|c| c.key.to_string())
        .collect()
}

/// Whether raw file content should be fetched for this question.
pub fn needs_file_content(question: &str, question_type: QuestionType) -> bool {
    match question_type {
        QuestionType::Implementation | QuestionType::Comparison => true,
        QuestionType::Usage => {
            let lower = question.to_lowercase();
            lower.contains("example") || lower.contains("code")
        }
        QuestionType::Overview => false,
    }
}

pub fn score_file(path: &str, group: &str, keywords: &[String], source_extension: &str) -> f64 {
    let lower_path = path.to_lowercase();
    let mut score = if keywords.is_empty() {
        1.0
    } else {
        let haystack = format!("{lower_path} {}", group.to_lowercase());
        keywords
            .iter()
            .filter(|k| haystack.contains(&k.to_lowercase()))
            .count() as f64
    };

    if !source_extension.is_empty() && lower_path.ends_with(&source_extension.to_lowercase()) {
        score += SOURCE_EXTENSION_BONUS;
    }
    if lower_path.contains("test") || lower_path.contains("spec") {
        score -= TEST_FILE_PENALTY;
    }
    score
}

/// Rank the files of the selected views. Returns at most five paths, best first.
///
/// A path listed in several groups keeps the first group it was seen in.
/// Negative scores are ranked, not dropped.
pub fn rank_files(
    views: &[View],
    relevant_views: &[String],
    keywords: &[String],
    source_extension: &str,
) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut candidates: Vec<ScoredCandidate<'_>> = Vec::new();

    for view_id in relevant_views {
        let Some(view) = views.iter().find(|v| &v.id == view_id) else {
            continue;
        };
        for (group_name, group) in &view.reference_groups {
            for path in &group.files {
                if !seen.insert(path.as_str()) {
                    continue;
                }
                candidates.push(ScoredCandidate {
                    key: path.as_str(),
                    score: score_file(path, group_name, keywords, source_extension),
                });
            }
        }
    }

    sort_descending(&mut candidates);
    candidates
        .into_iter()
        .take(MAX_RELEVANT_FILES)
        .map(|c| c.key.to_string())
        .collect()
}

// Stable: equal scores keep catalog order.
fn sort_descending(candidates: &mut [ScoredCandidate<'_>]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}
