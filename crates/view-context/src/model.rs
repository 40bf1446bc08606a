use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A curated description of one logical subsystem of the target codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Stable identifier, unique within a catalog
    pub id: String,
    /// Display name, e.g. "Storage Adapter"
    pub name: String,
    /// Free-form tag such as "architecture" or "guide"
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Repository-relative path of the markdown overview document
    #[serde(default)]
    pub overview_path: Option<String>,
    /// Named groups of associated files, keyed by group name
    #[serde(default)]
    pub reference_groups: BTreeMap<String, ReferenceGroup>,
}

/// A named subset of a view's files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceGroup {
    #[serde(default)]
    pub description: Option<String>,
    /// File paths in curated order
    #[serde(default)]
    pub files: Vec<String>,
}

/// Catalog listing entry for a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    /// Files across all reference groups
    pub file_count: usize,
}

impl View {
    pub fn summary(&self) -> ViewSummary {
        ViewSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            file_count: self.file_count(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.reference_groups.values().map(|g| g.files.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Overview,
    Implementation,
    Usage,
    Comparison,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Implementation => "implementation",
            Self::Usage => "usage",
            Self::Comparison => "comparison",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified purpose of a question plus the context selected for it.
///
/// Built once per question and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionIntent {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Informational only; nothing downstream branches on it
    pub confidence: f32,
    pub keywords: Vec<String>,
    /// View ids, most relevant first (at most 3)
    pub relevant_views: Vec<String>,
    pub needs_file_content: bool,
    /// File paths, most relevant first (at most 5, empty unless `needs_file_content`)
    pub relevant_files: Vec<String>,
}
