use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetViewParams {
    /// View identifier as returned by list_views, e.g. "storage-adapter".
    pub view_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QuestionParams {
    /// Free-text question about the codebase.
    pub question: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskCodebaseParams {
    /// Free-text question about the codebase.
    pub question: String,
    /// Model ID to answer with. Falls back to the server's configured default.
    pub model: Option<String>,
    /// Earlier turns of the conversation, oldest first.
    pub history: Option<Vec<ChatMessage>>,
    /// Stream the completion from the upstream model (default: false). Deltas are
    /// aggregated server-side; the tool still returns one complete answer.
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewSummaryInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListViewsResponse {
    pub views: Vec<ViewSummaryInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceGroupInfo {
    pub name: String,
    pub description: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewDetailResponse {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub overview_path: Option<String>,
    pub reference_groups: Vec<ReferenceGroupInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentInfo {
    /// One of "overview", "implementation", "usage", "comparison".
    #[serde(rename = "type")]
    pub question_type: String,
    pub confidence: f32,
    pub keywords: Vec<String>,
    pub relevant_views: Vec<String>,
    pub needs_file_content: bool,
    pub relevant_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildContextResponse {
    pub intent: IntentInfo,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodeSnippetInfo {
    pub language: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskCodebaseResponse {
    pub intent: IntentInfo,
    pub answer: String,
    /// Catalog files mentioned in the answer, first mention first.
    pub file_references: Vec<String>,
    pub code_snippets: Vec<CodeSnippetInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReloadViewsResponse {
    pub view_count: usize,
    pub cache_invalidated: bool,
}
