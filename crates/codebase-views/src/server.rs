/// MCP server answering questions about a codebase through curated views.
///
/// Exposes six tools:
/// - `list_views`: Catalog summaries in catalog order
/// - `get_view`: One view with its reference groups
/// - `analyze_question`: Classify a question and select views and files
/// - `build_context`: The intent plus the assembled context text
/// - `ask_codebase`: Answer a question with an LLM over the assembled context
/// - `reload_views`: Re-read the catalog file and drop cached file contents
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use view_context::references::{extract_code_snippets, extract_file_references};
use view_context::{
    ContextPipeline, FileSource, InMemoryCatalog, QuestionIntent, RankingOptions, View,
    ViewCatalog, ViewSummary,
};

use crate::cache::ContentCache;
use crate::catalog::load_catalog;
use crate::config::Config;
use crate::error::AppError;
use mcp_common::llm::{ChatMessage, ChatRequest, LlmClient};
use mcp_common::mcp_api::{
    AskCodebaseParams, AskCodebaseResponse, BuildContextResponse, CodeSnippetInfo,
    GetViewParams, IntentInfo, ListViewsResponse, QuestionParams, ReferenceGroupInfo,
    ReloadViewsResponse, ViewDetailResponse, ViewSummaryInfo,
};

/// Catalog for the current session. Replaced wholesale by `reload_views`.
pub struct AppState {
    pub catalog: InMemoryCatalog,
}

#[derive(Clone)]
pub struct CodebaseViewsServer {
    state: Arc<RwLock<AppState>>,
    source: Arc<dyn FileSource>,
    cache: Arc<ContentCache>,
    llm: Arc<LlmClient>,
    options: Arc<RankingOptions>,
    config: Arc<Config>,
    tool_router: ToolRouter<CodebaseViewsServer>,
}

impl CodebaseViewsServer {
    pub fn new(
        views: Vec<View>,
        source: Arc<dyn FileSource>,
        cache: Arc<ContentCache>,
        llm: Arc<LlmClient>,
        config: Config,
    ) -> Self {
        let options = RankingOptions::default().with_source_extension(&config.source_extension);
        Self {
            state: Arc::new(RwLock::new(AppState {
                catalog: InMemoryCatalog::new(views),
            })),
            source,
            cache,
            llm,
            options: Arc::new(options),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    async fn generate_answer(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        stream: bool,
    ) -> Result<String, AppError> {
        let request = ChatRequest::new(model, messages);
        let answer = if stream {
            let mut deltas = 0usize;
            let text = self
                .llm
                .complete_streaming(&request, |_| deltas += 1)
                .await?;
            debug!(model, deltas, "streamed answer complete");
            text
        } else {
            self.llm.complete(&request).await?
        };
        Ok(answer)
    }
}

#[tool_router]
impl CodebaseViewsServer {
    #[tool(description = "List the curated views of the codebase (subsystems with overview documents and groups of related files).")]
    async fn list_views(&self) -> Result<Json<ListViewsResponse>, String> {
        let state = self.state.read().await;
        let views = state
            .catalog
            .list_views()
            .into_iter()
            .map(to_api_summary)
            .collect();
        Ok(Json(ListViewsResponse { views }))
    }

    #[tool(description = "Get one view by ID, including its overview document path and every reference group with its files.")]
    async fn get_view(
        &self,
        Parameters(params): Parameters<GetViewParams>,
    ) -> Result<Json<ViewDetailResponse>, String> {
        let view_id = params.view_id.trim().to_string();
        if view_id.is_empty() {
            return Err("view_id must not be empty".to_string());
        }

        let state = self.state.read().await;
        let view = match state.catalog.get_view(&view_id) {
            Some(view) => view,
            None => state
                .catalog
                .views()
                .iter()
                .find(|v| v.id.eq_ignore_ascii_case(&view_id))
                .ok_or_else(|| format!("view not found: {view_id}"))?,
        };
        Ok(Json(to_api_view(view)))
    }

    #[tool(description = "Classify a question (overview, implementation, usage, comparison) and select the most relevant views and files for it, without fetching content.")]
    async fn analyze_question(
        &self,
        Parameters(params): Parameters<QuestionParams>,
    ) -> Result<Json<IntentInfo>, String> {
        let question = non_empty_question(&params.question)?;
        let state = self.state.read().await;
        let intent =
            ContextPipeline::new(&state.catalog, self.source.as_ref(), &self.options).analyze(&question);
        Ok(Json(to_api_intent(&intent)))
    }

    #[tool(description = "Select views and files for a question and assemble the context text (view overviews, reference groups, file excerpts) that an answer would be grounded on.")]
    async fn build_context(
        &self,
        Parameters(params): Parameters<QuestionParams>,
    ) -> Result<Json<BuildContextResponse>, String> {
        let question = non_empty_question(&params.question)?;
        let state = self.state.read().await;
        let (intent, context) =
            ContextPipeline::new(&state.catalog, self.source.as_ref(), &self.options)
                .build_context(&question)
                .await;
        Ok(Json(BuildContextResponse {
            intent: to_api_intent(&intent),
            context,
        }))
    }

    #[tool(description = "Answer a question about the codebase. Assembles view-aware context, asks the LLM, and returns the answer with the files and code snippets it mentions.")]
    async fn ask_codebase(
        &self,
        Parameters(params): Parameters<AskCodebaseParams>,
    ) -> Result<Json<AskCodebaseResponse>, String> {
        let question = non_empty_question(&params.question)?;
        let model = params
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .or_else(|| self.config.default_model.clone())
            .ok_or_else(|| "model must be given (no CODEBASE_LLM_MODEL configured)".to_string())?;

        let (intent, context, known_files) = {
            let state = self.state.read().await;
            let (intent, context) =
                ContextPipeline::new(&state.catalog, self.source.as_ref(), &self.options)
                    .build_context(&question)
                    .await;
            let known_files = files_of_views(&state.catalog, &intent.relevant_views);
            (intent, context, known_files)
        };

        let messages = build_messages(
            &intent,
            &context,
            &question,
            params.history.as_deref().unwrap_or_default(),
        );
        let answer = self
            .generate_answer(&model, messages, params.stream.unwrap_or(false))
            .await
            .map_err(|e| format!("answer generation failed: {e}"))?;

        let file_references = extract_file_references(&answer, &known_files);
        let code_snippets = extract_code_snippets(&answer)
            .into_iter()
            .map(|s| CodeSnippetInfo {
                language: s.language,
                code: s.code,
            })
            .collect();

        Ok(Json(AskCodebaseResponse {
            intent: to_api_intent(&intent),
            answer,
            file_references,
            code_snippets,
        }))
    }

    #[tool(description = "Reload the view catalog from disk and invalidate cached file contents.")]
    async fn reload_views(&self) -> Result<Json<ReloadViewsResponse>, String> {
        info!("reload_views tool invoked");

        let views = load_catalog(&self.config.catalog_path())
            .map_err(|e| format!("reload failed: {e}"))?;
        let view_count = views.len();

        {
            let mut state = self.state.write().await;
            state.catalog = InMemoryCatalog::new(views);
        }
        let cache_invalidated = self.cache.invalidate_all().await;
        info!(view_count, cache_invalidated, "view catalog reloaded");

        Ok(Json(ReloadViewsResponse {
            view_count,
            cache_invalidated,
        }))
    }
}

fn non_empty_question(raw: &str) -> Result<String, String> {
    let question = raw.trim();
    if question.is_empty() {
        return Err("question must not be empty".to_string());
    }
    Ok(question.to_string())
}

fn files_of_views(catalog: &dyn ViewCatalog, view_ids: &[String]) -> Vec<String> {
    view_ids
        .iter()
        .filter_map(|id| catalog.get_view(id))
        .flat_map(|v| v.reference_groups.values())
        .flat_map(|g| g.files.iter().cloned())
        .collect()
}

/// System prompt with the assembled context, then history, then the question.
fn build_messages(
    intent: &QuestionIntent,
    context: &str,
    question: &str,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let system = format!(
        "You are an expert on this codebase. Answer using the context below, which was \
selected from curated views of the repository. Cite files by their paths. If the context \
does not contain the answer, say so.\n\nQuestion type: {}\n\n{context}",
        intent.question_type
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(question));
    messages
}

fn to_api_intent(intent: &QuestionIntent) -> IntentInfo {
    IntentInfo {
        question_type: intent.question_type.as_str().to_string(),
        confidence: intent.confidence,
        keywords: intent.keywords.clone(),
        relevant_views: intent.relevant_views.clone(),
        needs_file_content: intent.needs_file_content,
        relevant_files: intent.relevant_files.clone(),
    }
}

fn to_api_summary(summary: ViewSummary) -> ViewSummaryInfo {
    ViewSummaryInfo {
        id: summary.id,
        name: summary.name,
        category: summary.category,
        description: summary.description,
        file_count: summary.file_count,
    }
}

fn to_api_view(view: &View) -> ViewDetailResponse {
    ViewDetailResponse {
        id: view.id.clone(),
        name: view.name.clone(),
        category: view.category.clone(),
        description: view.description.clone(),
        overview_path: view.overview_path.clone(),
        reference_groups: view
            .reference_groups
            .iter()
            .map(|(name, group)| ReferenceGroupInfo {
                name: name.clone(),
                description: group.description.clone(),
                files: group.files.clone(),
            })
            .collect(),
    }
}

#[tool_handler]
impl ServerHandler for CodebaseViewsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "codebase-views".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Codebase views MCP server. Answers questions about a repository using curated \
views (subsystem descriptions with overview documents and file groups). Use list_views and \
get_view to browse, analyze_question or build_context to inspect the selected context, \
ask_codebase for a grounded answer, and reload_views after the catalog changes."
                    .to_string(),
            ),
        }
    }
}
