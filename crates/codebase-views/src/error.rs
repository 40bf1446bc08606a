#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error in {path}: {message}")]
    Catalog { path: String, message: String },

    #[error(transparent)]
    Llm(#[from] mcp_common::llm::LlmClientError),
}
