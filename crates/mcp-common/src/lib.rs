pub mod llm;
pub mod mcp_api;
pub mod redis;
