//! File-access collaborator used by the context assembler.

use std::collections::HashMap;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("not cached: {0}")]
    NotCached(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("path escapes repository root: {0}")]
    OutsideRoot(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read access to repository files by repository-relative path.
///
/// Failures are soft for callers: the assembler substitutes placeholder text.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, SourceError>;
}

/// Preloaded file contents. Paths never inserted report `NotCached`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

#[async_trait]
impl FileSource for MemorySource {
    async fn read_file(&self, path: &str) -> Result<String, SourceError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotCached(path.to_string()))
    }
}
