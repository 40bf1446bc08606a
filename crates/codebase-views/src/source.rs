use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use view_context::{FileSource, SourceError};

use crate::cache::ContentCache;

/// Reads repository-relative paths from a local checkout.
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Join `path` onto the root, refusing anything that could leave it.
    fn resolve(&self, path: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes || path.trim().is_empty() {
            return Err(SourceError::OutsideRoot(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileSource for LocalSource {
    async fn read_file(&self, path: &str) -> Result<String, SourceError> {
        let full_path = self.resolve(path)?;
        tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
                _ => SourceError::Io {
                    path: path.to_string(),
                    source: e,
                },
            })
    }
}

/// Read-through content cache in front of another source.
pub struct CachedSource<S> {
    inner: S,
    cache: Arc<ContentCache>,
}

impl<S: FileSource> CachedSource<S> {
    pub fn new(inner: S, cache: Arc<ContentCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: FileSource> FileSource for CachedSource<S> {
    async fn read_file(&self, path: &str) -> Result<String, SourceError> {
        if let Some(content) = self.cache.get_file(path).await {
            return Ok(content);
        }
        let content = self.inner.read_file(path).await?;
        self.cache.set_file(path, &content).await;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use mcp_common::redis::RedisCache;
    use view_context::MemorySource;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("codebase-views-{name}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("src")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_local_source_reads_relative_paths() {
        let dir = scratch_dir("read");
        std::fs::write(dir.join("src/cache.ts"), "export class Cache {}").unwrap();
        let source = LocalSource::new(&dir);

        assert_eq!(
            source.read_file("src/cache.ts").await.unwrap(),
            "export class Cache {}"
        );
        assert_eq!(
            source.read_file("./src/cache.ts").await.unwrap(),
            "export class Cache {}"
        );
        assert!(matches!(
            source.read_file("src/missing.ts").await,
            Err(SourceError::NotFound(_))
        ));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_local_source_rejects_escaping_paths() {
        let source = LocalSource::new(scratch_dir("escape"));
        for path in ["../secret.txt", "/etc/passwd", "src/../../x", ""] {
            assert!(
                matches!(source.read_file(path).await, Err(SourceError::OutsideRoot(_))),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_cached_source_falls_through() {
        let inner = MemorySource::new().with_file("a.ts", "alpha");
        let cache = Arc::new(ContentCache::new(RedisCache::disabled(), 60));
        let source = CachedSource::new(inner, cache);

        assert_eq!(source.read_file("a.ts").await.unwrap(), "alpha");
        assert!(matches!(
            source.read_file("b.ts").await,
            Err(SourceError::NotCached(_))
        ));
    }
}
