use std::path::{Path, PathBuf};

use crate::error::AppError;

const DEFAULT_SOURCE_EXTENSION: &str = ".ts";
const DEFAULT_CONTENT_CACHE_TTL_SECS: u64 = 3600;

/// Application configuration loaded explicitly from environment variables.
///
/// Paths have no defaults. Redis URL is optional; if absent, file contents
/// are read from the repository on every request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the view catalog JSON file.
    pub catalog_path: String,
    /// Root directory that view and file paths are resolved against.
    pub repo_path: String,
    /// Extension of source-code files in the catalog, e.g. ".ts".
    pub source_extension: String,
    /// Model used by `ask_codebase` when the caller names none.
    pub default_model: Option<String>,
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` disables caching.
    pub redis_url: Option<String>,
    pub content_cache_ttl_secs: u64,
}

impl Config {
    /// Required:
    /// - `CODEBASE_VIEWS_CATALOG`: path to the view catalog JSON
    /// - `CODEBASE_REPO_PATH`: path to the checked-out target repository
    ///
    /// Optional:
    /// - `CODEBASE_SOURCE_EXTENSION` (default: ".ts")
    /// - `CODEBASE_LLM_MODEL`
    /// - `REDIS_URL`
    /// - `CONTENT_CACHE_TTL_SECS` (default: 3600)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let catalog_path = lookup("CODEBASE_VIEWS_CATALOG").ok_or_else(|| {
            AppError::Config("CODEBASE_VIEWS_CATALOG environment variable is required".to_string())
        })?;

        let repo_path = lookup("CODEBASE_REPO_PATH").ok_or_else(|| {
            AppError::Config("CODEBASE_REPO_PATH environment variable is required".to_string())
        })?;

        if !Path::new(&repo_path).is_dir() {
            return Err(AppError::Config(format!(
                "repository directory not found: {repo_path}"
            )));
        }
        if !Path::new(&catalog_path).is_file() {
            return Err(AppError::Config(format!(
                "view catalog not found: {catalog_path}"
            )));
        }

        let content_cache_ttl_secs = match lookup("CONTENT_CACHE_TTL_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!("CONTENT_CACHE_TTL_SECS is not a number: {raw}"))
            })?,
            None => DEFAULT_CONTENT_CACHE_TTL_SECS,
        };

        Ok(Self {
            catalog_path,
            repo_path,
            source_extension: lookup("CODEBASE_SOURCE_EXTENSION")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_EXTENSION.to_string()),
            default_model: lookup("CODEBASE_LLM_MODEL").filter(|s| !s.is_empty()),
            redis_url: lookup("REDIS_URL"),
            content_cache_ttl_secs,
        })
    }

    pub fn repo_path(&self) -> PathBuf {
        PathBuf::from(&self.repo_path)
    }

    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(&self.catalog_path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |name: &str| vars.get(name).cloned()
    }

    fn fixture_dir() -> String {
        env!("CARGO_MANIFEST_DIR").to_string()
    }

    fn fixture_catalog() -> String {
        format!("{}/Cargo.toml", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_missing_catalog_var() {
        let err = Config::from_lookup(lookup_from(HashMap::new())).unwrap_err();
        assert!(err.to_string().contains("CODEBASE_VIEWS_CATALOG"));
    }

    #[test]
    fn test_defaults_applied() {
        let vars = HashMap::from([
            ("CODEBASE_VIEWS_CATALOG", fixture_catalog()),
            ("CODEBASE_REPO_PATH", fixture_dir()),
        ]);
        let config = Config::from_lookup(lookup_from(vars)).unwrap();
        assert_eq!(config.source_extension, ".ts");
        assert_eq!(config.content_cache_ttl_secs, 3600);
        assert!(config.redis_url.is_none());
        assert!(config.default_model.is_none());
    }

    #[test]
    fn test_invalid_ttl_rejected() {
        let vars = HashMap::from([
            ("CODEBASE_VIEWS_CATALOG", fixture_catalog()),
            ("CODEBASE_REPO_PATH", fixture_dir()),
            ("CONTENT_CACHE_TTL_SECS", "soon".to_string()),
        ]);
        assert!(Config::from_lookup(lookup_from(vars)).is_err());
    }

    #[test]
    fn test_missing_repo_dir_rejected() {
        let vars = HashMap::from([
            ("CODEBASE_VIEWS_CATALOG", fixture_catalog()),
            ("CODEBASE_REPO_PATH", "/definitely/not/here".to_string()),
        ]);
        let err = Config::from_lookup(lookup_from(vars)).unwrap_err();
        assert!(err.to_string().contains("repository directory not found"));
    }
}
