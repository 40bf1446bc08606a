mod cache;
mod catalog;
mod config;
mod error;
mod server;
mod source;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cache::ContentCache;
use config::Config;
use mcp_common::llm::{LlmClient, LlmClientConfig};
use mcp_common::redis::RedisCache;
use server::CodebaseViewsServer;
use source::{CachedSource, LocalSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting codebase-views MCP server");

    let config = Config::from_env()?;
    info!(
        catalog_path = %config.catalog_path,
        repo_path = %config.repo_path,
        source_extension = %config.source_extension,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    let views = catalog::load_catalog(&config.catalog_path())?;
    if views.is_empty() {
        warn!("view catalog is empty, answers will carry no view context");
    }
    info!(views = views.len(), "view catalog loaded");

    let redis_cache = RedisCache::new(config.redis_url.as_deref());
    if redis_cache.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, running without content cache");
    }
    let cache = Arc::new(ContentCache::new(redis_cache, config.content_cache_ttl_secs));
    let source = Arc::new(CachedSource::new(
        LocalSource::new(config.repo_path()),
        Arc::clone(&cache),
    ));

    let llm_config = LlmClientConfig::from_env();
    info!(
        base_url = %llm_config.base_url,
        timeout_ms = llm_config.timeout.as_millis(),
        max_retries = llm_config.max_retries,
        default_model = config.default_model.as_deref().unwrap_or("<none>"),
        "llm client configured"
    );
    let llm = Arc::new(LlmClient::new(llm_config)?);

    let server = CodebaseViewsServer::new(views, source, cache, llm, config);

    if let Ok(addr) = std::env::var("MCP_TCP_LISTEN_ADDR") {
        let listener = TcpListener::bind(&addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
