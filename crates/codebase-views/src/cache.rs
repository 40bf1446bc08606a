/// Redis caching layer for repository file contents.
///
/// All operations degrade to misses when Redis is unavailable.
///
/// Key schema:
/// - `cbv:v1:file:{sha256(path)}`: raw file content (TTL from config)
use sha2::{Digest, Sha256};
use tracing::debug;

use mcp_common::redis::RedisCache;

const KEY_PREFIX: &str = "cbv:v1:";

pub struct ContentCache {
    redis: RedisCache,
    ttl_secs: u64,
}

impl ContentCache {
    pub fn new(redis: RedisCache, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub async fn get_file(&self, path: &str) -> Option<String> {
        let content = self.redis.get(&file_key(path)).await;
        if content.is_some() {
            debug!(path, "content cache hit");
        }
        content
    }

    pub async fn set_file(&self, path: &str, content: &str) {
        self.redis
            .set_with_ttl(&file_key(path), content, self.ttl_secs)
            .await;
    }

    pub async fn invalidate_all(&self) -> bool {
        self.redis.delete_by_prefix(KEY_PREFIX).await
    }
}

fn file_key(path: &str) -> String {
    let hash = Sha256::digest(path.as_bytes());
    format!("{KEY_PREFIX}file:{hash:x}")
}
