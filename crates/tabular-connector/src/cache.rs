use crate::compatibility::CompatibilityMode;
use crate::table::ResolvedTable;
use crate::types::TableParameters;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key: one table of one dataset under one mode
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CacheKey {
    pub dataset: String,
    pub table: String,
    pub mode: CompatibilityMode,
}

impl CacheKey {
    pub fn new(table: &TableParameters, mode: CompatibilityMode) -> Self {
        Self {
            dataset: table.dataset.clone(),
            table: table.table.clone(),
            mode,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.dataset, self.table, self.mode)
    }
}

/// Metadata cache consulted before a table schema is parsed
///
/// Purely a latency optimisation: resolution results are identical with or
/// without a cache.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Arc<ResolvedTable>>;

    /// Insert unless present; returns whichever entry ends up cached
    async fn insert_if_absent(&self, key: CacheKey, table: Arc<ResolvedTable>) -> Arc<ResolvedTable>;

    async fn invalidate(&self, key: &CacheKey);
}

/// Process-local cache backed by a locked map
#[derive(Default)]
pub struct InMemoryMetadataCache {
    entries: RwLock<HashMap<CacheKey, Arc<ResolvedTable>>>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataCache for InMemoryMetadataCache {
    async fn get(&self, key: &CacheKey) -> Option<Arc<ResolvedTable>> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    async fn insert_if_absent(&self, key: CacheKey, table: Arc<ResolvedTable>) -> Arc<ResolvedTable> {
        let mut entries = self.entries.write().await;
        entries
            .entry(key)
            .or_insert_with_key(|key| {
                debug!("Caching resolved table {}", key);
                table
            })
            .clone()
    }

    async fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            debug!("Invalidated cached table {}", key);
        }
    }
}
