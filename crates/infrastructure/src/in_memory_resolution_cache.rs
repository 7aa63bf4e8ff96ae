use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use drivelane_application::{CachedResolution, ResolutionCache};

/// In-memory last-known-good resolution cache.
#[derive(Default)]
pub struct InMemoryResolutionCache {
    entries: RwLock<HashMap<String, CachedResolution>>,
}

impl InMemoryResolutionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResolutionCache for InMemoryResolutionCache {
    async fn get(&self, email: &str) -> Option<CachedResolution> {
        self.entries.read().await.get(email).cloned()
    }

    async fn put(&self, email: &str, resolution: CachedResolution) {
        self.entries
            .write()
            .await
            .insert(email.to_owned(), resolution);
    }

    async fn invalidate(&self, email: &str) {
        self.entries.write().await.remove(email);
    }

    async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }
}
