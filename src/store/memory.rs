//! In-memory collection store — the fallback when no external database is available.
//!
//! All state sits behind a single `RwLock`, so each operation is atomic with
//! respect to every other one regardless of how many worker threads the
//! runtime uses.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DatabaseError;
use crate::store::record::{Filter, Page, Record, stamp};
use crate::store::traits::{BackendKind, CollectionBackend};

struct MemoryState {
    collections: HashMap<String, Vec<Record>>,
    /// Next id to hand out. Shared across collections, starts at 1.
    next_id: u64,
}

/// Process-local collection store. Nothing survives a restart.
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                collections: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectionBackend for InMemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<String, DatabaseError> {
        let mut state = self.state.write().await;

        let id = state.next_id.to_string();
        state.next_id += 1;

        let record = stamp(record, &id, Utc::now());
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record);

        debug!(collection, id = %id, "Record inserted into memory store");
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        page: Page,
    ) -> Result<Vec<Record>, DatabaseError> {
        let state = self.state.read().await;
        let Some(records) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let matching = records.iter().filter(|r| filter.matches(r));
        Ok(page.apply(matching).cloned().collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DatabaseError> {
        let state = self.state.read().await;
        let count = state
            .collections
            .get(collection)
            .map(|records| records.iter().filter(|r| filter.matches(r)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }
}
