//! `CollectionBackend` trait — the async interface every storage backend implements.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DatabaseError;
use crate::store::record::{Filter, Page, Record};

/// Which kind of backend is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External libSQL database.
    External,
    /// Process-local, non-persistent store.
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::External => "external",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-agnostic collection storage.
///
/// Collections are created implicitly: querying or counting a collection that
/// has never been written returns an empty result, not an error.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Append a record to a collection. Returns the generated id.
    async fn insert(&self, collection: &str, record: Record) -> Result<String, DatabaseError>;

    /// Matching records in insertion order, windowed by `page`.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        page: Page,
    ) -> Result<Vec<Record>, DatabaseError>;

    /// Number of matching records.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DatabaseError>;

    /// Lightweight liveness probe.
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    /// Release connection resources. Must be idempotent.
    async fn close(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
