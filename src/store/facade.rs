//! Storage facade — resolves the backend once and hands out collection handles.
//!
//! Resolution fails open: a missing connection string or an unreachable
//! database selects the in-memory store instead of aborting startup.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::DatabaseError;
use crate::store::libsql_backend::{LibSqlBackend, redact};
use crate::store::memory::InMemoryStore;
use crate::store::record::{Filter, Page, Record};
use crate::store::traits::{BackendKind, CollectionBackend};

/// Opens external backends. Swappable so tests can simulate outages.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        auth_token: Option<&SecretString>,
    ) -> Result<Arc<dyn CollectionBackend>, DatabaseError>;
}

/// Production connector backed by libSQL.
pub struct LibSqlConnector;

#[async_trait]
impl Connector for LibSqlConnector {
    async fn connect(
        &self,
        url: &str,
        auth_token: Option<&SecretString>,
    ) -> Result<Arc<dyn CollectionBackend>, DatabaseError> {
        let backend = LibSqlBackend::connect(url, auth_token).await?;
        Ok(Arc::new(backend))
    }
}

/// The resolved storage backend. Cheap to clone; clones share the instance.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<dyn CollectionBackend>,
}

impl Backend {
    pub fn new(inner: Arc<dyn CollectionBackend>) -> Self {
        Self { inner }
    }

    /// A fresh in-memory backend.
    pub fn memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    /// Whether both handles point at the same backend instance.
    pub fn same_instance(&self, other: &Backend) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A backend bound to one collection name.
#[derive(Clone)]
pub struct CollectionHandle {
    backend: Backend,
    name: String,
}

impl CollectionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Insert a record. Returns the generated id.
    pub async fn insert(&self, record: Record) -> Result<String, DatabaseError> {
        self.backend.inner.insert(&self.name, record).await
    }

    /// Records matching `filter`, in insertion order, windowed by `page`.
    pub async fn query(&self, filter: &Filter, page: Page) -> Result<Vec<Record>, DatabaseError> {
        self.backend.inner.query(&self.name, filter, page).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, DatabaseError> {
        self.backend.inner.count(&self.name, filter).await
    }
}

/// Uniform storage entry point, owned by the service and shared via `Arc`.
pub struct Storage {
    config: StorageConfig,
    connector: Arc<dyn Connector>,
    backend: OnceCell<Backend>,
}

impl Storage {
    /// Storage that resolves against libSQL when configured.
    pub fn new(config: StorageConfig) -> Self {
        Self::with_connector(config, Arc::new(LibSqlConnector))
    }

    /// Storage with a custom connector.
    pub fn with_connector(config: StorageConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            backend: OnceCell::new(),
        }
    }

    /// Storage that is already resolved to `backend`.
    pub fn from_backend(backend: Backend) -> Self {
        Self {
            config: StorageConfig::default(),
            connector: Arc::new(LibSqlConnector),
            backend: OnceCell::new_with(Some(backend)),
        }
    }

    /// Resolve the backend on first call; later calls return the memoised one.
    ///
    /// Concurrent first callers share a single resolution. Never fails.
    pub async fn resolve_backend(&self) -> Backend {
        self.backend
            .get_or_init(|| self.select_backend())
            .await
            .clone()
    }

    /// Kind of the resolved backend, or `None` before resolution.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.get().map(Backend::kind)
    }

    /// Handle bound to the resolved backend and `name`.
    pub async fn get_collection(&self, name: impl Into<String>) -> CollectionHandle {
        CollectionHandle {
            backend: self.resolve_backend().await,
            name: name.into(),
        }
    }

    /// Release external connection resources. Safe without prior resolution
    /// and safe to call twice.
    pub async fn shutdown(&self) {
        let Some(backend) = self.backend.get() else {
            return;
        };
        match backend.inner.close().await {
            Ok(()) => info!(backend = %backend.kind(), "Storage shut down"),
            Err(e) => warn!(error = %e, "Failed to close storage backend cleanly"),
        }
    }

    async fn select_backend(&self) -> Backend {
        let Some(url) = self.config.database_url.as_deref() else {
            info!("No external database configured, using in-memory storage");
            return Backend::memory();
        };

        match self.connect_and_probe(url).await {
            Ok(inner) => {
                info!(target_db = %redact(url), "Connected to external database");
                Backend::new(inner)
            }
            Err(e) => {
                warn!(
                    target_db = %redact(url),
                    error = %e,
                    "External database unavailable, falling back to in-memory storage"
                );
                Backend::memory()
            }
        }
    }

    async fn connect_and_probe(
        &self,
        url: &str,
    ) -> Result<Arc<dyn CollectionBackend>, DatabaseError> {
        let backend = self
            .connector
            .connect(url, self.config.auth_token.as_ref())
            .await?;
        backend.ping().await?;
        Ok(backend)
    }
}
