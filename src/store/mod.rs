//! Persistence layer — a storage facade over libSQL with an in-memory fallback.

pub mod facade;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod record;
pub mod traits;

pub use facade::{Backend, CollectionHandle, Connector, LibSqlConnector, Storage};
pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryStore;
pub use record::{Filter, Page, Record};
pub use traits::{BackendKind, CollectionBackend};
