//! libSQL backend — the external `CollectionBackend`.
//!
//! Every record is stored as a JSON document in a single `records` table,
//! keyed by collection. Supports local files, `:memory:` and remote
//! `libsql://` / `http(s)://` databases.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use libsql::params::Params;
use libsql::{Connection, Value, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::record::{CREATED_AT_FIELD, Filter, Page, Record, stamp};
use crate::store::traits::{BackendKind, CollectionBackend};

/// libSQL database backend.
///
/// Holds a single connection that is cloned for each operation; clones share
/// the underlying connection. `close()` drops it, after which every operation
/// fails with [`DatabaseError::Closed`].
pub struct LibSqlBackend {
    conn: RwLock<Option<Connection>>,
}

impl LibSqlBackend {
    /// Open a database from a connection string and run migrations.
    ///
    /// `libsql://`, `http://` and `https://` URLs open a remote database;
    /// anything else is treated as a local path (`file:` prefix optional).
    pub async fn connect(url: &str, auth_token: Option<&SecretString>) -> Result<Self, DatabaseError> {
        if is_remote(url) {
            Self::new_remote(url, auth_token).await
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            if path == ":memory:" {
                Self::new_memory().await
            } else {
                Self::new_local(Path::new(path)).await
            }
        }
    }

    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path).build().await.map_err(|e| {
            DatabaseError::Connection(format!("Failed to open libSQL database: {e}"))
        })?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory libSQL database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    /// Connect to a remote libSQL server.
    pub async fn new_remote(
        url: &str,
        auth_token: Option<&SecretString>,
    ) -> Result<Self, DatabaseError> {
        let token = auth_token
            .map(|t| t.expose_secret().to_string())
            .unwrap_or_default();

        let db = libsql::Builder::new_remote(url.to_string(), token)
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to open remote libSQL database: {e}"))
            })?;

        let backend = Self::from_database(db).await?;
        info!(host = %redact(url), "Remote database opened");
        Ok(backend)
    }

    async fn from_database(db: libsql::Database) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let schema = migrations::run_migrations(&conn).await?;
        if !schema.is_noop() {
            info!(from = schema.from, to = schema.to, "Database schema migrated");
        }

        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    /// Get a handle on the connection, or `Closed` after shutdown.
    fn conn(&self) -> Result<Connection, DatabaseError> {
        self.conn
            .read()
            .map_err(|_| DatabaseError::Connection("connection lock poisoned".into()))?
            .clone()
            .ok_or(DatabaseError::Closed)
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn is_remote(url: &str) -> bool {
    ["libsql://", "http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Strip credentials and query parameters from a URL before logging it.
pub(crate) fn redact(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    match without_query.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.rsplit_once('@').map(|(_, h)| h).unwrap_or(rest);
            format!("{scheme}://{host}")
        }
        None => without_query.to_string(),
    }
}

/// JSON path addressing a top-level field, quoted so any key is addressable.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Convert a filter value into the SQL value `json_extract` would produce.
fn sql_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

/// Build `WHERE` conditions for a collection and filter, pushing bind values into `args`.
fn where_clause(collection: &str, filter: &Filter, args: &mut Vec<Value>) -> String {
    let mut sql = String::from("collection = ?");
    args.push(Value::Text(collection.to_string()));

    for (field, value) in filter.clauses() {
        let path = json_path(field);
        if value.is_null() {
            sql.push_str(" AND json_extract(payload, ?) IS NULL");
            args.push(Value::Text(path));
            continue;
        }

        // json_extract flattens booleans to 0/1, so pin the JSON type as well.
        sql.push_str(&format!(
            " AND json_type(payload, ?) IN ({}) AND json_extract(payload, ?) = ?",
            json_types(value)
        ));
        args.push(Value::Text(path.clone()));
        args.push(Value::Text(path));
        args.push(sql_value(value));
    }
    sql
}

/// `json_type` names a stored value must have to equal `value`.
fn json_types(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Bool(_) => "'true', 'false'",
        serde_json::Value::Number(_) => "'integer', 'real'",
        serde_json::Value::String(_) => "'text'",
        _ => "'object', 'array'",
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl CollectionBackend for LibSqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<String, DatabaseError> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();
        let record = stamp(record, &id, Utc::now());

        let created_at = record
            .get(CREATED_AT_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let payload = serde_json::to_string(&record)?;

        conn.execute(
            "INSERT INTO records (id, collection, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.clone(), collection, payload, created_at],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert: {e}")))?;

        debug!(collection, id = %id, "Record inserted into DB");
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        page: Page,
    ) -> Result<Vec<Record>, DatabaseError> {
        let conn = self.conn()?;
        let mut args = Vec::new();
        let conditions = where_clause(collection, filter, &mut args);
        // SQLite treats a negative LIMIT as unbounded.
        args.push(Value::Integer(page.limit.map(to_i64).unwrap_or(-1)));
        args.push(Value::Integer(to_i64(page.skip)));

        let mut rows = conn
            .query(
                &format!(
                    "SELECT payload FROM records WHERE {conditions} ORDER BY seq ASC LIMIT ? OFFSET ?"
                ),
                Params::Positional(args),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("query: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("query row: {e}")))?
        {
            let payload: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("query row parse: {e}")))?;
            records.push(serde_json::from_str(&payload)?);
        }
        Ok(records)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DatabaseError> {
        let conn = self.conn()?;
        let mut args = Vec::new();
        let conditions = where_clause(collection, filter, &mut args);

        let mut rows = conn
            .query(
                &format!("SELECT COUNT(*) FROM records WHERE {conditions}"),
                Params::Positional(args),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count row parse: {e}")))?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count: {e}"))),
        }
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(|e| DatabaseError::Connection(format!("ping: {e}")))?;
        rows.next()
            .await
            .map_err(|e| DatabaseError::Connection(format!("ping: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        let taken = self
            .conn
            .write()
            .map_err(|_| DatabaseError::Connection("connection lock poisoned".into()))?
            .take();
        if taken.is_some() {
            info!("Database connection closed");
        }
        Ok(())
    }
}
