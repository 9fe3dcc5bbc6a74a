//! Schema versioning for the libSQL backend.
//!
//! `_migrations` records every applied step. A step's DDL and its ledger row
//! commit in one transaction, so a failed step leaves the schema at the
//! previous version.

use libsql::{Connection, params};

use crate::error::DatabaseError;

/// One schema step. Versions must be strictly increasing.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

static SCHEMA: &[Migration] = &[Migration {
    version: 1,
    name: "records",
    sql: r#"
        CREATE TABLE IF NOT EXISTS records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            collection TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, seq);
    "#,
}];

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Schema versions before and after a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub from: i64,
    pub to: i64,
}

impl MigrationOutcome {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Bring the schema up to date.
pub async fn run_migrations(conn: &Connection) -> Result<MigrationOutcome, DatabaseError> {
    apply_pending(conn, SCHEMA).await
}

async fn apply_pending(
    conn: &Connection,
    steps: &[Migration],
) -> Result<MigrationOutcome, DatabaseError> {
    conn.execute(LEDGER_DDL, ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("create ledger: {e}")))?;

    let from = schema_version(conn).await?;
    let mut to = from;
    for step in steps.iter().filter(|s| s.version > from) {
        tracing::info!(version = step.version, name = step.name, "Applying migration");
        apply(conn, step).await?;
        to = step.version;
    }
    Ok(MigrationOutcome { from, to })
}

async fn apply(conn: &Connection, step: &Migration) -> Result<(), DatabaseError> {
    let fail = |stage: &str, e: libsql::Error| {
        DatabaseError::Migration(format!("V{} ({}) {stage}: {e}", step.version, step.name))
    };

    let tx = conn.transaction().await.map_err(|e| fail("begin", e))?;

    let body = async {
        tx.execute_batch(step.sql).await?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![step.version, step.name],
        )
        .await?;
        Ok::<_, libsql::Error>(())
    }
    .await;

    match body {
        Ok(()) => tx.commit().await.map_err(|e| fail("commit", e)),
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, version = step.version, "Rollback failed");
            }
            Err(fail("apply", e))
        }
    }
}

/// Highest applied version; 0 on a fresh database.
async fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Migration(format!("read schema version: {e}"));

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(read)?;
    match rows.next().await.map_err(read)? {
        Some(row) => row.get::<i64>(0).map_err(read),
        None => Ok(0),
    }
}
