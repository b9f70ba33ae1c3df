use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::traits::{AnalyticsSink, ExecutionStore};
use weft_core::types::{
    AgentMetricEvent, ExecutionId, ExecutionMetrics, ExecutionPatch, ExecutionRecord,
    ExecutionStatus,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS executions (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        status TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT,
        progress INTEGER NOT NULL DEFAULT 0,
        current_node TEXT,
        metrics TEXT NOT NULL,
        error_details TEXT,
        owner_id TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_executions_owner
        ON executions(owner_id, start_time);

    CREATE TABLE IF NOT EXISTS agent_metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_id TEXT NOT NULL,
        outcome TEXT NOT NULL,
        response_time_ms INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_agent_metrics_agent
        ON agent_metrics(agent_id, timestamp);";

/// SQLite-backed execution record store.
///
/// Also serves as the analytics sink, appending agent metric events to a
/// separate table. Timestamps are stored as RFC 3339 text; metrics as JSON.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WeftError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| WeftError::Database(e.to_string()))?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| WeftError::Database(e.to_string()))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| WeftError::Database(e.to_string()))?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| WeftError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| WeftError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn row_to_raw(
    row: &Row<'_>,
) -> rusqlite::Result<(
    String,
    String,
    String,
    String,
    Option<String>,
    u8,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WeftError::Database(format!("Bad timestamp '{}': {}", s, e)))
}

#[allow(clippy::type_complexity)]
fn raw_to_record(
    raw: (
        String,
        String,
        String,
        String,
        Option<String>,
        u8,
        Option<String>,
        String,
        Option<String>,
        String,
        String,
    ),
) -> Result<ExecutionRecord> {
    let (
        id,
        workflow_id,
        status,
        start_time,
        end_time,
        progress,
        current_node,
        metrics,
        error_details,
        owner_id,
        updated_at,
    ) = raw;

    let metrics: ExecutionMetrics = serde_json::from_str(&metrics)?;

    Ok(ExecutionRecord {
        id: ExecutionId::from_string(&id),
        workflow_id,
        status: ExecutionStatus::from_str(&status)?,
        start_time: parse_timestamp(&start_time)?,
        end_time: end_time.as_deref().map(parse_timestamp).transpose()?,
        progress,
        current_node,
        metrics,
        error_details,
        owner_id,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const SELECT_COLUMNS: &str = "id, workflow_id, status, start_time, end_time, progress, \
     current_node, metrics, error_details, owner_id, updated_at";

impl ExecutionStore for SqliteStore {
    fn insert(&self, record: &ExecutionRecord) -> BoxFuture<'_, Result<()>> {
        let record = record.clone();

        Box::pin(async move {
            let metrics = serde_json::to_string(&record.metrics)?;
            let conn = self
                .conn
                .lock()
                .map_err(|e| WeftError::Database(e.to_string()))?;

            conn.execute(
                "INSERT INTO executions (id, workflow_id, status, start_time, end_time,
                     progress, current_node, metrics, error_details, owner_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id.0,
                    record.workflow_id,
                    record.status.as_str(),
                    record.start_time.to_rfc3339(),
                    record.end_time.map(|t| t.to_rfc3339()),
                    record.progress,
                    record.current_node,
                    metrics,
                    record.error_details,
                    record.owner_id,
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| WeftError::Database(e.to_string()))?;

            Ok(())
        })
    }

    fn update(&self, id: &ExecutionId, patch: &ExecutionPatch) -> BoxFuture<'_, Result<()>> {
        let id = id.0.clone();
        let patch = patch.clone();

        Box::pin(async move {
            let mut sets: Vec<&str> = vec!["updated_at = ?"];
            let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(Utc::now().to_rfc3339())];

            if let Some(status) = patch.status {
                sets.push("status = ?");
                values.push(Box::new(status.as_str()));
            }
            if let Some(progress) = patch.progress {
                sets.push("progress = ?");
                values.push(Box::new(progress));
            }
            if let Some(current_node) = patch.current_node {
                sets.push("current_node = ?");
                values.push(Box::new(current_node));
            }
            if let Some(end_time) = patch.end_time {
                sets.push("end_time = ?");
                values.push(Box::new(end_time.to_rfc3339()));
            }
            if let Some(metrics) = patch.metrics {
                sets.push("metrics = ?");
                values.push(Box::new(serde_json::to_string(&metrics)?));
            }
            if let Some(error_details) = patch.error_details {
                sets.push("error_details = ?");
                values.push(Box::new(error_details));
            }

            let sql = format!("UPDATE executions SET {} WHERE id = ?", sets.join(", "));
            values.push(Box::new(id.clone()));

            let conn = self
                .conn
                .lock()
                .map_err(|e| WeftError::Database(e.to_string()))?;

            let changed = conn
                .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))
                .map_err(|e| WeftError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(WeftError::NotFound(id));
            }
            Ok(())
        })
    }

    fn get(
        &self,
        id: &ExecutionId,
        owner: &str,
    ) -> BoxFuture<'_, Result<Option<ExecutionRecord>>> {
        let id = id.0.clone();
        let owner = owner.to_string();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| WeftError::Database(e.to_string()))?;

            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM executions WHERE id = ?1 AND owner_id = ?2",
                        SELECT_COLUMNS
                    ),
                    params![id, owner],
                    row_to_raw,
                )
                .optional()
                .map_err(|e| WeftError::Database(e.to_string()))?;

            raw.map(raw_to_record).transpose()
        })
    }

    fn list(&self, owner: &str) -> BoxFuture<'_, Result<Vec<ExecutionRecord>>> {
        let owner = owner.to_string();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| WeftError::Database(e.to_string()))?;

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM executions
                     WHERE owner_id = ?1
                     ORDER BY start_time DESC",
                    SELECT_COLUMNS
                ))
                .map_err(|e| WeftError::Database(e.to_string()))?;

            let rows = stmt
                .query_map(params![owner], row_to_raw)
                .map_err(|e| WeftError::Database(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| WeftError::Database(e.to_string()))?;
                records.push(raw_to_record(raw)?);
            }
            Ok(records)
        })
    }
}

impl AnalyticsSink for SqliteStore {
    fn record(&self, event: AgentMetricEvent) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| WeftError::Database(e.to_string()))?;

            conn.execute(
                "INSERT INTO agent_metrics (agent_id, outcome, response_time_ms, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.agent_id,
                    event.outcome.as_str(),
                    event.response_time_ms,
                    event.timestamp.to_rfc3339(),
                ],
            )
            .map_err(|e| WeftError::Database(e.to_string()))?;

            Ok(())
        })
    }
}
