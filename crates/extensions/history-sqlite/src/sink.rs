//! SQLite history sink implementation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use cronhands_core::{ExecutionRecord, ExecutionResult, FireOrigin, HistoryError, HistorySink};

use crate::schema::init_schema;

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;

const SELECT_COLUMNS: &str =
    "SELECT id, job_name, origin, started_at, completion_time, result FROM execution_history";

/// Raw row as stored.
type Row = (String, String, String, i64, i64, String);

/// SQLite-based history sink.
pub struct SqliteHistorySink {
    conn: Connection,
}

impl SqliteHistorySink {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open or create a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening history database at {}", path.display());
        let conn = Connection::open(path)
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;
        Ok(Self { conn })
    }

    async fn query(
        &self,
        job_name: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ExecutionRecord>, HistoryError> {
        let job_name = job_name.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                // rowid breaks ties between equal completion times.
                let sql = match limit {
                    Some(n) => format!(
                        "{} WHERE job_name = ?1 ORDER BY completion_time DESC, rowid DESC LIMIT {}",
                        SELECT_COLUMNS, n
                    ),
                    None => format!(
                        "{} WHERE job_name = ?1 ORDER BY completion_time DESC, rowid DESC",
                        SELECT_COLUMNS
                    ),
                };
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([&job_name], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<Row>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        rows.into_iter().map(decode).collect()
    }
}

#[async_trait]
impl HistorySink for SqliteHistorySink {
    async fn append(&self, record: &ExecutionRecord) -> Result<(), HistoryError> {
        let id = record.id.to_string();
        let job_name = record.job_name.clone();
        let origin = record.origin.as_str();
        let started_at = record.started_at.timestamp_micros();
        let completion_time = record.completion_time.timestamp_micros();
        let result = record.result.as_str();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO execution_history
                     (id, job_name, origin, started_at, completion_time, result)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![id, job_name, origin, started_at, completion_time, result],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))
    }

    async fn most_recent_by_job(
        &self,
        job_name: &str,
    ) -> Result<Option<ExecutionRecord>, HistoryError> {
        Ok(self.query(job_name, Some(1)).await?.into_iter().next())
    }

    async fn list_by_job(&self, job_name: &str) -> Result<Vec<ExecutionRecord>, HistoryError> {
        self.query(job_name, None).await
    }

    async fn delete_all_by_job(&self, job_name: &str) -> Result<u64, HistoryError> {
        let job_name = job_name.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM execution_history WHERE job_name = ?1",
                    [&job_name],
                )?;
                Ok(n)
            })
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(removed as u64)
    }
}

fn decode(row: Row) -> Result<ExecutionRecord, HistoryError> {
    let (id, job_name, origin, started_at, completion_time, result) = row;

    let id = Uuid::parse_str(&id)
        .map_err(|e| HistoryError::Corrupt(format!("bad id '{}': {}", id, e)))?;
    let origin = FireOrigin::parse(&origin)
        .ok_or_else(|| HistoryError::Corrupt(format!("bad origin '{}'", origin)))?;
    let result = ExecutionResult::parse(&result)
        .ok_or_else(|| HistoryError::Corrupt(format!("bad result '{}'", result)))?;

    Ok(ExecutionRecord {
        id,
        job_name,
        origin,
        started_at: from_micros(started_at)?,
        completion_time: from_micros(completion_time)?,
        result,
    })
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| HistoryError::Corrupt(format!("timestamp out of range: {}", micros)))
}
