//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// Timestamps are stored as microseconds since the Unix epoch.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS execution_history (
    id TEXT PRIMARY KEY,
    job_name TEXT NOT NULL,
    origin TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    completion_time INTEGER NOT NULL,
    result TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_job
    ON execution_history(job_name, completion_time);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='execution_history'",
            )
            .unwrap();
        assert!(stmt.exists([]).unwrap());
    }

    #[test]
    fn test_schema_is_reentrant() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
