//! Durable job queue backing the decay maintenance worker.
//!
//! SQLite-backed so queued jobs survive a process restart, same storage
//! choice as the relational store.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AttainedPrefix, CoreError, Result};

use super::{Queue, QueueJob};

fn store_err(operation: &'static str, source: rusqlite::Error) -> CoreError {
    CoreError::RelationalError { operation, source: Box::new(source), attained: AttainedPrefix::default() }
}

/// SQLite-backed durable queue; one table holds every job type.
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueue {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&db_path).map_err(|e| store_err("open", e))?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_err("open", e))?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS queue_jobs (
                id TEXT PRIMARY KEY,
                job_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                last_error TEXT,
                created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_queue_jobs_lease ON queue_jobs(job_type, status);",
        )
        .map_err(|e| store_err("migrate", e))
    }
}

#[async_trait]
impl Queue for SqliteQueue {
    async fn enqueue(&self, job_type: &str, payload: serde_json::Value, max_attempts: u32) -> Result<String> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO queue_jobs (id, job_type, payload, max_attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, job_type, payload.to_string(), max_attempts, chrono::Utc::now().timestamp_millis()],
        )
        .map_err(|e| store_err("enqueue", e))?;
        Ok(id)
    }

    async fn lease_next(&self, job_type: &str) -> Result<Option<QueueJob>> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let leased: Option<(String, String, u32, u32)> = conn
            .query_row(
                "SELECT id, payload, attempts, max_attempts FROM queue_jobs
                 WHERE job_type = ?1 AND status = 'pending'
                 ORDER BY created_at ASC LIMIT 1",
                params![job_type],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(|e| store_err("lease_next", e))?;

        let Some((id, payload_json, attempts, max_attempts)) = leased else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE queue_jobs SET status = 'leased', attempts = attempts + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(|e| store_err("lease_next", e))?;

        let payload = serde_json::from_str(&payload_json).unwrap_or(serde_json::Value::Null);
        Ok(Some(QueueJob { id, job_type: job_type.to_string(), payload, attempts: attempts + 1, max_attempts }))
    }

    async fn complete(&self, job_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        conn.execute("UPDATE queue_jobs SET status = 'done' WHERE id = ?1", params![job_id])
            .map_err(|e| store_err("complete", e))?;
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<()> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let (attempts, max_attempts): (u32, u32) = conn
            .query_row(
                "SELECT attempts, max_attempts FROM queue_jobs WHERE id = ?1",
                params![job_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| store_err("fail", e))?;

        let next_status = if attempts < max_attempts { "pending" } else { "failed" };
        conn.execute(
            "UPDATE queue_jobs SET status = ?1, last_error = ?2 WHERE id = ?3",
            params![next_status, error, job_id],
        )
        .map_err(|e| store_err("fail", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lease_then_complete() {
        let queue = SqliteQueue::open_in_memory().unwrap();
        queue.enqueue("decay", serde_json::json!({"tenant": "acme:support"}), 2).await.unwrap();

        let job = queue.lease_next("decay").await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        queue.complete(&job.id).await.unwrap();

        assert!(queue.lease_next("decay").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_job_requeues_until_max_attempts() {
        let queue = SqliteQueue::open_in_memory().unwrap();
        queue.enqueue("decay", serde_json::json!({}), 2).await.unwrap();

        let job = queue.lease_next("decay").await.unwrap().unwrap();
        queue.fail(&job.id, "boom").await.unwrap();

        let retried = queue.lease_next("decay").await.unwrap();
        assert!(retried.is_some());

        let retried = retried.unwrap();
        queue.fail(&retried.id, "boom again").await.unwrap();
        assert!(queue.lease_next("decay").await.unwrap().is_none());
    }
}
