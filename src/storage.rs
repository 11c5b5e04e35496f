use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::campaign::{DeliveryStatus, Job, JobId, UnixTimeMs};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Backend(String),

    #[error("corrupted row for job {id}: {reason}")]
    CorruptedRow { id: u64, reason: String },
}

/// Durable record of send jobs for native shells. One row per job; the
/// status column is a constrained enumeration, never free text.
#[async_trait::async_trait]
pub trait JobStorage: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Job>, StorageError>;
    /// Persist a whole batch atomically; a reader never sees part of it.
    async fn insert_batch(&self, jobs: &[Job]) -> Result<(), StorageError>;
    async fn update_status(
        &self,
        id: JobId,
        status: DeliveryStatus,
        updated_at: UnixTimeMs,
    ) -> Result<(), StorageError>;
    async fn clear_all(&self) -> Result<(), StorageError>;
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Volatile storage for tests and the web shell.
#[derive(Default)]
pub struct MemoryStorage {
    rows: Mutex<BTreeMap<u64, Job>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl JobStorage for MemoryStorage {
    async fn load_all(&self) -> Result<Vec<Job>, StorageError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().cloned().collect())
    }

    async fn insert_batch(&self, jobs: &[Job]) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().await;
        for job in jobs {
            rows.insert(job.id.0, job.clone());
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: JobId,
        status: DeliveryStatus,
        updated_at: UnixTimeMs,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().await;
        if let Some(job) = rows.get_mut(&id.0) {
            job.status = status;
            job.updated_at = updated_at;
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        self.rows.lock().await.clear();
        Ok(())
    }
}

// ============================================================================
// SQLite storage (native shells only)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use sqlite::SqliteStorage;

#[cfg(not(target_arch = "wasm32"))]
mod sqlite {
    use super::*;
    use rusqlite::{params, Connection};
    use std::path::Path;

    /// SQLite-backed job storage. Connection access is serialized behind an
    /// async mutex; individual statements are cheap.
    pub struct SqliteStorage {
        conn: Mutex<Connection>,
    }

    impl SqliteStorage {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
            let conn = Connection::open(path).map_err(|e| StorageError::Backend(e.to_string()))?;
            Self::with_connection(conn)
        }

        pub fn open_in_memory() -> Result<Self, StorageError> {
            let conn =
                Connection::open_in_memory().map_err(|e| StorageError::Backend(e.to_string()))?;
            Self::with_connection(conn)
        }

        fn with_connection(conn: Connection) -> Result<Self, StorageError> {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS jobs (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    destination TEXT NOT NULL,
                    message TEXT NOT NULL,
                    status TEXT NOT NULL CHECK (status IN ('pendente', 'enviado', 'erro')),
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
                "#,
            )
            .map_err(|e| StorageError::Backend(e.to_string()))?;

            Ok(Self {
                conn: Mutex::new(conn),
            })
        }
    }

    fn parse_status(raw: &str, id: u64) -> Result<DeliveryStatus, StorageError> {
        match raw {
            "pendente" => Ok(DeliveryStatus::Pending),
            "enviado" => Ok(DeliveryStatus::Sent),
            "erro" => Ok(DeliveryStatus::Error),
            other => Err(StorageError::CorruptedRow {
                id,
                reason: format!("unknown status {other:?}"),
            }),
        }
    }

    #[async_trait::async_trait]
    impl JobStorage for SqliteStorage {
        async fn load_all(&self) -> Result<Vec<Job>, StorageError> {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, destination, message, status, created_at, updated_at
                     FROM jobs ORDER BY id ASC",
                )
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                })
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            let mut jobs = Vec::new();
            for row in rows {
                let (id, name, destination, message, status, created_at, updated_at) =
                    row.map_err(|e| StorageError::Backend(e.to_string()))?;
                jobs.push(Job {
                    id: JobId(id as u64),
                    name,
                    destination,
                    message,
                    status: parse_status(&status, id as u64)?,
                    created_at: UnixTimeMs(created_at as u64),
                    updated_at: UnixTimeMs(updated_at as u64),
                });
            }
            Ok(jobs)
        }

        async fn insert_batch(&self, jobs: &[Job]) -> Result<(), StorageError> {
            let mut conn = self.conn.lock().await;
            let tx = conn
                .transaction()
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            for job in jobs {
                tx.execute(
                    "INSERT OR REPLACE INTO jobs
                     (id, name, destination, message, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        job.id.0 as i64,
                        job.name,
                        job.destination,
                        job.message,
                        job.status.label(),
                        job.created_at.0 as i64,
                        job.updated_at.0 as i64,
                    ],
                )
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            }

            tx.commit().map_err(|e| StorageError::Backend(e.to_string()))
        }

        async fn update_status(
            &self,
            id: JobId,
            status: DeliveryStatus,
            updated_at: UnixTimeMs,
        ) -> Result<(), StorageError> {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.label(), updated_at.0 as i64, id.0 as i64],
            )
            .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        }

        async fn clear_all(&self) -> Result<(), StorageError> {
            let conn = self.conn.lock().await;
            conn.execute("DELETE FROM jobs", [])
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        }
    }
}
