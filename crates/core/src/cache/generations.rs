//! Cache generation management.
//!
//! A generation is one versioned snapshot of the cache, labeled by the
//! application build that seeded it. Exactly one generation is "current"
//! once activation completes; the pointer lives in the meta table and is
//! written only by the lifecycle manager.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

const CURRENT_GENERATION_KEY: &str = "current_generation";

impl CacheDb {
    /// Open a generation, creating it if absent. Idempotent.
    pub async fn open_generation(&self, label: &str) -> Result<(), Error> {
        let label = label.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (label, created_at) VALUES (?1, ?2)",
                    params![label, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List all stored generation labels.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT label FROM generations ORDER BY label")?;
                let labels = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(labels)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a generation and all its artifacts.
    ///
    /// The current generation is defended: asking to evict it is a no-op
    /// even though callers must never do so. Returns whether a row was
    /// actually deleted.
    pub async fn evict_generation(&self, label: &str) -> Result<bool, Error> {
        let label = label.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM generations
                     WHERE label = ?1
                     AND label IS NOT (SELECT value FROM meta WHERE key = ?2)",
                    params![label, CURRENT_GENERATION_KEY],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Persist the current-generation pointer.
    ///
    /// Only the lifecycle manager writes this, during activation.
    pub async fn set_current_generation(&self, label: &str) -> Result<(), Error> {
        let label = label.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![CURRENT_GENERATION_KEY, label],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Read the current-generation pointer, if activation has set one.
    pub async fn current_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = ?1")?;
                let mut rows = stmt.query_map(params![CURRENT_GENERATION_KEY], |row| row.get::<_, String>(0))?;
                match rows.next() {
                    Some(value) => Ok(Some(value?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }
}
