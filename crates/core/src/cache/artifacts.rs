//! Response artifact storage.
//!
//! An artifact is an immutable snapshot of a network response taken at the
//! time it was fetched or seeded. Artifacts are never mutated in place,
//! only replaced wholesale by a later write to the same identity.

use super::connection::CacheDb;
use super::identity::request_identity;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached response snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseArtifact {
    pub identity: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl ResponseArtifact {
    /// Build an artifact from the parts of a fetched response.
    ///
    /// The identity is derived from method + URL and the storage timestamp
    /// is taken now. Admission (success-range status) is checked at write
    /// time, not here, so tests can construct rejectable artifacts.
    pub fn new(method: &str, url: &str, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            identity: request_identity(method, url),
            method: method.to_string(),
            url: url.to_string(),
            status,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether a response status is admissible into the store.
    pub fn admissible(status: u16) -> bool {
        (200..300).contains(&status)
    }
}

impl CacheDb {
    /// Write an artifact into a generation.
    ///
    /// Rejects artifacts outside the success range. Uses UPSERT semantics:
    /// a prior artifact at the same identity is overwritten wholesale.
    pub async fn put_artifact(&self, generation: &str, artifact: &ResponseArtifact) -> Result<(), Error> {
        if !ResponseArtifact::admissible(artifact.status) {
            return Err(Error::ArtifactRejected(artifact.status));
        }

        let generation = generation.to_string();
        let artifact = artifact.clone();
        let headers_json = serde_json::to_string(&artifact.headers).unwrap_or_else(|_| "[]".to_string());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO artifacts (
                        generation, identity, method, url, status, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(generation, identity) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &generation,
                        &artifact.identity,
                        &artifact.method,
                        &artifact.url,
                        artifact.status,
                        &headers_json,
                        &artifact.body,
                        &artifact.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an artifact by identity within a generation.
    ///
    /// Pure read; returns None on a miss.
    pub async fn lookup_artifact(&self, generation: &str, identity: &str) -> Result<Option<ResponseArtifact>, Error> {
        let generation = generation.to_string();
        let identity = identity.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseArtifact>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT identity, method, url, status, headers_json, body, stored_at
                     FROM artifacts WHERE generation = ?1 AND identity = ?2",
                )?;

                let result = stmt.query_row(params![generation, identity], |row| {
                    let headers_json: String = row.get(4)?;
                    Ok(ResponseArtifact {
                        identity: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status: row.get(3)?,
                        headers: serde_json::from_str(&headers_json).unwrap_or_default(),
                        body: row.get(5)?,
                        stored_at: row.get(6)?,
                    })
                });

                match result {
                    Ok(a) => Ok(Some(a)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether an identity is present in a generation.
    pub async fn contains_artifact(&self, generation: &str, identity: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        let identity = identity.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let present: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM artifacts WHERE generation = ?1 AND identity = ?2)",
                        params![generation, identity],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(present)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of artifacts held by a generation.
    pub async fn count_artifacts(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM artifacts WHERE generation = ?1",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
