//! Test doubles for the network seam and the host environment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::error::AgentError;
use crate::host::{Bookmark, LocalStore, Note, NotificationRecord, NotificationSink, WindowClients};
use crate::lifecycle::Lifecycle;
use stowage_client::{FetchResponse, Network};
use stowage_core::Error;
use stowage_core::cache::CacheDb;

/// An in-memory network with a routing table and an access counter.
///
/// Unknown URLs answer 404; `go_offline` makes every request fail the way
/// an unreachable network does. Counters record attempts, not successes.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    offline: AtomicBool,
    gets: AtomicUsize,
    posts: AtomicUsize,
    posted: Mutex<Vec<serde_json::Value>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, status: u16, body: &[u8]) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_vec()));
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn posted_bodies(&self) -> Vec<serde_json::Value> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn get(&self, url: &Url) -> Result<FetchResponse, Error> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Http("network unreachable".to_string()));
        }

        let routed = self.routes.lock().unwrap().get(url.as_str()).cloned();
        match routed {
            Some((status, body)) => Ok(FetchResponse::synthetic(url.clone(), status, body)),
            None => Ok(FetchResponse::synthetic(url.clone(), 404, b"not found".to_vec())),
        }
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<FetchResponse, Error> {
        self.posts.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Http("network unreachable".to_string()));
        }

        self.posted.lock().unwrap().push(body.clone());
        Ok(FetchResponse::synthetic(url.clone(), 200, b"{}".to_vec()))
    }
}

/// Collects shown notifications for assertions.
#[derive(Default)]
pub(crate) struct CollectingSink {
    shown: Mutex<Vec<NotificationRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<NotificationRecord> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for CollectingSink {
    async fn show(&self, record: NotificationRecord) -> Result<(), AgentError> {
        self.shown.lock().unwrap().push(record);
        Ok(())
    }
}

/// Records claim and focus instructions.
#[derive(Default)]
pub(crate) struct RecordingWindows {
    claims: AtomicUsize,
    focused: Mutex<Vec<String>>,
}

impl RecordingWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }
}

#[async_trait]
impl WindowClients for RecordingWindows {
    async fn claim(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }

    async fn focus_or_open(&self, path: &str) {
        self.focused.lock().unwrap().push(path.to_string());
    }
}

/// A storage collaborator preloaded with fixed pending records.
#[derive(Default)]
pub(crate) struct StaticLocalStore {
    notes: Vec<Note>,
    bookmarks: Vec<Bookmark>,
}

impl StaticLocalStore {
    pub fn new(notes: Vec<Note>, bookmarks: Vec<Bookmark>) -> Self {
        Self { notes, bookmarks }
    }
}

#[async_trait]
impl LocalStore for StaticLocalStore {
    async fn pending_notes(&self) -> Vec<Note> {
        self.notes.clone()
    }

    async fn pending_bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.clone()
    }
}

/// A lifecycle instance taken straight to Active with an empty manifest.
pub(crate) async fn active_lifecycle(db: &CacheDb, network: &Arc<FakeNetwork>) -> Lifecycle<FakeNetwork> {
    let lc = Lifecycle::new(
        db.clone(),
        Arc::clone(network),
        Arc::new(RecordingWindows::new()),
        "v1".to_string(),
        Url::parse("https://app.example.com").unwrap(),
        Vec::new(),
    );
    lc.install().await.expect("install");
    lc.activate().await.expect("activate");
    lc
}
