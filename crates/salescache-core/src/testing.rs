//! Scripted fetcher and fixtures for cache tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::api::{ApiError, EntityFetcher, FetchRequest};
use crate::auth::{LoginResult, Session, SessionData};
use crate::cache::storage::{MemoryStore, StorageAdapter};
use crate::cache::{CacheManager, EntityKind};

#[derive(Debug, Clone)]
enum Scripted {
    Respond(Value),
    Fail,
    MissingIdentity,
}

/// Fetcher answering from a per-entity script and recording every call.
/// Unscripted entities fail like an unreachable server.
#[derive(Default)]
pub struct MockFetcher {
    script: Mutex<HashMap<EntityKind, Scripted>>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, kind: EntityKind, body: Value) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(kind, Scripted::Respond(body));
        self
    }

    pub fn fail(self, kind: EntityKind) -> Self {
        self.script.lock().unwrap().insert(kind, Scripted::Fail);
        self
    }

    pub fn without_identity(self, kind: EntityKind) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(kind, Scripted::MissingIdentity);
        self
    }

    pub fn calls(&self, kind: EntityKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_request(&self, kind: EntityKind) -> Option<FetchRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.kind == kind)
            .cloned()
    }
}

#[async_trait]
impl EntityFetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(request.clone());
        let scripted = self.script.lock().unwrap().get(&request.kind).cloned();
        match scripted {
            Some(Scripted::Respond(body)) => Ok(body),
            Some(Scripted::MissingIdentity) => Err(ApiError::MissingIdentity),
            Some(Scripted::Fail) | None => Err(ApiError::ServerError("unreachable".to_string())),
        }
    }
}

pub fn login_result() -> LoginResult {
    LoginResult {
        session: SessionData {
            token: "test-token".to_string(),
            username: "rep@acme.test".to_string(),
            created_at: Utc::now(),
        },
        user: serde_json::from_value(json!({"users_uuid": "u-1", "users_role": "rep"}))
            .unwrap(),
        company_name: "acme".to_string(),
    }
}

/// Manager over a fresh memory store with a logged-in session.
pub fn manager(fetcher: MockFetcher) -> CacheManager<MemoryStore, MockFetcher> {
    manager_with_store(MemoryStore::new(), fetcher)
}

pub fn manager_with_store(
    store: MemoryStore,
    fetcher: MockFetcher,
) -> CacheManager<MemoryStore, MockFetcher> {
    let storage = StorageAdapter::new(store);
    Session::new(storage.clone()).begin(&login_result());
    CacheManager::new(storage, fetcher)
}
