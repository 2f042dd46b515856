use async_trait::async_trait;
use serde_json::Value;

use crate::auth::Identity;
use crate::cache::EntityKind;

use super::ApiError;

/// One remote read for an entity.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub kind: EntityKind,
    pub include_inactive: bool,
    /// Company and user the request is made for, if a session exists.
    pub identity: Option<Identity>,
}

/// Source of raw entity data for the cache.
///
/// Implementations return the raw JSON body; shape handling is the cache's job.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value, ApiError>;
}
