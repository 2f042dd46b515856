use thiserror::Error;

use crate::api::ApiError;

/// Failures inside a cache refresh. These never leave the cache manager;
/// callers always receive cached or empty data instead.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Fetch failed for {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: ApiError,
    },

    #[error("No session identity available for {key}")]
    MissingIdentity { key: String },
}

impl CacheError {
    pub fn fetch(key: &str, source: ApiError) -> Self {
        match source {
            ApiError::MissingIdentity => CacheError::MissingIdentity {
                key: key.to_string(),
            },
            source => CacheError::Fetch {
                key: key.to_string(),
                source,
            },
        }
    }
}
