//! Cache-aside layer over the persistent key-value store.
//!
//! This module provides the `CacheManager` that serves every business entity
//! from local storage, refreshing from the API on a miss or when forced.
//! Reads never fail: a broken network or a full store degrades to cached or
//! empty data.
//!
//! Per-entity behavior (storage key, response shapes, empty handling, cache
//! validity) lives in the `EntityPolicy` table in `entity`.

pub mod entity;
pub mod error;
pub mod manager;
pub mod normalize;
pub mod storage;

pub use entity::{EmptyPolicy, EntityKind, EntityPolicy, EntityShape};
pub use error::CacheError;
pub use manager::{CacheManager, FetchOptions};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageAdapter, StoreError};
