//! salescache core - an offline-first cache-aside layer for a sales backend.
//!
//! Business entities (clients, products, orders, inventory, settings and so
//! on) are served from a persistent key-value store and refreshed from the
//! REST API on a miss or on request. Reads never fail; the worst case is the
//! entity's empty value.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod settings;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, EntityFetcher, FetchRequest};
pub use auth::{warm_up_all, Identity, LoginResult, Session, WarmUpReport};
pub use cache::{CacheManager, EntityKind, FetchOptions, FileStore, MemoryStore, StorageAdapter};
pub use config::Config;
pub use settings::{CategorizedSettings, SettingsCategory};
