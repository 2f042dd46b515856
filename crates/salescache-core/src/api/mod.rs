//! REST API client module for the sales backend.
//!
//! This module provides the `ApiClient` that fetches raw entity payloads
//! for the cache, and the `EntityFetcher` seam the cache depends on.
//!
//! The API uses bearer token authentication obtained through the
//! `auth/login` endpoint.

pub mod client;
pub mod error;
pub mod fetcher;

pub use client::ApiClient;
pub use error::ApiError;
pub use fetcher::{EntityFetcher, FetchRequest};
