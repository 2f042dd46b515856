//! Data models shared across the cache, session and API layers.
//!
//! Business records themselves stay as raw JSON (`serde_json::Value`); only
//! the structures the cache interprets are typed here:
//!
//! - `UserData`: the logged-in user profile used for identity
//! - `Setting`: one application setting row
//! - `DataEnvelope`: the `{data: [...]}` wrapper some entities are served in

pub mod envelope;
pub mod setting;
pub mod user;

pub use envelope::DataEnvelope;
pub use setting::Setting;
pub use user::UserData;
