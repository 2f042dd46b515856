//! Session lifecycle and post-login bootstrap.
//!
//! This module provides:
//! - `Session`: identity accessors backed directly by storage
//! - `warm_up_all`: concurrent force refresh of every cached entity

pub mod bootstrap;
pub mod session;

pub use bootstrap::{warm_up_all, WarmUpReport};
pub use session::{Identity, LoginResult, Session, SessionData};
