use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::storage::{KeyValueStore, StorageAdapter};
use crate::models::UserData;

/// Storage key for the logged-in user profile.
pub const USER_DATA_KEY: &str = "userData";

/// Storage key for the company name (stored as a plain string).
pub const COMPANY_NAME_KEY: &str = "companyName";

/// Storage key for the auth token and login time.
pub const SESSION_KEY: &str = "session";

/// Company and user a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub company_name: String,
    pub user_uuid: String,
    pub user_role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Everything a successful login hands back.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub session: SessionData,
    pub user: UserData,
    pub company_name: String,
}

/// Read-only identity accessors plus the login/logout lifecycle.
///
/// Nothing is held in memory: every accessor reads storage, so the session
/// always reflects what the cache has persisted.
pub struct Session<S: KeyValueStore> {
    storage: StorageAdapter<S>,
}

impl<S: KeyValueStore> Clone for Session<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(storage: StorageAdapter<S>) -> Self {
        Self { storage }
    }

    /// Persist a login result, returning whether every part was stored.
    ///
    /// A partial write is rolled back so no half-written identity survives.
    pub fn begin(&self, login: &LoginResult) -> bool {
        let stored = self.storage.write_json(SESSION_KEY, &login.session)
            && self.storage.write_json(USER_DATA_KEY, &login.user)
            && self.storage.write(COMPANY_NAME_KEY, &login.company_name);

        if !stored {
            for key in [SESSION_KEY, USER_DATA_KEY, COMPANY_NAME_KEY] {
                self.storage.remove(key);
            }
            warn!(username = %login.session.username, "Session could not be persisted");
            return false;
        }

        info!(username = %login.session.username, company = %login.company_name, "Session started");
        true
    }

    /// Clear every persisted key, cached entities included.
    pub fn logout(&self) {
        self.storage.clear_all();
        info!("Session ended, storage cleared");
    }

    pub fn data(&self) -> Option<SessionData> {
        let value = self.storage.read_json(SESSION_KEY)?;
        serde_json::from_value(value).ok()
    }

    pub fn token(&self) -> Option<String> {
        self.data().map(|d| d.token)
    }

    pub fn user_data(&self) -> Option<UserData> {
        let value = self.storage.read_json(USER_DATA_KEY)?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Company name, tolerating a JSON-quoted value from older writers.
    pub fn company_name(&self) -> Option<String> {
        let raw = self.storage.read(COMPANY_NAME_KEY)?;
        let name = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::String(s)) => s,
            _ => raw,
        };
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub fn user_uuid(&self) -> Option<String> {
        self.user_data()?.users_uuid.filter(|s| !s.is_empty())
    }

    pub fn user_role(&self) -> Option<String> {
        self.user_data()?.users_role.filter(|s| !s.is_empty())
    }

    /// Identity for building request URLs; needs both company and user.
    pub fn identity(&self) -> Option<Identity> {
        Some(Identity {
            company_name: self.company_name()?,
            user_uuid: self.user_uuid()?,
            user_role: self.user_role(),
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some() && self.identity().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::MemoryStore;
    use serde_json::json;

    fn session() -> Session<MemoryStore> {
        Session::new(StorageAdapter::new(MemoryStore::new()))
    }

    fn login() -> LoginResult {
        LoginResult {
            session: SessionData {
                token: "tok".to_string(),
                username: "rep@acme".to_string(),
                created_at: Utc::now(),
            },
            user: serde_json::from_value(json!({"users_uuid": "u-42", "users_role": "admin"}))
                .unwrap(),
            company_name: "acme".to_string(),
        }
    }

    #[test]
    fn test_accessors_after_login() {
        let session = session();
        assert!(session.begin(&login()));
        assert_eq!(session.company_name().as_deref(), Some("acme"));
        assert_eq!(session.user_uuid().as_deref(), Some("u-42"));
        assert_eq!(session.user_role().as_deref(), Some("admin"));
        assert_eq!(session.token().as_deref(), Some("tok"));
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_accessors_without_session_return_none() {
        let session = session();
        assert_eq!(session.company_name(), None);
        assert_eq!(session.user_uuid(), None);
        assert_eq!(session.user_role(), None);
        assert_eq!(session.identity(), None);
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_malformed_user_data_reads_as_absent() {
        let session = session();
        session.storage.write(USER_DATA_KEY, "{broken");
        session.storage.write(COMPANY_NAME_KEY, "acme");
        assert_eq!(session.user_uuid(), None);
        assert_eq!(session.identity(), None);

        session.storage.write(USER_DATA_KEY, "[1, 2]");
        assert_eq!(session.user_role(), None);
    }

    #[test]
    fn test_company_name_accepts_quoted_string() {
        let session = session();
        session.storage.write(COMPANY_NAME_KEY, "\"acme\"");
        assert_eq!(session.company_name().as_deref(), Some("acme"));
    }

    #[test]
    fn test_begin_on_full_storage_leaves_no_partial_identity() {
        let session = Session::new(StorageAdapter::new(MemoryStore::with_capacity_bytes(60)));

        assert!(!session.begin(&login()));
        assert!(session.storage.keys().is_empty());
        assert_eq!(session.token(), None);
        assert_eq!(session.user_uuid(), None);
        assert_eq!(session.company_name(), None);
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_logout_clears_everything() {
        let session = session();
        session.begin(&login());
        session.storage.write("appClients", "[]");
        session.logout();
        assert!(session.storage.keys().is_empty());
        assert_eq!(session.identity(), None);
    }
}
