//! API client for the sales backend REST API.
//!
//! Every response wraps its payload in a `{status, message, data}` envelope.
//! The client checks the envelope but hands the raw body to the cache, which
//! owns shape handling for each entity.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{Identity, LoginResult, SessionData};
use crate::models::UserData;

use super::{ApiError, EntityFetcher, FetchRequest};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout used when the config does not set one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
    #[serde(alias = "userData")]
    user: UserData,
    #[serde(alias = "companyName", alias = "company")]
    company_name: String,
}

/// API client for the sales backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    /// Log in and return everything the session needs to persist.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<LoginResult, ApiError> {
        let url = format!("{}/auth/login", self.base_url);
        let body = serde_json::json!({ "username": username, "password": password });

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let raw: Value = response.json().await?;
        check_envelope(&raw)?;

        let login: LoginEnvelope = serde_json::from_value(raw)
            .map_err(|e| ApiError::InvalidResponse(format!("Unexpected login response: {}", e)))?;

        Ok(LoginResult {
            session: SessionData {
                token: login.data.token,
                username: username.to_string(),
                created_at: Utc::now(),
            },
            user: login.data.user,
            company_name: login.data.company_name,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .authorize(self.client.get(url).query(query))
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}

/// Entity URL under the company root.
fn entity_url(base_url: &str, identity: &Identity, endpoint: &str) -> String {
    format!("{}/{}/{}", base_url, identity.company_name, endpoint)
}

fn entity_query(identity: &Identity, include_inactive: bool) -> Vec<(&'static str, String)> {
    let mut query = vec![("users_uuid", identity.user_uuid.clone())];
    if include_inactive {
        query.push(("include_inactive", "1".to_string()));
    }
    query
}

/// Reject envelopes the server marked as failed even under a 2xx status.
fn check_envelope(body: &Value) -> Result<(), ApiError> {
    let failed = match body.get("status") {
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "error" | "fail" | "failed"),
        Some(Value::Bool(ok)) => !ok,
        _ => false,
    };
    if failed {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(ApiError::Rejected(message.to_string()));
    }
    Ok(())
}

#[async_trait]
impl EntityFetcher for ApiClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value, ApiError> {
        let endpoint = request
            .kind
            .endpoint()
            .ok_or_else(|| ApiError::NoEndpoint(request.kind.to_string()))?;
        let identity = request.identity.as_ref().ok_or(ApiError::MissingIdentity)?;

        let url = entity_url(&self.base_url, identity, endpoint);
        debug!(url = %url, entity = %request.kind, "Fetching");

        let body = self
            .get(&url, &entity_query(identity, request.include_inactive))
            .await?;
        check_envelope(&body)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntityKind;
    use serde_json::json;

    fn identity() -> Identity {
        Identity {
            company_name: "acme".to_string(),
            user_uuid: "u-1".to_string(),
            user_role: None,
        }
    }

    #[test]
    fn test_entity_url_and_query() {
        let url = entity_url("https://api.example.test/v1", &identity(), "clients");
        assert_eq!(url, "https://api.example.test/v1/acme/clients");

        let query = entity_query(&identity(), false);
        assert_eq!(query, vec![("users_uuid", "u-1".to_string())]);

        let query = entity_query(&identity(), true);
        assert_eq!(query[1], ("include_inactive", "1".to_string()));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("https://api.example.test/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://api.example.test");
    }

    #[test]
    fn test_check_envelope() {
        assert!(check_envelope(&json!({"status": "success", "data": []})).is_ok());
        assert!(check_envelope(&json!([1, 2])).is_ok());
        assert!(check_envelope(&json!({"status": true})).is_ok());

        let err = check_envelope(&json!({"status": "error", "message": "bad company"})).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "bad company"));
        assert!(check_envelope(&json!({"status": false})).is_err());
    }

    #[test]
    fn test_login_envelope_parses() {
        let raw = json!({
            "status": "success",
            "data": {
                "token": "abc",
                "user": {"users_uuid": "u-9", "users_role": "rep"},
                "companyName": "acme"
            }
        });
        let login: LoginEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(login.data.token, "abc");
        assert_eq!(login.data.company_name, "acme");
        assert_eq!(login.data.user.users_uuid.as_deref(), Some("u-9"));
    }

    #[tokio::test]
    async fn test_fetch_without_identity_fails_fast() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let request = FetchRequest {
            kind: EntityKind::Clients,
            include_inactive: false,
            identity: None,
        };
        assert!(matches!(client.fetch(&request).await, Err(ApiError::MissingIdentity)));
    }

    #[tokio::test]
    async fn test_fetch_derived_entity_has_no_endpoint() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let request = FetchRequest {
            kind: EntityKind::CategorizedSettings,
            include_inactive: false,
            identity: Some(identity()),
        };
        assert!(matches!(client.fetch(&request).await, Err(ApiError::NoEndpoint(_))));
    }
}
