//! Heartbeat API client for the tracker.
//!
//! Posts heartbeats one at a time to a WakaTime-compatible endpoint:
//! `POST {api_url}/users/current/heartbeats` with a bearer token.
//! Failures are reported to the caller; nothing is retried here.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use ht_core::Heartbeat;
use thiserror::Error;

/// Default heartbeat endpoint base URL.
pub const DEFAULT_API_URL: &str = "https://hackatime.hackclub.com/api/v1";

/// Default request timeout for a single heartbeat.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const HEARTBEATS_PATH: &str = "users/current/heartbeats";

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed (connection, timeout, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The API answered with a non-2xx status.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Where heartbeats go and how to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiTarget {
    api_url: String,
    api_key: String,
}

impl fmt::Debug for ApiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTarget")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ApiTarget {
    /// Creates a target after validating the API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or whitespace-only.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let api_key = api_key.into();

        if api_key.is_empty() {
            return Err(TransportError::InvalidApiKey {
                reason: "API key cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(TransportError::InvalidApiKey {
                reason: "API key cannot be whitespace-only",
            });
        }

        Ok(Self {
            api_url: api_url.into(),
            api_key,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Full URL heartbeats are posted to.
    pub fn heartbeats_url(&self) -> String {
        format!("{}/{HEARTBEATS_PATH}", self.api_url.trim_end_matches('/'))
    }
}

/// Anything that can deliver a single heartbeat.
///
/// Implementations must bound the time spent on one heartbeat; the dispatcher
/// awaits each send in turn.
pub trait HeartbeatTransport: Send + Sync + 'static {
    fn send(
        &self,
        target: &ApiTarget,
        heartbeat: &Heartbeat,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// HTTP heartbeat client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
}

impl Client {
    /// Creates a client with the default 10 second timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a client whose requests are abandoned after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;

        Ok(Self { http })
    }
}

impl HeartbeatTransport for Client {
    async fn send(&self, target: &ApiTarget, heartbeat: &Heartbeat) -> Result<(), TransportError> {
        let response = self
            .http
            .post(target.heartbeats_url())
            .bearer_auth(&target.api_key)
            .header(reqwest::header::USER_AGENT, heartbeat.plugin())
            .json(heartbeat)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(entity = heartbeat.entity(), %status, "heartbeat accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use ht_core::HeartbeatBuilder;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_heartbeat() -> Heartbeat {
        HeartbeatBuilder::new("/repo/src/app.py")
            .time(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
            .project("repo")
            .language(Some("Python".to_string()))
            .lines(Some(10))
            .plugin("ht-test-agent")
            .build()
    }

    #[test]
    fn test_target_rejects_empty_api_key() {
        assert!(matches!(
            ApiTarget::new(DEFAULT_API_URL, ""),
            Err(TransportError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn test_target_rejects_whitespace_api_key() {
        assert!(matches!(
            ApiTarget::new(DEFAULT_API_URL, "   "),
            Err(TransportError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn test_target_debug_redacts_api_key() {
        let target = ApiTarget::new(DEFAULT_API_URL, "secret-key").unwrap();
        let debug = format!("{target:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_heartbeats_url_handles_trailing_slash() {
        let a = ApiTarget::new("https://example.test/api/v1/", "k").unwrap();
        let b = ApiTarget::new("https://example.test/api/v1", "k").unwrap();
        assert_eq!(
            a.heartbeats_url(),
            "https://example.test/api/v1/users/current/heartbeats"
        );
        assert_eq!(a.heartbeats_url(), b.heartbeats_url());
    }

    #[tokio::test]
    async fn test_send_posts_heartbeat_with_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/users/current/heartbeats"))
            .and(header("authorization", "Bearer waka_123"))
            .and(header("user-agent", "ht-test-agent"))
            .and(body_partial_json(serde_json::json!({
                "entity": "/repo/src/app.py",
                "category": "coding",
                "language": "Python",
                "lineno": 10,
                "cursorpos": 0,
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let target = ApiTarget::new(format!("{}/api/v1", server.uri()), "waka_123").unwrap();
        let client = Client::new().unwrap();
        client.send(&target, &sample_heartbeat()).await.unwrap();
    }

    #[tokio::test]
    async fn test_any_2xx_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let target = ApiTarget::new(server.uri(), "k").unwrap();
        assert!(Client::new().unwrap().send(&target, &sample_heartbeat()).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_2xx_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let target = ApiTarget::new(server.uri(), "k").unwrap();
        let err = Client::new()
            .unwrap()
            .send(&target, &sample_heartbeat())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Status { status: 401, ref body } if body == "bad key"
        ));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let target = ApiTarget::new(server.uri(), "k").unwrap();
        let client = Client::with_timeout(Duration::from_millis(100)).unwrap();
        let err = client.send(&target, &sample_heartbeat()).await.unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }
}
