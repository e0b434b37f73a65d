//! Authenticated API client.
//!
//! Every request except the public auth endpoints carries the stored access
//! token as a bearer credential. A 401 triggers at most one refresh and one
//! retry per request. Only one refresh may be in flight at a time; requests
//! that hit a 401 while another refresh is running fail immediately instead
//! of waiting for it.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::tokens::{TokenPair, TokenStore};
use crate::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};

/// Paths that never carry a bearer credential (matched by prefix).
pub const PUBLIC_AUTH_PATHS: [&str; 4] = [
    "/auth/token",
    "/auth/refresh",
    "/auth/register",
    "/auth/verify-email",
];

pub const REFRESH_PATH: &str = "/auth/refresh";

pub fn is_public_auth_path(path: &str) -> bool {
    PUBLIC_AUTH_PATHS.iter().any(|prefix| path.starts_with(prefix))
}

/// Invoked when the refresh token is rejected and the operator has to sign
/// in again.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Default redirect: log and let the caller handle the rejected outcome.
#[derive(Debug, Default)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        tracing::warn!("Session expired, login required");
    }
}

/// Clears the in-flight flag however the refresh ends.
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// HTTP client with bearer attachment and single-flight token refresh.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    redirect: Arc<dyn LoginRedirect>,
    refreshing: AtomicBool,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            redirect: Arc::new(LogRedirect),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Client over the reqwest transport.
    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), tokens))
    }

    pub fn with_login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Send a request, recovering once from an expired access token.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        match self.dispatch(&request).await {
            Err(err @ ClientError::Unauthorized(_)) => self.recover(request, err).await,
            outcome => outcome,
        }
    }

    /// Send a request and decode a JSON response body.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        self.execute(request).await?.json()
    }

    fn authorize(&self, request: &mut ApiRequest) {
        if is_public_auth_path(&request.path) {
            return;
        }
        let token = self.tokens.access_token();
        if token.is_empty() {
            return;
        }
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                request.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored access token is not a valid header value");
            }
        }
    }

    /// One attempt: attach credentials, send, map non-success statuses.
    async fn dispatch(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let mut outgoing = request.clone();
        self.authorize(&mut outgoing);

        let response = self.transport.send(&outgoing).await?;
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::from_status(response.status, &response.body))
        }
    }

    async fn recover(&self, mut request: ApiRequest, original: ClientError) -> ClientResult<ApiResponse> {
        if request.retried || self.tokens.refresh_token().is_empty() {
            return Err(original);
        }

        let refreshed = {
            let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
                tracing::debug!(path = %request.path, "Refresh already in flight, rejecting request");
                return Err(original);
            };

            tracing::debug!(path = %request.path, "Access token rejected, refreshing");
            self.refresh().await
        };

        match refreshed {
            Ok(pair) => {
                self.tokens.set_tokens(&pair.access_token, &pair.refresh_token);
                request.retried = true;
                self.dispatch(&request).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, clearing credentials");
                self.tokens.clear_tokens();
                self.redirect.redirect_to_login();
                Err(original)
            }
        }
    }

    async fn refresh(&self) -> ClientResult<TokenPair> {
        let request = ApiRequest::post(REFRESH_PATH).with_json(&serde_json::json!({
            "refresh_token": self.tokens.refresh_token(),
        }))?;
        self.dispatch(&request).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, RecordingRedirect};
    use crate::tokens::MemoryTokenStore;
    use reqwest::Method;
    use serde_json::json;

    struct Harness {
        transport: Arc<FakeTransport>,
        tokens: Arc<MemoryTokenStore>,
        redirect: Arc<RecordingRedirect>,
        client: Arc<ApiClient>,
    }

    fn harness(tokens: MemoryTokenStore) -> Harness {
        let transport = Arc::new(FakeTransport::new());
        let tokens = Arc::new(tokens);
        let redirect = Arc::new(RecordingRedirect::default());
        let client = Arc::new(
            ApiClient::new(transport.clone(), tokens.clone()).with_login_redirect(redirect.clone()),
        );
        Harness {
            transport,
            tokens,
            redirect,
            client,
        }
    }

    fn bearer(request: &ApiRequest) -> Option<String> {
        request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    #[test]
    fn test_public_auth_paths() {
        assert!(is_public_auth_path("/auth/token"));
        assert!(is_public_auth_path("/auth/refresh"));
        assert!(is_public_auth_path("/auth/register"));
        assert!(is_public_auth_path("/auth/verify-email?token=x"));
        assert!(!is_public_auth_path("/auth/me"));
        assert!(!is_public_auth_path("/sources/"));
    }

    #[tokio::test]
    async fn test_bearer_attached_when_token_present() {
        let h = harness(MemoryTokenStore::with_tokens("acc", "ref"));
        h.transport.respond(Method::GET, "/sources/", 200, json!([]));

        h.client.execute(ApiRequest::get("/sources/")).await.unwrap();

        let sent = h.transport.requests();
        assert_eq!(bearer(&sent[0]).as_deref(), Some("Bearer acc"));
    }

    #[tokio::test]
    async fn test_no_header_without_token() {
        let h = harness(MemoryTokenStore::new());
        h.transport.respond(Method::GET, "/sources/", 200, json!([]));

        h.client.execute(ApiRequest::get("/sources/")).await.unwrap();

        assert_eq!(bearer(&h.transport.requests()[0]), None);
    }

    #[tokio::test]
    async fn test_public_endpoints_never_carry_bearer() {
        let h = harness(MemoryTokenStore::with_tokens("acc", "ref"));
        h.transport.respond(
            Method::POST,
            "/auth/token",
            200,
            json!({"access_token": "a", "refresh_token": "r"}),
        );

        h.client
            .execute(ApiRequest::post("/auth/token").with_form(&[("username", "u"), ("password", "p")]))
            .await
            .unwrap();

        assert_eq!(bearer(&h.transport.requests()[0]), None);
    }

    #[tokio::test]
    async fn test_refresh_and_retry_once() {
        let h = harness(MemoryTokenStore::with_tokens("stale", "ref-1"));
        h.transport
            .respond(Method::GET, "/auth/me", 401, json!({"detail": "Token expired"}))
            .respond(
                Method::POST,
                "/auth/refresh",
                200,
                json!({"access_token": "fresh", "refresh_token": "ref-2", "token_type": "bearer"}),
            )
            .respond(Method::GET, "/auth/me", 200, json!({"id": 1}));

        let response = h.client.execute(ApiRequest::get("/auth/me")).await.unwrap();
        assert_eq!(response.status.as_u16(), 200);

        let sent = h.transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(bearer(&sent[0]).as_deref(), Some("Bearer stale"));
        assert_eq!(sent[1].path, "/auth/refresh");
        assert_eq!(bearer(&sent[1]), None);
        assert_eq!(
            sent[1].body,
            crate::transport::RequestBody::Json(json!({"refresh_token": "ref-1"}))
        );
        assert_eq!(bearer(&sent[2]).as_deref(), Some("Bearer fresh"));
        assert!(sent[2].is_retry());

        assert_eq!(h.tokens.access_token(), "fresh");
        assert_eq!(h.tokens.refresh_token(), "ref-2");
        assert!(!h.client.is_refreshing());
    }

    #[tokio::test]
    async fn test_retried_request_is_not_retried_again() {
        let h = harness(MemoryTokenStore::with_tokens("stale", "ref-1"));
        h.transport
            .respond(Method::GET, "/sources/1", 401, json!({"detail": "nope"}))
            .respond(
                Method::POST,
                "/auth/refresh",
                200,
                json!({"access_token": "fresh", "refresh_token": "ref-2"}),
            )
            .respond(Method::GET, "/sources/1", 401, json!({"detail": "still nope"}));

        let err = h.client.execute(ApiRequest::get("/sources/1")).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(ref m) if m == "still nope"));

        assert_eq!(h.transport.count(Method::POST, "/auth/refresh"), 1);
        assert_eq!(h.transport.count(Method::GET, "/sources/1"), 2);
        assert_eq!(h.redirect.count(), 0);
    }

    #[tokio::test]
    async fn test_no_refresh_token_propagates() {
        let h = harness(MemoryTokenStore::new());
        h.transport.respond(Method::GET, "/auth/me", 401, json!({"detail": "Not authenticated"}));

        let err = h.client.execute(ApiRequest::get("/auth/me")).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(h.transport.count(Method::POST, "/auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_and_redirects() {
        let h = harness(MemoryTokenStore::with_tokens("stale", "expired"));
        h.transport
            .respond(Method::GET, "/documents", 401, json!({"detail": "Token expired"}))
            .respond(Method::POST, "/auth/refresh", 401, json!({"detail": "Refresh token expired."}));

        let err = h.client.execute(ApiRequest::get("/documents")).await.unwrap_err();

        // The caller sees the original failure, not the refresh failure.
        assert!(matches!(err, ClientError::Unauthorized(ref m) if m == "Token expired"));
        assert_eq!(h.tokens.pair(), None);
        assert_eq!(h.redirect.count(), 1);
        assert!(!h.client.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_transport_failure_clears_credentials() {
        let h = harness(MemoryTokenStore::with_tokens("stale", "ref"));
        // No scripted refresh response: the fake reports a transport error.
        h.transport.respond(Method::GET, "/auth/me", 401, json!({"detail": "expired"}));

        let err = h.client.execute(ApiRequest::get("/auth/me")).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(h.tokens.pair(), None);
        assert_eq!(h.redirect.count(), 1);
    }

    #[tokio::test]
    async fn test_non_auth_errors_pass_through() {
        let h = harness(MemoryTokenStore::with_tokens("acc", "ref"));
        h.transport
            .respond(Method::GET, "/sources/9", 404, json!({"detail": "Source with id 9 not found"}))
            .respond(Method::GET, "/auth/me", 403, json!({"detail": "Forbidden"}));

        let err = h.client.execute(ApiRequest::get("/sources/9")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));

        let err = h.client.execute(ApiRequest::get("/auth/me")).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 403, .. }));
        assert_eq!(h.transport.count(Method::POST, "/auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_401_during_refresh_is_rejected() {
        let h = harness(MemoryTokenStore::with_tokens("stale", "ref-1"));
        h.transport
            .respond(Method::GET, "/sources/", 401, json!({"detail": "expired"}))
            .respond(Method::GET, "/scheduling/runs", 401, json!({"detail": "expired"}))
            .respond(
                Method::POST,
                "/auth/refresh",
                200,
                json!({"access_token": "fresh", "refresh_token": "ref-2"}),
            )
            .respond(Method::GET, "/sources/", 200, json!([]));
        let gate = h.transport.gate(Method::POST, "/auth/refresh");

        let first = {
            let client = h.client.clone();
            tokio::spawn(async move { client.execute(ApiRequest::get("/sources/")).await })
        };

        // Wait until the first request has started the refresh.
        gate.entered.notified().await;
        assert!(h.client.is_refreshing());

        let second = h.client.execute(ApiRequest::get("/scheduling/runs")).await;
        assert!(matches!(second, Err(ClientError::Unauthorized(_))));

        gate.release.notify_one();
        let first = first.await.unwrap();
        tokio_test::assert_ok!(first);

        assert_eq!(h.transport.count(Method::POST, "/auth/refresh"), 1);
        assert_eq!(h.transport.count(Method::GET, "/scheduling/runs"), 1);
        assert_eq!(h.tokens.access_token(), "fresh");
        assert_eq!(h.redirect.count(), 0);
    }
}
