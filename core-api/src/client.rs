//! Authenticated client for the Datafy backend.

use crate::error::{ApiError, Result};
use bridge_traits::{
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    navigation::Navigator,
};
use bytes::Bytes;
use core_auth::IdentityProvider;
use core_runtime::{
    config::AppConfig,
    events::{AuthEvent, CoreEvent, EventBus},
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Local session state that must be dropped when the backend rejects the
/// credential.
///
/// Runs before the host is redirected, so the login page never sees a
/// session the backend already refused.
pub trait SessionRevoker: Send + Sync {
    fn revoke(&self, reason: &str);
}

/// HTTP client that attaches the signed-in user's ID token to every request.
///
/// A `401` from the backend means the session is no longer accepted: the
/// client signs the user out, clears the attached [`SessionRevoker`],
/// hard-redirects the host to the login page, announces
/// [`AuthEvent::SessionRevoked`] and returns [`ApiError::Unauthorized`] to
/// the caller.
pub struct ApiClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
    identity: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    event_bus: EventBus,
    login_path: String,
    force_token_refresh: bool,
    request_timeout: Duration,
    revoker: OnceLock<Weak<dyn SessionRevoker>>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        http: Arc<dyn HttpClient>,
        identity: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        event_bus: EventBus,
    ) -> Result<Self> {
        Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            identity,
            navigator,
            event_bus,
            login_path: "/login".to_string(),
            force_token_refresh: true,
            request_timeout: Duration::from_secs(30),
            revoker: OnceLock::new(),
        })
    }

    pub fn from_config(
        config: &AppConfig,
        identity: Arc<dyn IdentityProvider>,
        event_bus: EventBus,
    ) -> Result<Self> {
        Ok(Self::new(
            &config.api.base_url,
            config.http_client.clone(),
            identity,
            config.navigator.clone(),
            event_bus,
        )?
        .with_login_path(config.session.login_path.clone())
        .with_force_token_refresh(config.identity.force_token_refresh)
        .with_request_timeout(config.api.request_timeout))
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Mint a fresh ID token for every request instead of reusing a cached one.
    pub fn with_force_token_refresh(mut self, force: bool) -> Self {
        self.force_token_refresh = force;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Attach the session to clear on `401`. Only the first call takes
    /// effect; the client keeps a weak reference.
    pub fn attach_revoker(&self, revoker: Weak<dyn SessionRevoker>) {
        if self.revoker.set(revoker).is_err() {
            warn!("Session revoker already attached, ignoring");
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Request interceptor: attach `Authorization: Bearer <token>` when a
    /// user is signed in.
    async fn authorize(&self, request: HttpRequest) -> Result<HttpRequest> {
        match self.identity.id_token(self.force_token_refresh).await? {
            Some(token) => Ok(request.bearer_token(token)),
            None => {
                debug!(url = %request.url, "No signed-in user, sending request without token");
                Ok(request)
            }
        }
    }

    /// Response interceptor for `401`.
    async fn revoke_session(&self, path: &str) {
        warn!(path, "Backend rejected credentials, signing out");

        let reason = format!("Backend returned 401 for {}", path);

        if let Err(e) = self.identity.sign_out().await {
            warn!(error = %e, "Sign-out after 401 failed");
        }

        if let Some(revoker) = self.revoker.get().and_then(Weak::upgrade) {
            revoker.revoke(&reason);
        }

        self.navigator.hard_redirect(&self.login_path);

        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionRevoked { reason }));
    }

    /// Send a request to `path` (relative to the base URL).
    #[instrument(skip(self, method, body), fields(method = method.as_str()))]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, self.url(path))
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout);
        if let Some(body) = body {
            request = request.body(body);
        }

        let request = self.authorize(request).await?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if response.is_success() {
            debug!(status = response.status, "Request succeeded");
            return Ok(response);
        }

        let body = String::from_utf8_lossy(&response.body).into_owned();

        if response.is_unauthorized() {
            self.revoke_session(path).await;
            return Err(ApiError::Unauthorized { body });
        }

        warn!(status = response.status, body = %body, "Request failed");
        Err(ApiError::Status {
            status: response.status,
            body,
        })
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self.request(HttpMethod::Get, path, None).await?;
        Self::decode(&response)
    }

    /// POST `body` as JSON, or an empty body when `None`.
    pub async fn post<B, R>(&self, path: &str, body: Option<&B>) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let payload = body
            .map(|b| serde_json::to_vec(b).map(Bytes::from))
            .transpose()
            .map_err(|e| ApiError::Serialization(e.to_string()))?;

        let response = self.request(HttpMethod::Post, path, payload).await?;
        Self::decode(&response)
    }

    fn decode<R: DeserializeOwned>(response: &HttpResponse) -> Result<R> {
        serde_json::from_slice(&response.body).map_err(|e| ApiError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_auth::{AuthError, UserIdentity};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct ScriptedHttp {
        pub responses: Mutex<VecDeque<BridgeResult<HttpResponse>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttp {
        pub fn respond(&self, status: u16, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(HttpResponse::new(status, body.to_string())));
        }

        pub fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BridgeError::OperationFailed("connection refused".into())))
        }
    }

    /// Identity provider that only hands out tokens and counts sign-outs.
    #[derive(Default)]
    pub(crate) struct TokenProvider {
        pub token: Mutex<Option<String>>,
        pub fail_token: bool,
        pub sign_outs: AtomicUsize,
        pub forced_refreshes: AtomicUsize,
    }

    impl TokenProvider {
        pub fn signed_in(token: &str) -> Self {
            Self {
                token: Mutex::new(Some(token.to_string())),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for TokenProvider {
        async fn create_account(
            &self,
            _email: &str,
            _password: &str,
            _display_name: Option<&str>,
        ) -> core_auth::Result<UserIdentity> {
            Err(AuthError::NotSupported("create_account".into()))
        }

        async fn authenticate(
            &self,
            _email: &str,
            _password: &str,
        ) -> core_auth::Result<UserIdentity> {
            Err(AuthError::NotSupported("authenticate".into()))
        }

        async fn authenticate_federated(&self) -> core_auth::Result<UserIdentity> {
            Err(AuthError::NotSupported("authenticate_federated".into()))
        }

        async fn sign_out(&self) -> core_auth::Result<()> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            *self.token.lock().unwrap() = None;
            Ok(())
        }

        async fn current_identity(&self) -> core_auth::Result<Option<UserIdentity>> {
            Ok(None)
        }

        async fn id_token(&self, force_refresh: bool) -> core_auth::Result<Option<String>> {
            if self.fail_token {
                return Err(AuthError::NetworkError("token endpoint down".into()));
            }
            if force_refresh {
                self.forced_refreshes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(self.token.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNavigator {
        pub paths: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn hard_redirect(&self, path: &str) {
            self.paths.lock().unwrap().push(path.to_string());
        }
    }

    pub(crate) struct Harness {
        pub client: ApiClient,
        pub http: Arc<ScriptedHttp>,
        pub identity: Arc<TokenProvider>,
        pub navigator: Arc<RecordingNavigator>,
        pub events: EventBus,
    }

    pub(crate) fn harness(identity: TokenProvider) -> Harness {
        let http = Arc::new(ScriptedHttp::default());
        let identity = Arc::new(identity);
        let navigator = Arc::new(RecordingNavigator::default());
        let events = EventBus::new(16);
        let client = ApiClient::new(
            "http://api.test/",
            http.clone(),
            identity.clone(),
            navigator.clone(),
            events.clone(),
        )
        .unwrap();

        Harness {
            client,
            http,
            identity,
            navigator,
            events,
        }
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = ApiClient::new(
            "not a url",
            Arc::new(ScriptedHttp::default()),
            Arc::new(TokenProvider::default()),
            Arc::new(RecordingNavigator::default()),
            EventBus::default(),
        );
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn attaches_fresh_bearer_token() {
        let h = harness(TokenProvider::signed_in("id-123"));
        h.http.respond(200, r#"{"ok":true}"#);

        let value: serde_json::Value = h.client.get("/api/user/profile").await.unwrap();

        assert_eq!(value["ok"], true);
        let request = h.http.last_request();
        assert_eq!(request.url, "http://api.test/api/user/profile");
        assert_eq!(request.header_value("authorization"), Some("Bearer id-123"));
        assert_eq!(
            request.header_value("content-type"),
            Some("application/json")
        );
        assert_eq!(h.identity.forced_refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn anonymous_requests_have_no_authorization_header() {
        let h = harness(TokenProvider::default());
        h.http.respond(200, "{}");

        let _: serde_json::Value = h.client.get("health").await.unwrap();

        assert_eq!(h.http.last_request().header_value("authorization"), None);
    }

    #[tokio::test]
    async fn token_failure_aborts_request() {
        let h = harness(TokenProvider {
            fail_token: true,
            ..Default::default()
        });

        let err = h
            .client
            .get::<serde_json::Value>("/api/user/profile")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Token(_)));
        assert!(h.http.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_signs_out_and_redirects_once() {
        let h = harness(TokenProvider::signed_in("stale"));
        let mut events = h.events.subscribe();
        h.http.respond(401, r#"{"detail":"Invalid token"}"#);

        let err = h
            .client
            .get::<serde_json::Value>("/api/user/profile")
            .await
            .unwrap_err();

        match err {
            ApiError::Unauthorized { body } => assert!(body.contains("Invalid token")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
        assert_eq!(h.identity.sign_outs.load(Ordering::SeqCst), 1);
        assert_eq!(*h.navigator.paths.lock().unwrap(), vec!["/login".to_string()]);
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::SessionRevoked { .. })
        ));
    }

    /// Records how many redirects had happened when it was revoked.
    struct OrderedRevoker {
        navigator: Arc<RecordingNavigator>,
        redirects_seen: Mutex<Vec<usize>>,
    }

    impl SessionRevoker for OrderedRevoker {
        fn revoke(&self, reason: &str) {
            assert!(reason.contains("/api/user/profile"));
            let redirects = self.navigator.paths.lock().unwrap().len();
            self.redirects_seen.lock().unwrap().push(redirects);
        }
    }

    #[tokio::test]
    async fn session_is_revoked_before_redirect() {
        let h = harness(TokenProvider::signed_in("stale"));
        let revoker = Arc::new(OrderedRevoker {
            navigator: h.navigator.clone(),
            redirects_seen: Mutex::new(Vec::new()),
        });
        h.client.attach_revoker(Arc::downgrade(&revoker) as Weak<dyn SessionRevoker>);
        h.http.respond(401, "{}");

        let _ = h.client.get::<serde_json::Value>("/api/user/profile").await;

        assert_eq!(*revoker.redirects_seen.lock().unwrap(), vec![0]);
        assert_eq!(h.navigator.paths.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_revoker_is_skipped() {
        let h = harness(TokenProvider::signed_in("stale"));
        let revoker = Arc::new(OrderedRevoker {
            navigator: h.navigator.clone(),
            redirects_seen: Mutex::new(Vec::new()),
        });
        h.client.attach_revoker(Arc::downgrade(&revoker) as Weak<dyn SessionRevoker>);
        drop(revoker);
        h.http.respond(401, "{}");

        let err = h.client.get::<serde_json::Value>("/api/user/profile").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(*h.navigator.paths.lock().unwrap(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn other_errors_do_not_touch_session() {
        let h = harness(TokenProvider::signed_in("id"));
        h.http.respond(500, "boom");

        let err = h
            .client
            .post::<serde_json::Value, serde_json::Value>("/api/user/profile", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert_eq!(h.identity.sign_outs.load(Ordering::SeqCst), 0);
        assert!(h.navigator.paths.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        let h = harness(TokenProvider::signed_in("id"));

        let err = h
            .client
            .get::<serde_json::Value>("/api/user/profile")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(h.identity.sign_outs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn post_serializes_body() {
        let h = harness(TokenProvider::signed_in("id"));
        h.http.respond(200, "{}");

        let body = serde_json::json!({"bio": "hello"});
        let _: serde_json::Value = h
            .client
            .post("/api/user/profile", Some(&body))
            .await
            .unwrap();

        let request = h.http.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        let sent: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(sent["bio"], "hello");
    }

    #[tokio::test]
    async fn undecodable_body_is_serialization_error() {
        let h = harness(TokenProvider::signed_in("id"));
        h.http.respond(200, "<html>");

        let err = h.client.get::<serde_json::Value>("/").await.unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }
}
