//! # Application Configuration
//!
//! Configuration for the Datafy client core.
//!
//! ## Overview
//!
//! [`AppConfig`] holds the host bridges and the settings every other crate
//! reads: where the backend lives, how to reach the identity provider, and the
//! session and routing policy. It is built through [`AppConfigBuilder`], which
//! validates eagerly so a misconfigured host fails at startup and not on the
//! first sign-in.
//!
//! ## Required Dependencies
//!
//! - `Navigator` - Hard redirects after the backend revokes a session
//!
//! ## Optional Dependencies (with desktop defaults)
//!
//! - `HttpClient` - reqwest
//! - `SecureStore` - OS keychain with `secure-store`, in-process map otherwise
//! - `SettingsStore` - in-memory SQLite, scoped to this process
//!
//! Without the `desktop-shims` feature every bridge must be injected and a
//! missing one is reported as [`Error::CapabilityMissing`].
//!
//! ## Environment
//!
//! [`AppConfigBuilder::from_env`] seeds the builder from:
//!
//! | Variable | Setting |
//! |---|---|
//! | `DATAFY_API_URL` | backend base URL |
//! | `DATAFY_FIREBASE_API_KEY` | identity provider API key |
//! | `DATAFY_LOGIN_PATH` | login route (default `/login`) |
//! | `DATAFY_HOME_PATH` | authenticated landing route (default `/`) |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//! use std::sync::Arc;
//!
//! let config = AppConfig::builder()
//!     .api_base_url("https://api.datafy.example")
//!     .firebase_api_key("AIza...")
//!     .navigator(Arc::new(MyNavigator))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, Navigator, SecureStore, SettingsStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const ENV_API_URL: &str = "DATAFY_API_URL";
pub const ENV_FIREBASE_API_KEY: &str = "DATAFY_FIREBASE_API_KEY";
pub const ENV_LOGIN_PATH: &str = "DATAFY_LOGIN_PATH";
pub const ENV_HOME_PATH: &str = "DATAFY_HOME_PATH";

const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Backend API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL every API path is joined to.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Identity provider settings.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentitySettings {
    pub api_key: String,
    pub identity_toolkit_url: String,
    pub secure_token_url: String,
    /// Continue URI sent with federated sign-in requests.
    pub federated_request_uri: String,
    /// Always mint a fresh ID token for outbound API calls.
    pub force_token_refresh: bool,
    /// SecureStore key holding the persisted session.
    pub session_key: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            identity_toolkit_url: DEFAULT_IDENTITY_TOOLKIT_URL.to_string(),
            secure_token_url: DEFAULT_SECURE_TOKEN_URL.to_string(),
            federated_request_uri: "http://localhost".to_string(),
            force_token_refresh: true,
            session_key: "identity.session".to_string(),
        }
    }
}

impl std::fmt::Debug for IdentitySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySettings")
            .field("api_key", &"[REDACTED]")
            .field("identity_toolkit_url", &self.identity_toolkit_url)
            .field("secure_token_url", &self.secure_token_url)
            .field("federated_request_uri", &self.federated_request_uri)
            .field("force_token_refresh", &self.force_token_refresh)
            .field("session_key", &self.session_key)
            .finish()
    }
}

/// Session and routing policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Route unauthenticated users are sent to.
    pub login_path: String,
    /// Route authenticated users land on when they hit a guest-only page.
    pub home_path: String,
    /// Bound on the initial identity lookup.
    pub identity_timeout: Duration,
    /// Bound on each provider operation (sign-in, sign-out, token).
    pub operation_timeout: Duration,
    /// Verify a restored identity with the backend during initialization.
    pub verify_on_initialize: bool,
    /// Create the backend profile after registering.
    pub provision_profile_on_register: bool,
    /// Create the backend profile after each federated sign-in.
    pub provision_profile_on_federated_login: bool,
    /// Redirect hops the router follows before giving up.
    pub max_redirects: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            identity_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(30),
            verify_on_initialize: true,
            provision_profile_on_register: true,
            provision_profile_on_federated_login: true,
            max_redirects: 5,
        }
    }
}

/// Configuration for the Datafy client core.
///
/// Use [`AppConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct AppConfig {
    pub api: ApiSettings,
    pub identity: IdentitySettings,
    pub session: SessionSettings,
    /// Buffer size of the shared event bus.
    pub event_buffer_size: usize,
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api", &self.api)
            .field("identity", &self.identity)
            .field("session", &self.session)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("navigator", &"Navigator { ... }")
            .finish()
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Checks settings that do not depend on injected bridges.
    pub fn validate(&self) -> Result<()> {
        validate_settings(&self.api, &self.identity, &self.session)?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_settings(
    api: &ApiSettings,
    identity: &IdentitySettings,
    session: &SessionSettings,
) -> Result<()> {
    if api.base_url.trim().is_empty() {
        return Err(Error::Config(format!(
            "API base URL is required. Use .api_base_url() or set {}.",
            ENV_API_URL
        )));
    }
    validate_http_url("API base URL", &api.base_url)?;

    if api.request_timeout.is_zero() {
        return Err(Error::Config(
            "API request timeout must be greater than 0".to_string(),
        ));
    }

    if identity.api_key.trim().is_empty() {
        return Err(Error::Config(format!(
            "Identity provider API key is required. Use .firebase_api_key() or set {}.",
            ENV_FIREBASE_API_KEY
        )));
    }
    validate_http_url("Identity toolkit URL", &identity.identity_toolkit_url)?;
    validate_http_url("Secure token URL", &identity.secure_token_url)?;

    if identity.session_key.is_empty() {
        return Err(Error::Config("Session storage key cannot be empty".to_string()));
    }

    for (name, path) in [
        ("Login path", &session.login_path),
        ("Home path", &session.home_path),
    ] {
        if !path.starts_with('/') {
            return Err(Error::Config(format!(
                "{} must be an absolute route starting with '/': {:?}",
                name, path
            )));
        }
    }

    if session.login_path == session.home_path {
        return Err(Error::Config(
            "Login path and home path must differ or guards would redirect in a loop"
                .to_string(),
        ));
    }

    if session.identity_timeout.is_zero() || session.operation_timeout.is_zero() {
        return Err(Error::Config(
            "Session timeouts must be greater than 0".to_string(),
        ));
    }

    if session.max_redirects == 0 {
        return Err(Error::Config(
            "max_redirects must allow at least one redirect".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let parsed =
        Url::parse(value).map_err(|e| Error::Config(format!("{} is invalid: {}", name, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{} must use http or https, got {}",
            name, other
        ))),
    }
}

// ============================================================================
// Desktop defaults
// ============================================================================

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for backend and identity calls. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient."
            .to_string(),
    })
}

#[cfg(feature = "secure-store")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[cfg(all(feature = "desktop-shims", not(feature = "secure-store")))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::MemorySecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required to persist the signed-in session. \
                  Desktop: enable the 'desktop-shims' feature (add 'secure-store' for the OS keychain)."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store() -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let init_store = || -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::in_memory())
            .map_err(|e| Error::Internal(format!("Failed to initialize default SettingsStore: {}", e)))
    };

    // block_on panics inside a runtime, so hop to a plain thread there.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(init_store).join().map_err(|_| {
            Error::Internal("Thread panicked while creating default SettingsStore".to_string())
        })??,
        Err(_) => init_store()?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store() -> Result<Arc<dyn SettingsStore>> {
    Err(Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for the session-scoped dataset cache. \
                  Desktop: enable the 'desktop-shims' feature to use SqliteSettingsStore."
            .to_string(),
    })
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AppConfig`].
#[derive(Default)]
pub struct AppConfigBuilder {
    api: ApiSettings,
    identity: IdentitySettings,
    session: SessionSettings,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl AppConfigBuilder {
    /// Seed a builder from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Seed a builder from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut builder = Self::default();

        if let Some(url) = get(ENV_API_URL) {
            builder = builder.api_base_url(url);
        }
        if let Some(key) = get(ENV_FIREBASE_API_KEY) {
            builder = builder.firebase_api_key(key);
        }
        if let Some(path) = get(ENV_LOGIN_PATH) {
            builder = builder.login_path(path);
        }
        if let Some(path) = get(ENV_HOME_PATH) {
            builder = builder.home_path(path);
        }

        builder
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.api.request_timeout = timeout;
        self
    }

    pub fn firebase_api_key(mut self, key: impl Into<String>) -> Self {
        self.identity.api_key = key.into();
        self
    }

    /// Override the identity endpoints, e.g. to point at an emulator.
    pub fn identity_endpoints(
        mut self,
        identity_toolkit_url: impl Into<String>,
        secure_token_url: impl Into<String>,
    ) -> Self {
        self.identity.identity_toolkit_url = identity_toolkit_url.into();
        self.identity.secure_token_url = secure_token_url.into();
        self
    }

    pub fn force_token_refresh(mut self, force: bool) -> Self {
        self.identity.force_token_refresh = force;
        self
    }

    pub fn identity(mut self, identity: IdentitySettings) -> Self {
        self.identity = identity;
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.session.login_path = path.into();
        self
    }

    pub fn home_path(mut self, path: impl Into<String>) -> Self {
        self.session.home_path = path.into();
        self
    }

    pub fn session(mut self, session: SessionSettings) -> Self {
        self.session = session;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the navigator (required).
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Validate and build the final [`AppConfig`].
    ///
    /// Settings are validated before any default bridge is created, so a bad
    /// URL never opens a database.
    pub fn build(self) -> Result<AppConfig> {
        validate_settings(&self.api, &self.identity, &self.session)?;

        let navigator = self.navigator.ok_or_else(|| Error::CapabilityMissing {
            capability: "Navigator".to_string(),
            message: "Navigator implementation is required to redirect to the login route \
                      after the backend rejects a session. Desktop: use ChannelNavigator."
                .to_string(),
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(self.api.request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store()?,
        };

        let config = AppConfig {
            api: self.api,
            identity: self.identity,
            session: self.session,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            secure_store,
            settings_store,
            navigator,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};
    use std::collections::HashMap;

    struct NoopHttp;

    #[async_trait]
    impl HttpClient for NoopHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200, ""))
        }
    }

    struct NoopSecrets;

    #[async_trait]
    impl SecureStore for NoopSecrets {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn clear_all(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NoopSettings;

    #[async_trait]
    impl SettingsStore for NoopSettings {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NoopNavigator;

    impl Navigator for NoopNavigator {
        fn hard_redirect(&self, _path: &str) {}
    }

    fn complete_builder() -> AppConfigBuilder {
        AppConfig::builder()
            .api_base_url("https://api.datafy.test")
            .firebase_api_key("test-key")
            .http_client(Arc::new(NoopHttp))
            .secure_store(Arc::new(NoopSecrets))
            .settings_store(Arc::new(NoopSettings))
            .navigator(Arc::new(NoopNavigator))
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.api.base_url, "https://api.datafy.test");
        assert_eq!(config.session.login_path, "/login");
        assert_eq!(config.session.home_path, "/");
        assert!(config.identity.force_token_refresh);
        assert_eq!(config.identity.session_key, "identity.session");
        assert_eq!(config.event_buffer_size, 100);
    }

    #[test]
    fn test_builder_requires_api_url() {
        let result = complete_builder().api_base_url("").build();
        match result {
            Err(Error::Config(message)) => assert!(message.contains(ENV_API_URL)),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        let result = complete_builder().api_base_url("ftp://files.test").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_requires_api_key() {
        let result = complete_builder().firebase_api_key("  ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_requires_navigator() {
        let result = AppConfig::builder()
            .api_base_url("https://api.datafy.test")
            .firebase_api_key("test-key")
            .http_client(Arc::new(NoopHttp))
            .secure_store(Arc::new(NoopSecrets))
            .settings_store(Arc::new(NoopSettings))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "Navigator")
            }
            other => panic!("expected missing navigator, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_relative_paths_are_rejected() {
        let result = complete_builder().login_path("login").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_same_login_and_home_path_rejected() {
        let result = complete_builder().home_path("/login").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        let result = complete_builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://localhost:8000"),
            (ENV_FIREBASE_API_KEY, "env-key"),
            (ENV_LOGIN_PATH, "/sign-in"),
            (ENV_HOME_PATH, ""),
        ]);

        let config = AppConfigBuilder::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
            .http_client(Arc::new(NoopHttp))
            .secure_store(Arc::new(NoopSecrets))
            .settings_store(Arc::new(NoopSettings))
            .navigator(Arc::new(NoopNavigator))
            .build()
            .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.identity.api_key, "env-key");
        assert_eq!(config.session.login_path, "/sign-in");
        // empty value falls back to the default
        assert_eq!(config.session.home_path, "/");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = complete_builder().build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test-key"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_bridges_without_desktop_shims() {
        let result = AppConfig::builder()
            .api_base_url("https://api.datafy.test")
            .firebase_api_key("test-key")
            .navigator(Arc::new(NoopNavigator))
            .build();

        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_defaults_fill_missing_bridges() {
        let config = AppConfig::builder()
            .api_base_url("https://api.datafy.test")
            .firebase_api_key("test-key")
            .navigator(Arc::new(NoopNavigator))
            .build()
            .expect("desktop defaults should succeed");

        assert_eq!(config.session.max_redirects, 5);
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_desktop_defaults_inside_runtime() {
        let config = AppConfig::builder()
            .api_base_url("https://api.datafy.test")
            .firebase_api_key("test-key")
            .navigator(Arc::new(NoopNavigator))
            .build()
            .expect("desktop defaults should succeed inside a runtime");

        config
            .settings_store
            .set_string("dataStore", "{}")
            .await
            .unwrap();
        assert_eq!(
            config.settings_store.get_string("dataStore").await.unwrap(),
            Some("{}".to_string())
        );
    }
}
