//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! Email/password and Google sign-in are exchanged for an ID token and a
//! refresh token. The pair, together with the resolved identity, is kept in
//! memory and mirrored into the host [`SecureStore`] so a later process can
//! restore the session through [`IdentityProvider::current_identity`].

use crate::{
    error::{AuthError, Result},
    provider::{FederatedCredentialSource, IdentityProvider},
    types::{IdTokens, ProviderErrorCode, UserIdentity, PASSWORD_PROVIDER_ID},
};
use async_trait::async_trait;
use bridge_traits::{
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    storage::SecureStore,
};
use bytes::Bytes;
use core_runtime::{config::IdentitySettings, logging::redact_if_sensitive};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Identity and tokens as written to the secure store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    identity: UserIdentity,
    tokens: IdTokens,
}

enum SessionSlot {
    /// Secure store not read yet.
    Unloaded,
    Loaded(Option<StoredSession>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    provider_id: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
    /// Set on some federated failures that still come back as HTTP 200.
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Secure token endpoint response (snake_case, unlike the toolkit).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    provider_user_info: Vec<ProviderUserInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUserInfo {
    provider_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_expires_in(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN)
}

/// [`IdentityProvider`] backed by Firebase Authentication.
///
/// # Example
///
/// ```no_run
/// use bridge_desktop::{MemorySecureStore, ReqwestHttpClient};
/// use core_auth::{FirebaseIdentityProvider, IdentityProvider};
/// use core_runtime::config::IdentitySettings;
/// use std::sync::Arc;
///
/// # async fn example() -> core_auth::Result<()> {
/// let settings = IdentitySettings {
///     api_key: "AIza...".to_string(),
///     ..Default::default()
/// };
/// let http = Arc::new(ReqwestHttpClient::new().expect("client"));
/// let provider = FirebaseIdentityProvider::new(settings, http, Arc::new(MemorySecureStore::new()));
///
/// let user = provider.authenticate("ada@example.com", "hunter22").await?;
/// println!("signed in as {}", user.label());
/// # Ok(())
/// # }
/// ```
pub struct FirebaseIdentityProvider {
    settings: IdentitySettings,
    http: Arc<dyn HttpClient>,
    secure_store: Arc<dyn SecureStore>,
    federated: Option<Arc<dyn FederatedCredentialSource>>,
    session: Mutex<SessionSlot>,
}

impl FirebaseIdentityProvider {
    pub fn new(
        settings: IdentitySettings,
        http: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
    ) -> Self {
        Self {
            settings,
            http,
            secure_store,
            federated: None,
            session: Mutex::new(SessionSlot::Unloaded),
        }
    }

    /// Enable Google sign-in through a host credential prompt.
    pub fn with_federated_source(mut self, source: Arc<dyn FederatedCredentialSource>) -> Self {
        self.federated = Some(source);
        self
    }

    fn endpoint(&self, base: &str, method: &str) -> Result<String> {
        let raw = format!("{}/{}", base.trim_end_matches('/'), method);
        Url::parse_with_params(&raw, &[("key", self.settings.api_key.as_str())])
            .map(String::from)
            .map_err(|e| AuthError::Other(format!("Invalid identity endpoint {}: {}", raw, e)))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            return Err(Self::provider_error(&response));
        }

        Ok(response)
    }

    fn provider_error(response: &HttpResponse) -> AuthError {
        match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
            Ok(envelope) => {
                let code = ProviderErrorCode::parse(&envelope.error.message);
                warn!(status = response.status, code = %code, "Identity provider rejected request");
                AuthError::provider(code)
            }
            Err(_) => {
                let body = String::from_utf8_lossy(&response.body);
                warn!(status = response.status, body = %body, "Unrecognized identity provider error");
                AuthError::Provider {
                    code: ProviderErrorCode::Unknown(format!("HTTP {}", response.status)),
                    message: "Authentication failed".to_string(),
                }
            }
        }
    }

    async fn toolkit<B, R>(&self, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(&self.settings.identity_toolkit_url, method)?;
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(body)
            .map_err(|e| AuthError::Other(format!("Failed to encode request: {}", e)))?;

        let response = self.send(request).await?;
        response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse {} response: {}", method, e)))
    }

    async fn refresh(&self, tokens: &IdTokens) -> Result<IdTokens> {
        let url = self.endpoint(&self.settings.secure_token_url, "token")?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", tokens.refresh_token.as_str()),
        ];
        let body = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Other(format!("Failed to encode refresh request: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(body));

        let response = self.send(request).await?;
        let refreshed: RefreshResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse refresh response: {}", e)))?;

        debug!("Refreshed ID token");
        Ok(IdTokens::new(
            refreshed.id_token,
            refreshed.refresh_token,
            parse_expires_in(Some(&refreshed.expires_in)),
        ))
    }

    async fn lookup(&self, id_token: &str) -> Result<Option<LookupUser>> {
        let response: LookupResponse = self
            .toolkit("accounts:lookup", &LookupRequest { id_token })
            .await?;
        Ok(response.users.into_iter().next())
    }

    /// Resolve the slot, reading the secure store on first use.
    async fn loaded(&self, slot: &mut SessionSlot) -> Result<Option<StoredSession>> {
        if let SessionSlot::Loaded(session) = slot {
            return Ok(session.clone());
        }

        let key = &self.settings.session_key;
        let raw = self
            .secure_store
            .get_secret(key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        let session = match raw {
            Some(bytes) => match serde_json::from_slice::<StoredSession>(&bytes) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable stored session");
                    if let Err(e) = self.secure_store.delete_secret(key).await {
                        warn!(error = %e, "Failed to delete unreadable stored session");
                    }
                    None
                }
            },
            None => None,
        };

        *slot = SessionSlot::Loaded(session.clone());
        Ok(session)
    }

    /// Make `session` current and mirror it into the secure store.
    ///
    /// A failed write keeps the in-memory session; only restoring after a
    /// restart is affected.
    async fn establish(&self, slot: &mut SessionSlot, session: StoredSession) {
        match serde_json::to_vec(&session) {
            Ok(bytes) => {
                if let Err(e) = self
                    .secure_store
                    .set_secret(&self.settings.session_key, &bytes)
                    .await
                {
                    warn!(error = %e, "Failed to persist session");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session"),
        }

        *slot = SessionSlot::Loaded(Some(session));
    }

    async fn forget(&self, slot: &mut SessionSlot) -> Result<()> {
        *slot = SessionSlot::Loaded(None);
        self.secure_store
            .delete_secret(&self.settings.session_key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }

    async fn sign_in(
        &self,
        response: SignInResponse,
        fallback_provider: &str,
    ) -> Result<UserIdentity> {
        if let Some(message) = response.error_message {
            return Err(AuthError::provider(ProviderErrorCode::parse(&message)));
        }

        let identity = UserIdentity {
            id: response.local_id,
            email: non_empty(response.email),
            display_name: non_empty(response.display_name),
            email_verified: response.email_verified,
            provider_id: response
                .provider_id
                .unwrap_or_else(|| fallback_provider.to_string()),
        };
        let tokens = IdTokens::new(
            response.id_token,
            response.refresh_token,
            parse_expires_in(response.expires_in.as_deref()),
        );

        let mut slot = self.session.lock().await;
        self.establish(
            &mut slot,
            StoredSession {
                identity: identity.clone(),
                tokens,
            },
        )
        .await;

        info!(user_id = %identity.id, provider = %identity.provider_id, "Signed in");
        Ok(identity)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<UserIdentity> {
        let mut slot = self.session.lock().await;
        let mut session = self
            .loaded(&mut slot)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        let response: UpdateProfileResponse = self
            .toolkit(
                "accounts:update",
                &UpdateProfileRequest {
                    id_token: &session.tokens.id_token,
                    display_name,
                    return_secure_token: true,
                },
            )
            .await?;

        session.identity.display_name =
            non_empty(response.display_name).or_else(|| Some(display_name.to_string()));
        if let (Some(id_token), Some(refresh_token)) = (response.id_token, response.refresh_token) {
            session.tokens = IdTokens::new(
                id_token,
                refresh_token,
                parse_expires_in(response.expires_in.as_deref()),
            );
        }

        let identity = session.identity.clone();
        self.establish(&mut slot, session).await;
        Ok(identity)
    }

    /// Drop the session if `err` means it can no longer be used.
    async fn invalidate_on(&self, slot: &mut SessionSlot, err: &AuthError) {
        if err.provider_code().is_some_and(|c| c.invalidates_session()) {
            info!(error = %err, "Stored session is no longer valid, clearing it");
            if let Err(e) = self.forget(slot).await {
                warn!(error = %e, "Failed to delete revoked session");
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    #[instrument(skip(self, email, password, display_name), fields(email = %redact_if_sensitive("email", email)))]
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserIdentity> {
        let response: SignInResponse = self
            .toolkit(
                "accounts:signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        let identity = self.sign_in(response, PASSWORD_PROVIDER_ID).await?;

        match display_name.filter(|name| !name.is_empty()) {
            Some(name) => self.update_display_name(name).await,
            None => Ok(identity),
        }
    }

    #[instrument(skip(self, email, password), fields(email = %redact_if_sensitive("email", email)))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let response: SignInResponse = self
            .toolkit(
                "accounts:signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        self.sign_in(response, PASSWORD_PROVIDER_ID).await
    }

    #[instrument(skip(self))]
    async fn authenticate_federated(&self) -> Result<UserIdentity> {
        let source = self
            .federated
            .as_ref()
            .ok_or_else(|| AuthError::NotSupported("No federated credential source".to_string()))?;

        let credential = source.obtain_credential().await?;

        let mut params = vec![("providerId", credential.provider_id.as_str())];
        if let Some(id_token) = credential.id_token.as_deref() {
            params.push(("id_token", id_token));
        }
        if let Some(access_token) = credential.access_token.as_deref() {
            params.push(("access_token", access_token));
        }
        if params.len() == 1 {
            return Err(AuthError::provider(ProviderErrorCode::InvalidCredentials));
        }

        let post_body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Other(format!("Failed to encode credential: {}", e)))?;

        let response: SignInResponse = self
            .toolkit(
                "accounts:signInWithIdp",
                &IdpRequest {
                    post_body,
                    request_uri: &self.settings.federated_request_uri,
                    return_idp_credential: true,
                    return_secure_token: true,
                },
            )
            .await?;

        self.sign_in(response, &credential.provider_id).await
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        self.forget(&mut slot).await?;
        info!("Signed out");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn current_identity(&self) -> Result<Option<UserIdentity>> {
        let mut slot = self.session.lock().await;
        let Some(mut session) = self.loaded(&mut slot).await? else {
            return Ok(None);
        };

        if session.tokens.is_expired() {
            match self.refresh(&session.tokens).await {
                Ok(tokens) => session.tokens = tokens,
                Err(e) => {
                    self.invalidate_on(&mut slot, &e).await;
                    return match e.provider_code() {
                        Some(code) if code.invalidates_session() => Ok(None),
                        _ => Err(e),
                    };
                }
            }
        }

        let user = match self.lookup(&session.tokens.id_token).await {
            Ok(user) => user,
            Err(e) => {
                self.invalidate_on(&mut slot, &e).await;
                return match e.provider_code() {
                    Some(code) if code.invalidates_session() => Ok(None),
                    _ => Err(e),
                };
            }
        };

        let Some(user) = user.filter(|u| !u.disabled) else {
            info!("Stored user no longer exists or is disabled");
            self.forget(&mut slot).await?;
            return Ok(None);
        };

        let provider_id = user
            .provider_user_info
            .first()
            .map(|p| p.provider_id.clone())
            .unwrap_or_else(|| session.identity.provider_id.clone());
        session.identity = UserIdentity {
            id: user.local_id,
            email: non_empty(user.email),
            display_name: non_empty(user.display_name),
            email_verified: user.email_verified,
            provider_id,
        };

        let identity = session.identity.clone();
        self.establish(&mut slot, session).await;
        debug!(user_id = %identity.id, "Restored session");
        Ok(Some(identity))
    }

    async fn id_token(&self, force_refresh: bool) -> Result<Option<String>> {
        let mut slot = self.session.lock().await;
        let Some(mut session) = self.loaded(&mut slot).await? else {
            return Ok(None);
        };

        if force_refresh || session.tokens.is_expired() {
            match self.refresh(&session.tokens).await {
                Ok(tokens) => session.tokens = tokens,
                Err(e) => {
                    self.invalidate_on(&mut slot, &e).await;
                    return Err(e);
                }
            }
            let token = session.tokens.id_token.clone();
            self.establish(&mut slot, session).await;
            return Ok(Some(token));
        }

        Ok(Some(session.tokens.id_token))
    }
}
