//! Identity provider boundary.

use crate::{error::Result, types::UserIdentity};
use async_trait::async_trait;

/// Operations the session layer needs from an identity service.
///
/// Implementations own credential persistence: after a successful
/// `create_account`, `authenticate` or `authenticate_federated`, the
/// identity must be returned by `current_identity` (also across restarts
/// when the backing store survives them) until `sign_out` is called.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an email/password account and sign it in.
    ///
    /// When `display_name` is given it is written to the account profile
    /// before returning.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserIdentity>;

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserIdentity>;

    /// Sign in with a Google credential obtained from the host.
    async fn authenticate_federated(&self) -> Result<UserIdentity>;

    async fn sign_out(&self) -> Result<()>;

    /// Resolve the currently signed-in identity once.
    ///
    /// Returns `Ok(None)` when nobody is signed in or the stored session has
    /// been revoked.
    async fn current_identity(&self) -> Result<Option<UserIdentity>>;

    /// ID token for the signed-in user, refreshed when expired or when
    /// `force_refresh` is set. `Ok(None)` when nobody is signed in.
    async fn id_token(&self, force_refresh: bool) -> Result<Option<String>>;
}

/// Credential returned by a host-side federated sign-in prompt.
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl FederatedCredential {
    pub fn google_id_token(id_token: impl Into<String>) -> Self {
        Self {
            provider_id: crate::types::GOOGLE_PROVIDER_ID.to_string(),
            id_token: Some(id_token.into()),
            access_token: None,
        }
    }
}

impl std::fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedCredential")
            .field("provider_id", &self.provider_id)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Host capability that runs the Google account chooser.
///
/// Desktop shells typically open a system browser and complete a loopback
/// OAuth flow; tests return a canned token. Cancelling the prompt should be
/// reported as
/// [`ProviderErrorCode::FederatedCancelled`](crate::ProviderErrorCode::FederatedCancelled).
#[async_trait]
pub trait FederatedCredentialSource: Send + Sync {
    async fn obtain_credential(&self) -> Result<FederatedCredential>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn federated_credential_debug_hides_tokens() {
        let credential = FederatedCredential::google_id_token("google-jwt");
        let debug = format!("{:?}", credential);

        assert!(debug.contains("google.com"));
        assert!(!debug.contains("google-jwt"));
    }
}
