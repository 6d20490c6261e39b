//! Datafy backend endpoints used by the session layer.

use crate::{client::ApiClient, error::Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const VERIFY_TOKEN_PATH: &str = "/api/auth/verify-token";
pub const PROFILE_PATH: &str = "/api/user/profile";

/// Claims the backend extracted from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VerifyTokenResponse {
    Wrapped { user: VerifiedUser },
    Bare(VerifiedUser),
}

impl From<VerifyTokenResponse> for VerifiedUser {
    fn from(response: VerifyTokenResponse) -> Self {
        match response {
            VerifyTokenResponse::Wrapped { user } | VerifyTokenResponse::Bare(user) => user,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
}

/// Fields to write to the profile. `None` leaves the stored profile as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub preferences: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileResponse {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend calls the session store makes around sign-in.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Confirm the backend accepts the current ID token.
    async fn verify_session(&self) -> Result<VerifiedUser>;

    /// Make sure a profile exists for the current user. Safe to repeat.
    async fn provision_profile(&self) -> Result<()>;
}

/// Typed wrapper over the backend REST endpoints.
#[derive(Clone)]
pub struct BackendApi {
    client: Arc<ApiClient>,
}

impl BackendApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    #[instrument(skip(self))]
    pub async fn verify_token(&self) -> Result<VerifiedUser> {
        let response: VerifyTokenResponse = self
            .client
            .post::<(), _>(VERIFY_TOKEN_PATH, None)
            .await?;
        let user = VerifiedUser::from(response);
        debug!(uid = %user.uid, "Token verified by backend");
        Ok(user)
    }

    /// Create or update the caller's profile.
    #[instrument(skip(self, update))]
    pub async fn create_profile(&self, update: Option<&ProfileUpdate>) -> Result<ProfileResponse> {
        self.client.post(PROFILE_PATH, update).await
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self) -> Result<ProfileResponse> {
        self.client.get(PROFILE_PATH).await
    }
}

#[async_trait]
impl AuthBackend for BackendApi {
    async fn verify_session(&self) -> Result<VerifiedUser> {
        self.verify_token().await
    }

    async fn provision_profile(&self) -> Result<()> {
        let response = self.create_profile(None).await?;
        debug!(uid = %response.uid, "Profile provisioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{harness, TokenProvider};
    use crate::error::ApiError;
    use bridge_traits::http::HttpMethod;
    use std::sync::atomic::Ordering;

    fn api(h: &crate::client::tests::Harness) -> BackendApi {
        let client = ApiClient::new(
            h.client.base_url(),
            h.http.clone(),
            h.identity.clone(),
            h.navigator.clone(),
            h.events.clone(),
        )
        .unwrap();
        BackendApi::new(Arc::new(client))
    }

    #[tokio::test]
    async fn verify_token_accepts_bare_and_wrapped_payloads() {
        let h = harness(TokenProvider::signed_in("id"));
        let api = api(&h);

        h.http.respond(
            200,
            r#"{"uid":"u1","email":"a@b.c","email_verified":true,"name":"Ada","picture":null}"#,
        );
        let bare = api.verify_token().await.unwrap();
        assert_eq!(bare.uid, "u1");
        assert!(bare.email_verified);

        h.http.respond(200, r#"{"user":{"uid":"u2"},"message":"ok"}"#);
        let wrapped = api.verify_token().await.unwrap();
        assert_eq!(wrapped.uid, "u2");
        assert_eq!(wrapped.name, None);

        let request = h.http.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://api.test/api/auth/verify-token");
        assert_eq!(request.header_value("authorization"), Some("Bearer id"));
    }

    #[tokio::test]
    async fn provision_profile_posts_without_body() {
        let h = harness(TokenProvider::signed_in("id"));
        let api = api(&h);
        h.http.respond(
            200,
            r#"{"uid":"u1","email":"a@b.c","profile":{"display_name":null,"bio":null,"preferences":{}},"message":"Profile updated successfully"}"#,
        );

        api.provision_profile().await.unwrap();

        let request = h.http.last_request();
        assert_eq!(request.url, "http://api.test/api/user/profile");
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn create_profile_sends_only_set_fields() {
        let h = harness(TokenProvider::signed_in("id"));
        let api = api(&h);
        h.http.respond(
            200,
            r#"{"uid":"u1","email":null,"profile":{"display_name":"Ada","bio":null,"preferences":{}}}"#,
        );

        let update = ProfileUpdate {
            display_name: Some("Ada".into()),
            ..Default::default()
        };
        let response = api.create_profile(Some(&update)).await.unwrap();

        assert_eq!(response.profile.display_name.as_deref(), Some("Ada"));
        assert_eq!(response.message, None);
        let sent: serde_json::Value =
            serde_json::from_slice(h.http.last_request().body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, serde_json::json!({"display_name": "Ada"}));
    }

    #[tokio::test]
    async fn get_profile_fills_missing_profile_fields() {
        let h = harness(TokenProvider::signed_in("id"));
        let api = api(&h);
        h.http.respond(200, r#"{"uid":"u1","email":"a@b.c","profile":{}}"#);

        let response = api.get_profile().await.unwrap();

        assert_eq!(response.profile, UserProfile::default());
        assert_eq!(h.http.last_request().method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn rejected_verification_revokes_session() {
        let h = harness(TokenProvider::signed_in("id"));
        let api = api(&h);
        h.http.respond(401, r#"{"detail":"Token expired"}"#);

        let err = api.verify_session().await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(h.identity.sign_outs.load(Ordering::SeqCst), 1);
        assert_eq!(h.navigator.paths.lock().unwrap().len(), 1);
    }
}
