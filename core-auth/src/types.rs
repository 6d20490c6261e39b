use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider id reported for email/password accounts.
pub const PASSWORD_PROVIDER_ID: &str = "password";
/// Provider id reported for Google federated accounts.
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// The signed-in user as reported by the identity provider.
///
/// Plain data: the bearer token is fetched separately through
/// [`IdentityProvider::id_token`](crate::IdentityProvider::id_token) so an
/// identity can be cloned into UI state without carrying credentials.
///
/// # Examples
///
/// ```
/// use core_auth::UserIdentity;
///
/// let user = UserIdentity::new("uid-1", "password")
///     .with_email("ada@example.com")
///     .with_display_name("Ada");
///
/// assert_eq!(user.label(), "Ada");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Provider user id (Firebase `localId`).
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// Sign-in method, e.g. `password` or `google.com`.
    pub provider_id: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
            email_verified: false,
            provider_id: provider_id.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    /// Best human-readable label: display name, then email, then id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn is_federated(&self) -> bool {
        self.provider_id != PASSWORD_PROVIDER_ID
    }
}

/// Token set issued by the identity provider.
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
///
/// ```
/// use core_auth::IdTokens;
///
/// let tokens = IdTokens::new("eyJ...".to_string(), "AMf...".to_string(), 3600);
/// assert!(!tokens.is_expired());
/// assert!(!format!("{:?}", tokens).contains("eyJ"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokens {
    /// Short-lived ID token sent as the bearer credential.
    pub id_token: String,
    /// Long-lived token used to mint new ID tokens.
    pub refresh_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl IdTokens {
    pub fn new(id_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            id_token,
            refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// True when the ID token expires within five minutes.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(300)
    }

    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        chrono::Utc::now() >= self.expires_at - chrono::Duration::seconds(buffer_seconds)
    }

    /// Returns `None` if the token is already expired.
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        let now = chrono::Utc::now();
        (now < self.expires_at).then(|| self.expires_at - now)
    }
}

impl fmt::Debug for IdTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdTokens")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Which auth flow an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMethod {
    Register,
    Login,
    Google,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Register => "register",
            AuthMethod::Login => "login",
            AuthMethod::Google => "google",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error codes reported by the identity provider.
///
/// Parsed from the REST error payload (`{"error":{"message":"EMAIL_EXISTS"}}`).
/// Messages may carry a detail suffix such as
/// `WEAK_PASSWORD : Password should be at least 6 characters`; only the code
/// before the colon is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderErrorCode {
    EmailExists,
    EmailNotFound,
    InvalidPassword,
    InvalidCredentials,
    InvalidEmail,
    WeakPassword,
    UserDisabled,
    UserNotFound,
    TooManyAttempts,
    OperationNotAllowed,
    TokenExpired,
    InvalidIdToken,
    InvalidRefreshToken,
    /// The user dismissed the federated sign-in prompt.
    FederatedCancelled,
    Unknown(String),
}

impl ProviderErrorCode {
    pub fn parse(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or(message).trim();

        match code {
            "EMAIL_EXISTS" => Self::EmailExists,
            "EMAIL_NOT_FOUND" => Self::EmailNotFound,
            "INVALID_PASSWORD" => Self::InvalidPassword,
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" => Self::InvalidCredentials,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" | "MISSING_PASSWORD" => Self::WeakPassword,
            "USER_DISABLED" => Self::UserDisabled,
            "USER_NOT_FOUND" => Self::UserNotFound,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "OPERATION_NOT_ALLOWED" => Self::OperationNotAllowed,
            "TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => Self::TokenExpired,
            "INVALID_ID_TOKEN" => Self::InvalidIdToken,
            "INVALID_REFRESH_TOKEN" | "MISSING_REFRESH_TOKEN" | "INVALID_GRANT_TYPE" => {
                Self::InvalidRefreshToken
            }
            "POPUP_CLOSED_BY_USER" | "CANCELLED_POPUP_REQUEST" => Self::FederatedCancelled,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Stable code in the `auth/...` namespace used by web clients.
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailExists => "auth/email-already-in-use",
            Self::EmailNotFound => "auth/user-not-found",
            Self::InvalidPassword => "auth/wrong-password",
            Self::InvalidCredentials => "auth/invalid-credential",
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword => "auth/weak-password",
            Self::UserDisabled => "auth/user-disabled",
            Self::UserNotFound => "auth/user-not-found",
            Self::TooManyAttempts => "auth/too-many-requests",
            Self::OperationNotAllowed => "auth/operation-not-allowed",
            Self::TokenExpired => "auth/user-token-expired",
            Self::InvalidIdToken => "auth/invalid-user-token",
            Self::InvalidRefreshToken => "auth/invalid-refresh-token",
            Self::FederatedCancelled => "auth/popup-closed-by-user",
            Self::Unknown(raw) => raw,
        }
    }

    /// Message suitable for showing next to a sign-in form.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmailExists => "An account with this email already exists",
            Self::EmailNotFound | Self::UserNotFound => "No account found for this email",
            Self::InvalidPassword | Self::InvalidCredentials => "Invalid email or password",
            Self::InvalidEmail => "The email address is not valid",
            Self::WeakPassword => "Password should be at least 6 characters",
            Self::UserDisabled => "This account has been disabled",
            Self::TooManyAttempts => "Too many attempts, try again later",
            Self::OperationNotAllowed => "This sign-in method is not enabled",
            Self::TokenExpired | Self::InvalidIdToken | Self::InvalidRefreshToken => {
                "Your session has expired, please sign in again"
            }
            Self::FederatedCancelled => "Sign-in was cancelled",
            Self::Unknown(_) => "Authentication failed",
        }
    }

    /// Whether this code means the stored session can no longer be used.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired
                | Self::InvalidIdToken
                | Self::InvalidRefreshToken
                | Self::UserDisabled
                | Self::UserNotFound
                | Self::EmailNotFound
        )
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_identity_label_fallbacks() {
        let bare = UserIdentity::new("uid-1", PASSWORD_PROVIDER_ID);
        assert_eq!(bare.label(), "uid-1");

        let with_email = bare.clone().with_email("a@b.c");
        assert_eq!(with_email.label(), "a@b.c");
        assert!(!with_email.is_federated());

        let google = UserIdentity::new("uid-2", GOOGLE_PROVIDER_ID).with_display_name("Grace");
        assert_eq!(google.label(), "Grace");
        assert!(google.is_federated());
    }

    #[test]
    fn test_identity_deserializes_without_verified_flag() {
        let json = r#"{"id":"u","email":null,"display_name":null,"provider_id":"password"}"#;
        let identity: UserIdentity = serde_json::from_str(json).unwrap();
        assert!(!identity.email_verified);
    }

    #[test]
    fn test_tokens_expiry() {
        let tokens = IdTokens {
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::minutes(3),
        };

        assert!(tokens.is_expired());
        assert!(!tokens.is_expired_with_buffer(60));
        assert!(tokens.time_until_expiry().is_some());

        let stale = IdTokens {
            expires_at: Utc::now() - Duration::seconds(1),
            ..tokens
        };
        assert!(stale.time_until_expiry().is_none());
    }

    #[test]
    fn test_tokens_debug_redacts() {
        let tokens = IdTokens::new("secret-id".into(), "secret-refresh".into(), 3600);
        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("secret-id"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ProviderErrorCode::parse("EMAIL_EXISTS"),
            ProviderErrorCode::EmailExists
        );
        assert_eq!(
            ProviderErrorCode::parse("WEAK_PASSWORD : Password should be at least 6 characters"),
            ProviderErrorCode::WeakPassword
        );
        assert_eq!(
            ProviderErrorCode::parse("INVALID_LOGIN_CREDENTIALS"),
            ProviderErrorCode::InvalidCredentials
        );
        assert_eq!(
            ProviderErrorCode::parse("SOMETHING_NEW"),
            ProviderErrorCode::Unknown("SOMETHING_NEW".to_string())
        );
    }

    #[test]
    fn test_error_code_semantics() {
        assert_eq!(
            ProviderErrorCode::EmailExists.as_str(),
            "auth/email-already-in-use"
        );
        assert!(ProviderErrorCode::InvalidRefreshToken.invalidates_session());
        assert!(!ProviderErrorCode::TooManyAttempts.invalidates_session());
        assert_eq!(
            ProviderErrorCode::Unknown("HTTP 503".into()).to_string(),
            "HTTP 503"
        );
    }

    #[test]
    fn test_auth_method_names() {
        assert_eq!(AuthMethod::Register.as_str(), "register");
        assert_eq!(AuthMethod::Google.to_string(), "google");
    }
}
