//! # Authentication Module
//!
//! Identity provider abstraction and the Firebase implementation used by the
//! Datafy client.
//!
//! ## Overview
//!
//! The session layer talks to an [`IdentityProvider`]: create an account,
//! sign in with email/password or a federated Google credential, sign out,
//! resolve the current identity and hand out ID tokens for backend calls.
//! [`FirebaseIdentityProvider`] implements it over the Identity Toolkit REST
//! API using the host [`HttpClient`](bridge_traits::HttpClient) and keeps the
//! session in the host [`SecureStore`](bridge_traits::SecureStore).
//!
//! ## Features
//!
//! - Email/password registration with optional display name
//! - Google sign-in through a host [`FederatedCredentialSource`]
//! - Session restore and automatic ID token refresh
//! - Provider error codes mapped to user-facing messages

pub mod error;
pub mod firebase;
pub mod provider;
pub mod types;

pub use error::{AuthError, Result};
pub use firebase::FirebaseIdentityProvider;
pub use provider::{FederatedCredential, FederatedCredentialSource, IdentityProvider};
pub use types::{
    AuthMethod, IdTokens, ProviderErrorCode, UserIdentity, GOOGLE_PROVIDER_ID,
    PASSWORD_PROVIDER_ID,
};
