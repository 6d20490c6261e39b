//! # Backend API Client
//!
//! Authenticated access to the Datafy backend.
//!
//! [`ApiClient`] injects the signed-in user's ID token into every request and
//! turns a `401` into a forced sign-out plus a hard redirect to the login
//! page. [`BackendApi`] wraps the endpoints the session layer uses and
//! implements [`AuthBackend`].

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{
    AuthBackend, BackendApi, ProfileResponse, ProfileUpdate, UserProfile, VerifiedUser,
    PROFILE_PATH, VERIFY_TOKEN_PATH,
};
pub use client::{ApiClient, SessionRevoker};
pub use error::{ApiError, Result};
