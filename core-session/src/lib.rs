//! # Session Core
//!
//! Client-side session state for the Datafy client.
//!
//! ## Overview
//!
//! - [`SessionStore`] owns the [`SessionState`] (`user`, `loading`,
//!   `error`) and runs register, login, Google login, logout and
//!   initialization against an [`IdentityProvider`](core_auth::IdentityProvider),
//!   optionally verifying sessions with an
//!   [`AuthBackend`](core_api::AuthBackend).
//! - [`RouteGuard`] decides whether a navigation may proceed based on the
//!   route's [`RouteMeta`].
//! - [`Router`] resolves paths through a [`RouteTable`] and follows guard
//!   redirects.
//!
//! State changes are published on a `tokio::sync::watch` channel and as
//! [`AuthEvent`](core_runtime::events::AuthEvent)s on the event bus.

pub mod error;
pub mod guard;
pub mod router;
pub mod state;
pub mod store;

pub use error::NavigationError;
pub use guard::{decide, GuardDecision, RouteGuard, RouteMeta};
pub use router::{RouteDef, RouteTable, Router};
pub use state::{SessionPolicy, SessionState};
pub use store::SessionStore;
