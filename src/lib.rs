//! Workspace facade crate.
//!
//! Re-exports `core-service` so host applications can depend on
//! `datafy-workspace` and pick the documented features (`desktop-shims`,
//! `secure-store`) without wiring each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "secure-store"))]
pub use core_service::*;
