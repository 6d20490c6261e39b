//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with retry and backoff
//! - `SecureStore` using the `keyring` crate, or an in-process map when the
//!   `secure-store` feature is disabled
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `Navigator` forwarding hard redirects over a tokio channel
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ChannelNavigator, ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::in_memory().await?;
//!     let (navigator, mut redirects) = ChannelNavigator::new();
//!
//!     // Hand these to the core configuration
//!     Ok(())
//! }
//! ```

mod http;
mod memory_store;
mod navigator;
mod settings;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;
pub use memory_store::MemorySecureStore;
pub use navigator::ChannelNavigator;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
