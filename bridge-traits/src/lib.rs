//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement.
//!
//! ## Overview
//!
//! This crate defines the contract between the client session core and the
//! platform it runs in. Each trait represents a capability the core needs but
//! that a desktop shell, a test harness or an embedded webview provides
//! differently.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//! - [`SettingsStore`](storage::SettingsStore) - Key-value storage scoped to the host session
//!
//! ### Platform Integration
//! - [`Navigator`](navigation::Navigator) - Hard navigation of the host view
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across async tasks behind an `Arc`.
//!
//! ## Examples
//!
//! ### Implementing Navigator
//!
//! ```
//! use bridge_traits::navigation::Navigator;
//!
//! struct PrintNavigator;
//!
//! impl Navigator for PrintNavigator {
//!     fn hard_redirect(&self, path: &str) {
//!         println!("navigating to {path}");
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod logging;
pub mod navigation;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use navigation::Navigator;
pub use storage::{SecureStore, SettingsStore};
