//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the Datafy client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types,
//! its event vocabulary and its logging conventions.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AppConfig, AppConfigBuilder, ApiSettings, IdentitySettings, SessionSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
