//! # Event Bus System
//!
//! Decoupled communication between the client core modules using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies per domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    emit     ┌───────────┐
//! │ Session store ├────────────>│           │
//! └───────────────┘             │           │
//!                               │ EventBus  │
//! ┌───────────────┐    emit     │ (broadcast│    subscribe   ┌────────────┐
//! │  API client   ├────────────>│  channel) ├───────────────>│ UI / host  │
//! └───────────────┘             │           │                └────────────┘
//!                               │           │
//! ┌───────────────┐    emit     │           │    subscribe   ┌────────────────────┐
//! │    Router     ├────────────>│           ├───────────────>│ Revocation listener│
//! └───────────────┘             └───────────┘                └────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedIn {
//!         user_id: "uid-123".to_string(),
//!         provider: "password".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Auth(_)));
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Authentication Events
//! - `SigningIn`: An auth operation started
//! - `SignedIn`: A user is now authenticated
//! - `SignedOut`: The user signed out
//! - `SessionRevoked`: The backend rejected the session credential
//! - `Initialized`: The first identity resolution finished
//! - `AuthError`: An auth operation failed
//!
//! ### Navigation Events
//! - `Navigated`: The router settled on a route
//! - `Redirected`: The guard sent the user elsewhere
//!
//! ### Dataset Events
//! - `DataLoaded`, `ProcessedDataUpdated`, `Cleared`
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns an error that callers ignore with
//! `let _ = bus.emit(..)`; nobody listening is not a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication and session events
    Auth(AuthEvent),
    /// Route changes
    Navigation(NavigationEvent),
    /// Working dataset changes
    Dataset(DatasetEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Navigation(e) => e.description(),
            CoreEvent::Dataset(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SessionRevoked { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events describing the lifecycle of the user session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An auth operation started.
    SigningIn {
        /// Which flow: "register", "login" or "google".
        method: String,
    },
    /// A user is authenticated.
    SignedIn {
        /// Identity provider user id.
        user_id: String,
        /// Sign-in provider ("password", "google.com").
        provider: String,
    },
    /// The user signed out, or the session was cleared locally.
    SignedOut {
        /// The user that was signed out, if one was known.
        user_id: Option<String>,
    },
    /// The backend rejected the session credential and a forced logout ran.
    SessionRevoked {
        /// Why the session was revoked.
        reason: String,
    },
    /// The first identity resolution finished.
    Initialized {
        /// Whether a user was restored.
        authenticated: bool,
    },
    /// An auth operation failed.
    AuthError {
        /// The user involved, if known.
        user_id: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Whether the session is still usable.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::SignedOut { .. } => "User signed out",
            AuthEvent::SessionRevoked { .. } => "Session revoked by backend",
            AuthEvent::Initialized { .. } => "Session initialized",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Navigation Events
// ============================================================================

/// Events emitted by the router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NavigationEvent {
    /// The router settled on `path`.
    Navigated {
        path: String,
        /// Route name, when the path matched a known route.
        name: Option<String>,
    },
    /// The guard redirected a navigation.
    Redirected { from: String, to: String },
}

impl NavigationEvent {
    fn description(&self) -> &str {
        match self {
            NavigationEvent::Navigated { .. } => "Navigated",
            NavigationEvent::Redirected { .. } => "Navigation redirected",
        }
    }
}

// ============================================================================
// Dataset Events
// ============================================================================

/// Events emitted when the working dataset changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DatasetEvent {
    /// New source data was stored.
    DataLoaded {
        file_count: usize,
        row_count: usize,
        column_count: usize,
    },
    /// Processed output replaced.
    ProcessedDataUpdated { row_count: usize },
    /// The dataset was cleared.
    Cleared,
}

impl DatasetEvent {
    fn description(&self) -> &str {
        match self {
            DatasetEvent::DataLoaded { .. } => "Dataset loaded",
            DatasetEvent::ProcessedDataUpdated { .. } => "Processed data updated",
            DatasetEvent::Cleared => "Dataset cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another sender on the same channel. Each
/// `subscribe()` creates an independent receiver that sees every event sent
/// after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts seeing `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Creates a filtered stream over a new subscription.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let auth_only = event_bus
///     .stream()
///     .filter(|event| matches!(event, CoreEvent::Auth(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
