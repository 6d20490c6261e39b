//! # Session Store
//!
//! Reconciles identity provider state with backend verification and exposes
//! the result as a [`SessionState`] the UI can watch.
//!
//! ## Guarantees
//!
//! - `loading` is cleared on every exit path, including errors, panics and
//!   the caller dropping the future.
//! - Only one mutating operation runs at a time. Sign-in calls made while
//!   another operation is running fail with
//!   [`AuthError::OperationInProgress`], which is recorded in `error` while
//!   `user` and `loading` are left alone; `initialize` and `logout` wait
//!   their turn.
//! - A backend revocation clears the user immediately, without waiting for
//!   a running operation.
//! - Concurrent `initialize` calls coalesce into one identity lookup and one
//!   backend verification.
//! - Provider and backend calls are bounded by the [`SessionPolicy`] timeouts.
//!
//! ## Usage
//!
//! ```no_run
//! use core_session::{SessionPolicy, SessionStore};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! # use core_auth::IdentityProvider;
//!
//! # async fn example(identity: Arc<dyn IdentityProvider>) -> core_auth::Result<()> {
//! let store = Arc::new(SessionStore::new(identity, EventBus::default(), SessionPolicy::default()));
//! let mut updates = store.subscribe();
//!
//! store.initialize().await;
//! if !store.is_authenticated() {
//!     store.login("ada@example.com", "hunter22").await?;
//! }
//!
//! updates.changed().await.ok();
//! println!("loading = {}", updates.borrow().loading);
//! # Ok(())
//! # }
//! ```

use crate::state::{SessionPolicy, SessionState};
use core_api::{AuthBackend, SessionRevoker};
use core_auth::{AuthError, AuthMethod, IdentityProvider, Result, UserIdentity};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Clears `loading` when dropped.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionState>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<SessionState>, clear_error: bool) -> Self {
        state.send_modify(|s| {
            s.loading = true;
            if clear_error {
                s.error = None;
            }
        });
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.loading = false);
    }
}

async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?limit, "Auth operation timed out");
            Err(AuthError::OperationTimeout {
                operation: operation.to_string(),
            })
        }
    }
}

pub struct SessionStore {
    identity: Arc<dyn IdentityProvider>,
    backend: Option<Arc<dyn AuthBackend>>,
    event_bus: EventBus,
    policy: SessionPolicy,
    state: watch::Sender<SessionState>,
    in_flight: Mutex<()>,
    /// Completed initializations; lets waiting callers detect they were
    /// overtaken by another `initialize`.
    init_generation: AtomicU64,
    initialized: AtomicBool,
    /// Bumped on every cleared session.
    revocations: AtomicU64,
}

impl SessionStore {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        event_bus: EventBus,
        policy: SessionPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());

        Self {
            identity,
            backend: None,
            event_bus,
            policy,
            state,
            in_flight: Mutex::new(()),
            init_generation: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            revocations: AtomicU64::new(0),
        }
    }

    /// Verify restored sessions and provision profiles through `backend`.
    pub fn with_backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Whether an `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn record_failure(&self, user_id: Option<String>, err: &AuthError) {
        let message = err.to_string();
        self.state.send_modify(|s| s.error = Some(message.clone()));
        self.emit(AuthEvent::AuthError {
            user_id,
            message,
            recoverable: err.is_recoverable(),
        });
    }

    /// Resolve the current identity once and verify it with the backend.
    ///
    /// Failures are recorded in the state (user cleared, error set) rather
    /// than returned.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionState {
        let seen = self.init_generation.load(Ordering::Acquire);
        let _op = self.in_flight.lock().await;

        if self.init_generation.load(Ordering::Acquire) != seen {
            debug!("Initialization already completed by a concurrent caller");
            return self.snapshot();
        }

        let _loading = LoadingGuard::begin(&self.state, false);

        let outcome = match bounded(
            self.policy.identity_timeout,
            "initialize",
            self.identity.current_identity(),
        )
        .await
        {
            Ok(Some(user)) if self.policy.verify_on_initialize => {
                self.verify(&user).await.map(|()| Some(user))
            }
            other => other,
        };

        match outcome {
            Ok(user) => {
                let authenticated = user.is_some();
                if let Some(user) = &user {
                    info!(user_id = %user.id, "Session restored");
                } else {
                    debug!("No existing session");
                }
                self.state.send_modify(|s| s.user = user);
                self.emit(AuthEvent::Initialized { authenticated });
            }
            Err(e) => {
                error!(error = %e, "Session initialization failed");
                self.state.send_modify(|s| s.user = None);
                self.record_failure(None, &e);
                self.emit(AuthEvent::Initialized {
                    authenticated: false,
                });
            }
        }

        self.init_generation.fetch_add(1, Ordering::AcqRel);
        self.initialized.store(true, Ordering::Release);
        self.snapshot()
    }

    /// Run [`initialize`](Self::initialize) unless one already completed.
    pub async fn ensure_initialized(&self) {
        if !self.is_initialized() {
            self.initialize().await;
        }
    }

    async fn verify(&self, user: &UserIdentity) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        let verified = bounded(self.policy.operation_timeout, "verify", async {
            backend
                .verify_session()
                .await
                .map_err(|e| AuthError::BackendVerification(e.to_string()))
        })
        .await?;

        if verified.uid != user.id {
            return Err(AuthError::BackendVerification(format!(
                "Backend verified {} but provider reports {}",
                verified.uid, user.id
            )));
        }

        debug!(user_id = %user.id, "Backend verified session");
        Ok(())
    }

    /// Best-effort profile creation after sign-in.
    async fn provision(&self, user: &UserIdentity) {
        let Some(backend) = &self.backend else {
            return;
        };

        let result = bounded(self.policy.operation_timeout, "provision_profile", async {
            backend
                .provision_profile()
                .await
                .map_err(|e| AuthError::BackendVerification(e.to_string()))
        })
        .await;

        if let Err(e) = result {
            warn!(user_id = %user.id, error = %e, "Profile provisioning failed, keeping session");
            self.emit(AuthEvent::AuthError {
                user_id: Some(user.id.clone()),
                message: e.to_string(),
                recoverable: true,
            });
        }
    }

    async fn sign_in<F>(
        &self,
        method: AuthMethod,
        provision: bool,
        operation: F,
    ) -> Result<UserIdentity>
    where
        F: Future<Output = Result<UserIdentity>>,
    {
        let _op = match self.in_flight.try_lock() {
            Ok(op) => op,
            Err(_) => {
                let err = AuthError::OperationInProgress {
                    operation: method.to_string(),
                };
                debug!(%method, "Rejected sign-in while another operation runs");
                self.record_failure(None, &err);
                return Err(err);
            }
        };
        let _loading = LoadingGuard::begin(&self.state, true);

        self.emit(AuthEvent::SigningIn {
            method: method.to_string(),
        });

        match bounded(self.policy.operation_timeout, method.as_str(), operation).await {
            Ok(user) => {
                info!(user_id = %user.id, %method, "Signed in");
                let epoch = self.revocations.load(Ordering::Acquire);
                self.state.send_modify(|s| {
                    s.user = Some(user.clone());
                    s.error = None;
                });
                self.emit(AuthEvent::SignedIn {
                    user_id: user.id.clone(),
                    provider: user.provider_id.clone(),
                });

                if provision {
                    self.provision(&user).await;
                }

                if self.revocations.load(Ordering::Acquire) != epoch {
                    let err = AuthError::BackendVerification(
                        "Session was revoked while signing in".to_string(),
                    );
                    warn!(user_id = %user.id, %method, "Session revoked during sign-in");
                    self.record_failure(Some(user.id.clone()), &err);
                    return Err(err);
                }
                Ok(user)
            }
            Err(e) => {
                warn!(%method, error = %e, "Sign-in failed");
                self.record_failure(None, &e);
                Err(e)
            }
        }
    }

    /// Create an email/password account and sign it in.
    #[instrument(skip(self, email, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<UserIdentity> {
        self.register_with_name(email, password, None).await
    }

    /// Like [`register`](Self::register), also setting the display name.
    #[instrument(skip(self, email, password))]
    pub async fn register_with_name(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserIdentity> {
        self.sign_in(
            AuthMethod::Register,
            self.policy.provision_profile_on_register,
            self.identity.create_account(email, password, display_name),
        )
        .await
    }

    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserIdentity> {
        self.sign_in(
            AuthMethod::Login,
            false,
            self.identity.authenticate(email, password),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn login_with_google(&self) -> Result<UserIdentity> {
        self.sign_in(
            AuthMethod::Google,
            self.policy.provision_profile_on_federated_login,
            self.identity.authenticate_federated(),
        )
        .await
    }

    /// Sign out. The user is cleared even when the provider call fails; the
    /// failure is recorded in `error`.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let _op = self.in_flight.lock().await;
        let _loading = LoadingGuard::begin(&self.state, false);
        let user_id = self.state.borrow().user_id().map(str::to_string);

        let result = bounded(
            self.policy.operation_timeout,
            "logout",
            self.identity.sign_out(),
        )
        .await;

        match result {
            Ok(()) => {
                self.state.send_modify(|s| {
                    s.user = None;
                    s.error = None;
                });
                info!("Signed out");
                self.emit(AuthEvent::SignedOut { user_id });
            }
            Err(e) => {
                warn!(error = %e, "Sign-out failed, clearing local session anyway");
                self.state.send_modify(|s| s.user = None);
                self.record_failure(user_id, &e);
            }
        }
    }

    /// Drop the user without calling the provider.
    ///
    /// Used after the provider session was already ended elsewhere, such as a
    /// forced sign-out on a `401`. Does not wait for a running operation; a
    /// sign-in that overlaps the clear reports failure instead of restoring
    /// the user.
    #[instrument(skip(self))]
    pub fn clear_session(&self, reason: &str) {
        self.revocations.fetch_add(1, Ordering::AcqRel);

        let mut user_id = None;
        self.state.send_modify(|s| user_id = s.user.take().map(|u| u.id));

        match user_id {
            Some(user_id) => {
                info!(reason, "Clearing session");
                self.emit(AuthEvent::SignedOut {
                    user_id: Some(user_id),
                });
            }
            None => debug!(reason, "No session to clear"),
        }
    }

    /// Current ID token, bounded by the operation timeout.
    pub async fn id_token(&self) -> Result<Option<String>> {
        bounded(
            self.policy.operation_timeout,
            "id_token",
            self.identity.id_token(false),
        )
        .await
    }

    /// Clear the session whenever [`AuthEvent::SessionRevoked`] is published
    /// on `event_bus`.
    ///
    /// The task holds only a weak reference and ends when the store is
    /// dropped or the bus closes.
    pub fn spawn_revocation_listener(
        self: &Arc<Self>,
        event_bus: &EventBus,
    ) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let mut receiver = event_bus.subscribe();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(CoreEvent::Auth(AuthEvent::SessionRevoked { reason })) => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        store.clear_session(&reason);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Revocation listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }

                if store.strong_count() == 0 {
                    break;
                }
            }
            debug!("Revocation listener stopped");
        })
    }
}

impl SessionRevoker for SessionStore {
    fn revoke(&self, reason: &str) {
        self.clear_session(reason);
    }
}
