#![allow(dead_code)]

use async_trait::async_trait;
use core_api::{AuthBackend, VerifiedUser};
use core_auth::{AuthError, IdentityProvider, ProviderErrorCode, Result, UserIdentity};
use core_runtime::events::EventBus;
use core_session::{SessionPolicy, SessionStore};
use mockall::mock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const PASSWORD: &str = "correct-horse";

pub fn ada() -> UserIdentity {
    UserIdentity::new("uid-ada", "password").with_email("ada@example.com")
}

/// In-memory identity provider with switchable failures.
#[derive(Default)]
pub struct FakeIdentity {
    pub signed_in: Mutex<Option<UserIdentity>>,
    pub lookup_delay: Mutex<Duration>,
    pub fail_lookup: AtomicBool,
    pub fail_sign_out: AtomicBool,
    /// When set, sign-in calls wait for `release` before completing.
    pub gated: AtomicBool,
    pub release: Notify,
    pub lookups: AtomicUsize,
    pub sign_ins: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl FakeIdentity {
    pub fn with_session(user: UserIdentity) -> Self {
        let fake = Self::default();
        *fake.signed_in.lock().unwrap() = Some(user);
        fake
    }

    async fn wait_for_release(&self) {
        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
    }

    fn establish(&self, user: UserIdentity) -> UserIdentity {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        *self.signed_in.lock().unwrap() = Some(user.clone());
        user
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_account(
        &self,
        email: &str,
        _password: &str,
        display_name: Option<&str>,
    ) -> Result<UserIdentity> {
        self.wait_for_release().await;
        if email == "taken@example.com" {
            return Err(AuthError::provider(ProviderErrorCode::EmailExists));
        }

        let mut user = UserIdentity::new(format!("uid-{email}"), "password").with_email(email);
        user.display_name = display_name.map(str::to_string);
        Ok(self.establish(user))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserIdentity> {
        self.wait_for_release().await;
        if email != "ada@example.com" || password != PASSWORD {
            return Err(AuthError::provider(ProviderErrorCode::InvalidCredentials));
        }
        Ok(self.establish(ada()))
    }

    async fn authenticate_federated(&self) -> Result<UserIdentity> {
        self.wait_for_release().await;
        let user = UserIdentity::new("uid-google", "google.com")
            .with_email("grace@example.com")
            .with_display_name("Grace");
        Ok(self.establish(user))
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::NetworkError("offline".into()));
        }
        *self.signed_in.lock().unwrap() = None;
        Ok(())
    }

    async fn current_identity(&self) -> Result<Option<UserIdentity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *self.lookup_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(AuthError::NetworkError("lookup failed".into()));
        }
        Ok(self.signed_in.lock().unwrap().clone())
    }

    async fn id_token(&self, _force_refresh: bool) -> Result<Option<String>> {
        Ok(self
            .signed_in
            .lock()
            .unwrap()
            .as_ref()
            .map(|u| format!("token-{}", u.id)))
    }
}

mock! {
    pub Backend {}

    #[async_trait]
    impl AuthBackend for Backend {
        async fn verify_session(&self) -> core_api::Result<VerifiedUser>;
        async fn provision_profile(&self) -> core_api::Result<()>;
    }
}

pub fn verified(uid: &str) -> VerifiedUser {
    VerifiedUser {
        uid: uid.to_string(),
        email: None,
        email_verified: true,
        name: None,
        picture: None,
    }
}

pub fn fast_policy() -> SessionPolicy {
    SessionPolicy {
        identity_timeout: Duration::from_millis(200),
        operation_timeout: Duration::from_millis(500),
        ..SessionPolicy::default()
    }
}

pub fn store_with(identity: Arc<FakeIdentity>, events: &EventBus) -> SessionStore {
    SessionStore::new(identity, events.clone(), fast_policy())
}

/// Poll until the store reports an operation in progress.
pub async fn wait_until_loading(store: &SessionStore) {
    for _ in 0..1000 {
        if store.is_loading() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("store never started loading");
}
