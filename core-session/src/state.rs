use core_auth::UserIdentity;
use core_runtime::config::SessionSettings;
use serde::Serialize;
use std::time::Duration;

/// What the UI renders from: who is signed in, whether an auth operation is
/// running and the last error message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub user: Option<UserIdentity>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

/// Timeouts and backend hooks applied by [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Bound on resolving the current identity during initialization.
    pub identity_timeout: Duration,
    /// Bound on each sign-in, sign-out, verification or provisioning call.
    pub operation_timeout: Duration,
    pub verify_on_initialize: bool,
    pub provision_profile_on_register: bool,
    /// Repeated on every Google sign-in; provisioning is idempotent.
    pub provision_profile_on_federated_login: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionPolicy {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            identity_timeout: settings.identity_timeout,
            operation_timeout: settings.operation_timeout,
            verify_on_initialize: settings.verify_on_initialize,
            provision_profile_on_register: settings.provision_profile_on_register,
            provision_profile_on_federated_login: settings.provision_profile_on_federated_login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_signed_out_and_idle() {
        let state = SessionState::default();
        assert!(!state.is_authenticated());
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.user_id(), None);
    }

    #[test]
    fn policy_follows_settings() {
        let settings = SessionSettings {
            identity_timeout: Duration::from_secs(2),
            provision_profile_on_federated_login: false,
            ..Default::default()
        };
        let policy = SessionPolicy::from(&settings);

        assert_eq!(policy.identity_timeout, Duration::from_secs(2));
        assert!(!policy.provision_profile_on_federated_login);
        assert!(policy.verify_on_initialize);
    }
}
