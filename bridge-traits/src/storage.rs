//! Storage Abstractions
//!
//! Provides platform-agnostic traits for secure credential storage and
//! key-value storage scoped to the running host session.

use async_trait::async_trait;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts secure storage mechanisms:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service / libsecret
///
/// The identity provider keeps its persisted session here so a restart can
/// restore the signed-in user without asking for credentials again.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Encrypt data at rest
/// - Use platform-provided secure storage when available
/// - Never log or expose sensitive data
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_session(store: &dyn SecureStore, payload: &[u8]) -> Result<()> {
///     store.set_secret("identity.session", payload).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value for `key`.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// List all secret keys (without values)
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all secrets owned by this store
    async fn clear_all(&self) -> Result<()>;
}

/// Key-value settings storage trait
///
/// Backs state that should survive a reload of the host view but not a new
/// session, such as the working dataset.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_snapshot(store: &dyn SettingsStore, json: &str) -> Result<()> {
///     store.set_string("dataStore", json).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Secrets {}

        #[async_trait]
        impl SecureStore for Secrets {
            async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;
            async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;
            async fn delete_secret(&self, key: &str) -> Result<()>;
            async fn list_keys(&self) -> Result<Vec<String>>;
            async fn clear_all(&self) -> Result<()>;
        }
    }

    mock! {
        Settings {}

        #[async_trait]
        impl SettingsStore for Settings {
            async fn set_string(&self, key: &str, value: &str) -> Result<()>;
            async fn get_string(&self, key: &str) -> Result<Option<String>>;
            async fn delete(&self, key: &str) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn has_key_delegates_to_get_string() {
        let mut store = MockSettings::new();
        store
            .expect_get_string()
            .returning(|key| Ok((key == "dataStore").then(|| "{}".to_string())));

        assert!(store.has_key("dataStore").await.unwrap());
        assert!(!store.has_key("theme").await.unwrap());
    }

    #[tokio::test]
    async fn has_secret_delegates_to_get_secret() {
        let mut store = MockSecrets::new();
        store.expect_get_secret().returning(|key| {
            if key == "identity.session" {
                Ok(Some(b"{}".to_vec()))
            } else {
                Ok(None)
            }
        });

        assert!(store.has_secret("identity.session").await.unwrap());
        assert!(!store.has_secret("missing").await.unwrap());
    }
}
