//! Secure Credential Storage using OS Keychain

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const DEFAULT_SERVICE: &str = "datafy-client";
const INDEX_KEY: &str = "__datafy_key_index";

/// Keyring-based secure storage
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// The keyring cannot enumerate entries, so the store keeps its own index of
/// keys under a reserved entry. That index backs `list_keys` and `clear_all`.
pub struct KeyringSecureStore {
    service_name: String,
    index_lock: Mutex<()>,
}

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service_name, key).map_err(Self::map_keyring_error)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }

    fn read_index(&self) -> Result<Vec<String>> {
        match self.entry(INDEX_KEY)?.get_password() {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                BridgeError::Storage(format!("Corrupt keyring index: {}", e))
            }),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn write_index(&self, keys: &[String]) -> Result<()> {
        let raw = serde_json::to_string(keys)
            .map_err(|e| BridgeError::Storage(format!("Failed to encode index: {}", e)))?;
        self.entry(INDEX_KEY)?
            .set_password(&raw)
            .map_err(Self::map_keyring_error)
    }

    async fn update_index(&self, f: impl FnOnce(&mut Vec<String>)) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let mut keys = self.read_index()?;
        f(&mut keys);
        self.write_index(&keys)
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        // Keyring only stores strings
        let encoded = STANDARD.encode(value);

        self.entry(key)?
            .set_password(&encoded)
            .map_err(Self::map_keyring_error)?;

        self.update_index(|keys| {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        })
        .await?;

        debug!(key, "Stored secret in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.entry(key)?.get_password() {
            Ok(encoded) => {
                let decoded = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                    error!(key, error = %e, "Failed to decode secret");
                    BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
                })?;
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => return Err(Self::map_keyring_error(e)),
        }

        self.update_index(|keys| keys.retain(|k| k != key)).await?;

        debug!(key, "Deleted secret from keyring");
        Ok(())
    }

    async fn has_secret(&self, key: &str) -> Result<bool> {
        match self.entry(key)?.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let _guard = self.index_lock.lock().await;
        self.read_index()
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let keys = self.read_index()?;

        for key in &keys {
            match self.entry(key)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to delete secret"),
            }
        }

        self.write_index(&[])?;
        debug!(count = keys.len(), "Cleared keyring secrets");
        Ok(())
    }
}
