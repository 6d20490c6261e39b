//! In-process secure store

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::SecureStore};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// A [`SecureStore`] that keeps secrets in memory.
///
/// Used when the `secure-store` feature is disabled and in tests. Nothing
/// survives the process, so a restart always starts signed out.
#[derive(Default)]
pub struct MemorySecureStore {
    secrets: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.secrets
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.secrets.read().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.secrets.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.secrets.read().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.secrets.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemorySecureStore::new();
        store.set_secret("identity.session", b"abc").await.unwrap();

        assert_eq!(
            store.get_secret("identity.session").await.unwrap(),
            Some(b"abc".to_vec())
        );
        assert_eq!(store.list_keys().await.unwrap(), vec!["identity.session"]);

        store.delete_secret("identity.session").await.unwrap();
        assert!(!store.has_secret("identity.session").await.unwrap());
    }
}
