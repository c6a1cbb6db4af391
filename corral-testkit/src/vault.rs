use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;

use corral::error::VaultError;
use corral::vault::CredentialVault;

/// Vault backed by a fixed name-to-secret map.
#[derive(Clone, Default)]
pub struct StaticVault {
    secrets: Arc<Mutex<HashMap<String, String>>>,
}

impl StaticVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(name: impl Into<String>, value: impl Into<String>) -> Self {
        let vault = Self::new();
        vault.insert(name, value);
        vault
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.lock().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.secrets.lock().remove(name);
    }
}

#[async_trait]
impl CredentialVault for StaticVault {
    async fn get_secret(&self, name: &str) -> Result<SecretString, VaultError> {
        self.secrets
            .lock()
            .get(name)
            .map(|value| SecretString::from(value.clone()))
            .ok_or_else(|| VaultError::NotFound(name.to_string()))
    }
}
