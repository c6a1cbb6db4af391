use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::VaultError;

/// Trait for credential vault backends.
///
/// Called only after a resource lock is held, with the locked resource's
/// `secret_ref`. Secrets stay wrapped in [`SecretString`] so they are not
/// logged or debug-printed on the way to the executor.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Fetch the plaintext credential stored under `name`.
    async fn get_secret(&self, name: &str) -> Result<SecretString, VaultError>;
}
