//! Delivery credential storage.
//!
//! The credential is held in a `Zeroizing` buffer so it is wiped from memory
//! when replaced or dropped. It is never logged or serialized.

use parking_lot::RwLock;
use tracing::info;
use zeroize::Zeroizing;

use crate::error::{DeliveryError, DeliveryResult};

/// Shared holder of the delivery credential.
#[derive(Default)]
pub struct CredentialStore {
    secret: RwLock<Option<Zeroizing<String>>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.is_present())
            .finish()
    }
}

impl CredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a credential, replacing any previous one.
    pub fn set(&self, credential: impl Into<String>) -> DeliveryResult<()> {
        let credential = Zeroizing::new(credential.into());
        if credential.trim().is_empty() {
            return Err(DeliveryError::MissingCredential(
                "credential is required".to_string(),
            ));
        }

        let replaced = self.secret.write().replace(credential).is_some();
        info!(replaced, "Delivery credential set");
        Ok(())
    }

    /// Remove the stored credential.
    pub fn clear(&self) {
        if self.secret.write().take().is_some() {
            info!("Delivery credential cleared");
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.secret.read().is_some()
    }

    /// Copy of the credential for one request.
    #[must_use]
    pub fn get(&self) -> Option<Zeroizing<String>> {
        self.secret.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = CredentialStore::new();
        assert!(!store.is_present());
        assert!(store.get().is_none());
    }

    #[test]
    fn test_set_and_clear() {
        let store = CredentialStore::new();
        store.set("token-1").unwrap();
        assert!(store.is_present());
        assert_eq!(store.get().unwrap().as_str(), "token-1");

        store.set("token-2").unwrap();
        assert_eq!(store.get().unwrap().as_str(), "token-2");

        store.clear();
        assert!(!store.is_present());
    }

    #[test]
    fn test_blank_credential_rejected() {
        let store = CredentialStore::new();
        store.set("keep").unwrap();

        assert!(matches!(
            store.set("   "),
            Err(DeliveryError::MissingCredential(_))
        ));
        assert_eq!(store.get().unwrap().as_str(), "keep");
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let store = CredentialStore::new();
        store.set("super-secret").unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("present: true"));
    }
}
