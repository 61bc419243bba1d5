//! API tokens stored in the platform keyring.

use std::sync::Arc;

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use crate::core::models::Endpoint;
use crate::core::providers::CredentialSource;

const KEYRING_SERVICE: &str = "mmchat";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug, Error)]
pub enum KeyringAccessError {
    #[error("{0}")]
    Recoverable(Arc<keyring::Error>),
    #[error("{0}")]
    Permanent(Arc<keyring::Error>),
}

impl KeyringAccessError {
    /// Returns true when the error represents a temporary outage of the
    /// platform keyring backend.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(Arc::new(err))
            }
            other => KeyringAccessError::Permanent(Arc::new(other)),
        }
    }
}

/// Token store backed by the `keyring` crate. With the keyring disabled every
/// lookup reports a missing token, which leaves credentials to the
/// environment.
pub struct KeyringStore {
    use_keyring: bool,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::new_with_keyring(true)
    }

    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    fn entry(endpoint: Endpoint) -> Result<Entry, KeyringAccessError> {
        Entry::new(KEYRING_SERVICE, endpoint.as_str()).map_err(KeyringAccessError::from)
    }

    pub fn store_token(&self, endpoint: Endpoint, token: &str) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }
        Self::entry(endpoint)?
            .set_password(token)
            .map_err(KeyringAccessError::from)
    }

    /// Remove a stored token. Returns false when there was nothing to remove.
    pub fn delete_token(&self, endpoint: Endpoint) -> Result<bool, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(false);
        }
        match Self::entry(endpoint)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for KeyringStore {
    fn get_token(&self, endpoint: Endpoint) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }
        match Self::entry(endpoint)?.get_password() {
            Ok(token) => {
                debug!(%endpoint, "keyring token found");
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(%endpoint, "no keyring token");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_outages_are_recoverable() {
        let backend_error = std::io::Error::other("secret service unavailable");
        let err = KeyringAccessError::from(keyring::Error::NoStorageAccess(Box::new(backend_error)));
        assert!(err.is_recoverable());

        let err = KeyringAccessError::from(keyring::Error::BadEncoding(Vec::new()));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn disabled_keyring_reports_missing_tokens() {
        let store = KeyringStore::new_with_keyring(false);
        assert!(store.get_token(Endpoint::OpenAi).unwrap().is_none());
        assert!(!store.delete_token(Endpoint::Gemini).unwrap());
        store.store_token(Endpoint::OpenAi, "sk-ignored").unwrap();
    }
}
