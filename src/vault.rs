//! Secret vault adapter.
//!
//! Long-lived credentials and cached session tokens are kept in the OS
//! credential manager as JSON blobs, under two services keyed identically by
//! [`ProfileKey`]:
//!
//! | Service        | Record               |
//! |----------------|----------------------|
//! | `@aws`         | [`StoredCredentials`] |
//! | `@aws/session` | [`SessionPayload`]    |
//!
//! Reads never fail on bad data: a blob that does not parse or validate is
//! logged and treated as absent, which forces re-authentication instead of
//! crashing the caller. Writes delete the previous entry first because some
//! backends (GNOME keyring among them) refuse to replace an existing item.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;

use crate::{
    credentials::{SessionPayload, StoredCredentials},
    error::{Error, Result},
    profile::ProfileKey,
};

pub const CREDENTIALS_NAMESPACE: &str = "@aws";
pub const SESSION_NAMESPACE: &str = "@aws/session";

/// Capability-scoped string store addressed by `(namespace, key)`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    async fn set(&self, namespace: &str, key: &str, blob: &str) -> Result<()>;

    /// Deleting a missing entry is not an error.
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        (**self).get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, blob: &str) -> Result<()> {
        (**self).set(namespace, key, blob).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        (**self).delete(namespace, key).await
    }
}

/// The platform credential manager (Keychain, Credential Manager, Secret Service).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    async fn with_entry<T, F>(namespace: &str, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> keyring::Result<T> + Send + 'static,
    {
        let (namespace, key) = (namespace.to_owned(), key.to_owned());
        tokio::task::spawn_blocking(move || keyring::Entry::new(&namespace, &key).and_then(op))
            .await
            .map_err(|e| Error::Store(e.to_string()))?
            .map_err(|e| Error::Store(e.to_string()))
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Self::with_entry(namespace, key, |entry| match entry.get_password() {
            Ok(blob) => Ok(Some(blob)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, namespace: &str, key: &str, blob: &str) -> Result<()> {
        let blob = blob.to_owned();
        Self::with_entry(namespace, key, move |entry| entry.set_password(&blob)).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        Self::with_entry(namespace, key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}

/// Typed view over a [`SecretStore`].
pub struct KeyRing<S> {
    store: S,
}

impl<S: SecretStore> KeyRing<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads the long-lived key pair stored by `setup`.
    ///
    /// # Arguments
    /// * `profile` - Profile whose entry is read
    ///
    /// # Returns
    /// `None` when nothing is stored or the entry does not parse. The latter is
    /// logged as an error.
    ///
    /// # Errors
    /// Returns an error if the keyring itself cannot be reached.
    pub async fn get_credentials(&self, profile: &ProfileKey) -> Result<Option<StoredCredentials>> {
        self.read(CREDENTIALS_NAMESPACE, profile).await
    }

    /// Replaces whatever is stored for the profile.
    ///
    /// # Arguments
    /// * `profile` - Profile whose entry is written
    /// * `credentials` - Key pair and MFA shape to store
    ///
    /// # Errors
    /// Returns an error if the keyring refuses the delete or the write.
    pub async fn store_credentials(
        &self,
        profile: &ProfileKey,
        credentials: &StoredCredentials,
    ) -> Result<()> {
        let blob = serde_json::to_string(credentials)?;
        self.replace(CREDENTIALS_NAMESPACE, profile, &blob).await
    }

    /// Reads the cached session token.
    ///
    /// # Arguments
    /// * `profile` - Profile whose cache entry is read
    ///
    /// # Returns
    /// `None` when the entry is missing, malformed or expired.
    ///
    /// # Errors
    /// Returns an error if the keyring itself cannot be reached.
    pub async fn get_session_token(&self, profile: &ProfileKey) -> Result<Option<SessionPayload>> {
        let Some(payload) = self.read::<SessionPayload>(SESSION_NAMESPACE, profile).await? else {
            return Ok(None);
        };

        if let Err(reason) = payload.validate() {
            error!("Data from {SESSION_NAMESPACE}/{profile} is not a session payload: {reason}");
            return Ok(None);
        }

        if payload.is_expired_at(Utc::now()) {
            warn!("Session for [{profile}] expired at {}", payload.expiration);
            return Ok(None);
        }

        Ok(Some(payload))
    }

    /// Caches a freshly issued session token.
    ///
    /// # Arguments
    /// * `profile` - Profile whose cache entry is replaced
    /// * `payload` - Session to cache
    ///
    /// # Errors
    /// [`Error::InvalidPayload`] if `payload` fails validation, in which case
    /// nothing is written. Keyring failures are returned as is.
    pub async fn cache_session_token(
        &self,
        profile: &ProfileKey,
        payload: &SessionPayload,
    ) -> Result<()> {
        payload.validate().map_err(Error::InvalidPayload)?;
        let blob = serde_json::to_string(payload)?;
        self.replace(SESSION_NAMESPACE, profile, &blob).await
    }

    async fn read<T: DeserializeOwned>(
        &self,
        namespace: &str,
        profile: &ProfileKey,
    ) -> Result<Option<T>> {
        let Some(blob) = self.store.get(namespace, profile.as_str()).await? else {
            debug!("Nothing stored in {namespace}/{profile}");
            return Ok(None);
        };

        match serde_json::from_str(&blob) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                error!("Data from {namespace}/{profile} is not a record this tool wrote: {e}");
                Ok(None)
            }
        }
    }

    async fn replace(&self, namespace: &str, profile: &ProfileKey, blob: &str) -> Result<()> {
        self.store.delete(namespace, profile.as_str()).await?;
        self.store.set(namespace, profile.as_str(), blob).await
    }
}
