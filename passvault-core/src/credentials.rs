//! Master credential management: key/salt storage and key derivation.

use std::sync::Arc;

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;

use passvault_secure_store::SecureStore;

use crate::cipher::{random_token, Cipher};
use crate::error::{VaultError, VaultResult};

/// Secure store entry holding the derived master key.
const MASTER_KEY_ENTRY: &str = "passvault_master_key";

/// Secure store entry holding the master salt.
const MASTER_SALT_ENTRY: &str = "passvault_master_salt";

/// PBKDF2-HMAC-SHA256 iteration count.
const KDF_ITERATIONS: u32 = 4096;

/// Derived key length in bytes before hex rendering.
const KDF_OUTPUT_LEN: usize = 16;

/// Manages the vault's master credential: the derived key and its salt.
///
/// The manager stores nothing in memory; every accessor is a fresh lookup
/// against the injected [`SecureStore`], and anything it returns is highly
/// sensitive. Discard returned values as soon as the operation at hand
/// completes; never log or persist them elsewhere.
///
/// Exactly one credential pair is current at a time. Route all credential
/// mutations through a single owner to avoid lost updates.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn SecureStore>,
}

impl CredentialManager {
    /// Creates a manager backed by the given secure store.
    #[must_use]
    pub const fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// The currently stored master key, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SecureStore`] if the store lookup fails.
    /// Absence of a credential is `Ok(None)`.
    pub fn current_key(&self) -> VaultResult<Option<SecretString>> {
        Ok(self.store.get_string(MASTER_KEY_ENTRY)?)
    }

    /// The currently stored master salt, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SecureStore`] if the store lookup fails.
    pub fn current_salt(&self) -> VaultResult<Option<SecretString>> {
        Ok(self.store.get_string(MASTER_SALT_ENTRY)?)
    }

    /// Whether a complete credential (key and salt, both non-empty) exists.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        let present = |entry: &str| {
            self.store
                .get_string(entry)
                .ok()
                .flatten()
                .is_some_and(|value| !value.expose_secret().is_empty())
        };
        present(MASTER_KEY_ENTRY) && present(MASTER_SALT_ENTRY)
    }

    /// Replaces the current credential pair with `key` and `salt`.
    ///
    /// If a credential already exists both entries are updated in place,
    /// otherwise both are inserted. The two writes are sequential, not
    /// atomic as a pair; a crash between them can leave a mismatched pair.
    /// Callers treat a failure here as fatal for the flow in progress.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SecureStore`] if either write fails.
    pub fn update(&self, key: &str, salt: &str) -> VaultResult<()> {
        if self.has_credential() {
            self.store.update(MASTER_KEY_ENTRY, key)?;
            self.store.update(MASTER_SALT_ENTRY, salt)?;
        } else {
            self.store.add(MASTER_KEY_ENTRY, key)?;
            self.store.add(MASTER_SALT_ENTRY, salt)?;
        }
        debug!("master credential updated");
        Ok(())
    }

    /// Derives a master key from a secret code and a salt.
    ///
    /// PBKDF2-HMAC-SHA256, 4096 iterations, 16-byte output, rendered as a
    /// fixed 32-character lowercase hex string. Deterministic: the same
    /// code and salt always produce the same key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyDerivation`] if the derived key has the
    /// wrong length. This indicates a programmer error, not bad user input.
    pub fn derive(&self, secret: &str, salt: &str) -> VaultResult<String> {
        let mut output = [0u8; KDF_OUTPUT_LEN];
        pbkdf2_hmac::<Sha256>(
            secret.as_bytes(),
            salt.as_bytes(),
            KDF_ITERATIONS,
            &mut output,
        );
        let key = hex::encode(output);
        if key.len() != KDF_OUTPUT_LEN * 2 {
            return Err(VaultError::KeyDerivation(format!(
                "derived key has length {}, expected {}",
                key.len(),
                KDF_OUTPUT_LEN * 2
            )));
        }
        Ok(key)
    }

    /// A fresh cryptographically random salt, 16 characters.
    #[must_use]
    pub fn random_salt(&self) -> String {
        random_token()
    }

    /// A [`Cipher`] keyed by the current master key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::MissingCredential`] when no master key is
    /// stored, or [`VaultError::SecureStore`] if the lookup fails.
    pub fn cipher(&self) -> VaultResult<Cipher> {
        let key = self.current_key()?.ok_or(VaultError::MissingCredential)?;
        Cipher::new(key)
    }
}
