//! Encrypted wallet item model.
//!
//! Items hold only ciphertext in memory and on disk; plaintext exists only
//! transiently, in the accessor return values and in the re-encryptor's
//! snapshot during key rotation.

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::cipher::{Cipher, CipherRecord};
use crate::error::VaultResult;

/// The independently persisted secret categories of the vault.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ItemCategory {
    /// Website login passwords.
    WebPasswords,
    /// Generic password entries.
    GenericPasswords,
    /// Free-form secure notes.
    SecureNotes,
}

impl ItemCategory {
    /// Every category, in re-encryption order.
    pub const ALL: [Self; 3] = [Self::WebPasswords, Self::GenericPasswords, Self::SecureNotes];
}

/// A single vault item: a title and a secret payload, each encrypted under
/// the master key with its own per-field IV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletItem {
    /// Stable item identifier.
    pub id: String,
    /// The category the item is persisted under.
    pub category: ItemCategory,
    /// Encrypted display title.
    pub title: CipherRecord,
    /// Encrypted secret payload (password or note body).
    pub secret: CipherRecord,
}

impl WalletItem {
    /// Encrypts a new item from plaintext, generating a fresh IV per field.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::Cipher`] if encryption fails.
    pub fn seal(
        cipher: &Cipher,
        category: ItemCategory,
        title: &str,
        secret: &str,
    ) -> VaultResult<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            category,
            title: cipher.seal(title)?,
            secret: cipher.seal(secret)?,
        })
    }

    /// Decrypts the item's title.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::Cipher`] if decryption fails, e.g. when
    /// the cipher is keyed with a different master key than the item.
    pub fn title(&self, cipher: &Cipher) -> VaultResult<String> {
        cipher.open(&self.title)
    }

    /// Decrypts the item's secret payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::Cipher`] if decryption fails.
    pub fn secret(&self, cipher: &Cipher) -> VaultResult<String> {
        cipher.open(&self.secret)
    }
}
