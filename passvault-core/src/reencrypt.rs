//! Wallet item re-encryption around a master key rotation.
//!
//! When the user changes their code, every persisted item must move from
//! the old master key to the new one. The orchestration is a strict
//! two-phase bracket around the rotation:
//!
//! 1. [`WalletItemReEncryptor::read`] — with the *old* key still active,
//!    load every category and decrypt every item into an in-memory
//!    plaintext snapshot.
//! 2. The caller rotates the master credential.
//! 3. [`WalletItemReEncryptor::write`] — with the *new* key active,
//!    re-encrypt each snapshot entry (reusing each record's original IV)
//!    and persist it, then discard the snapshot and restore whatever
//!    category the item store had selected before `read`.
//!
//! There is no cross-category atomicity: a persistence failure on one
//! category propagates without rolling back categories already written.
//! Callers surface the error and retry `write`; the snapshot survives a
//! failed write for that reason. Both phases are synchronous and blocking;
//! run them off any interactive thread.

use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::cipher::{Cipher, CipherRecord};
use crate::credentials::CredentialManager;
use crate::error::VaultResult;
use crate::services::WalletItemStore;
use crate::wallet_item::{ItemCategory, WalletItem};

/// Transient plaintext copy of one item, held only between `read` and
/// `write`. IVs are carried along so re-encryption preserves them.
struct ItemSnapshot {
    id: String,
    category: ItemCategory,
    title: String,
    title_iv: String,
    secret: String,
    secret_iv: String,
}

impl Drop for ItemSnapshot {
    fn drop(&mut self) {
        self.title.zeroize();
        self.secret.zeroize();
    }
}

/// Re-encrypts all persisted wallet items under a new master key.
///
/// One instance per rotation; the plaintext snapshot is owned exclusively
/// by the instance and discarded after [`WalletItemReEncryptor::write`].
pub struct WalletItemReEncryptor {
    items: Arc<dyn WalletItemStore>,
    credentials: CredentialManager,
    snapshot: Vec<ItemSnapshot>,
    original_category: Option<ItemCategory>,
}

impl WalletItemReEncryptor {
    /// Creates a re-encryptor over the given item store and credentials.
    #[must_use]
    pub const fn new(items: Arc<dyn WalletItemStore>, credentials: CredentialManager) -> Self {
        Self {
            items,
            credentials,
            snapshot: Vec::new(),
            original_category: None,
        }
    }

    /// Decrypts every category into the in-memory snapshot.
    ///
    /// Must be called strictly before the key rotation, while the old key is
    /// still the active credential.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::MissingCredential`] when no master key
    /// is stored, [`crate::VaultError::Cipher`] when an item does not
    /// decrypt under the active key, or [`crate::VaultError::ItemStore`]
    /// when a category fails to load. On error the snapshot is cleared.
    pub fn read(&mut self) -> VaultResult<()> {
        let cipher = self.credentials.cipher()?;
        self.original_category = Some(self.items.category());
        self.snapshot.clear();

        for category in ItemCategory::ALL {
            self.items.set_category(category);
            match self.read_category(category, &cipher) {
                Ok(count) => debug!(%category, count, "snapshotted category"),
                Err(err) => {
                    self.discard();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Re-encrypts the snapshot under the currently active key and persists
    /// every captured category.
    ///
    /// Must be called strictly after the key rotation. On success the
    /// snapshot is discarded and the store's original category selector is
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::ItemStore`] when a category fails to
    /// persist. Categories already written stay written; the snapshot is
    /// kept so the caller may retry.
    pub fn write(&mut self) -> VaultResult<()> {
        let cipher = self.credentials.cipher()?;

        for category in ItemCategory::ALL {
            let resealed = self
                .snapshot
                .iter()
                .filter(|snapshot| snapshot.category == category)
                .map(|snapshot| reseal(snapshot, &cipher))
                .collect::<VaultResult<Vec<_>>>()?;
            if resealed.is_empty() {
                continue;
            }
            self.items.set_category(category);
            if let Err(err) = self.items.save(resealed) {
                warn!(%category, "category re-encryption failed to persist");
                return Err(err);
            }
            debug!(%category, "category re-encrypted");
        }

        self.discard();
        Ok(())
    }

    fn read_category(&mut self, category: ItemCategory, cipher: &Cipher) -> VaultResult<usize> {
        let Some(items) = self.items.items()? else {
            return Ok(0);
        };
        let count = items.len();
        for item in &items {
            self.snapshot.push(ItemSnapshot {
                id: item.id.clone(),
                category,
                title: item.title(cipher)?,
                title_iv: item.title.iv.clone(),
                secret: item.secret(cipher)?,
                secret_iv: item.secret.iv.clone(),
            });
        }
        Ok(count)
    }

    /// Drops the snapshot and restores the store's category selector.
    fn discard(&mut self) {
        self.snapshot.clear();
        if let Some(category) = self.original_category.take() {
            self.items.set_category(category);
        }
    }
}

/// Encrypts one snapshot entry under `cipher`, keeping its record IVs.
fn reseal(snapshot: &ItemSnapshot, cipher: &Cipher) -> VaultResult<WalletItem> {
    Ok(WalletItem {
        id: snapshot.id.clone(),
        category: snapshot.category,
        title: CipherRecord {
            ciphertext: cipher.encrypt(&snapshot.title, &snapshot.title_iv)?,
            iv: snapshot.title_iv.clone(),
        },
        secret: CipherRecord {
            ciphertext: cipher.encrypt(&snapshot.secret, &snapshot.secret_iv)?,
            iv: snapshot.secret_iv.clone(),
        },
    })
}
