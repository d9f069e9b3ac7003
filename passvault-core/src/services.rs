//! Collaborator interfaces the vault core consumes.
//!
//! The core owns no platform integrations. Hosts inject implementations of
//! these traits at construction time: a biometric service wrapping the
//! platform's fingerprint/face API, a preferences source, and the persisted
//! item collections. The secure credential store trait lives in
//! [`passvault_secure_store`].

use async_trait::async_trait;
use thiserror::Error;

use crate::error::VaultResult;
use crate::wallet_item::{ItemCategory, WalletItem};

/// Why a biometric collection attempt did not succeed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BiometricFailure {
    /// The presented biometric was not recognized. The user may retry.
    #[error("biometric not recognized")]
    NotRecognized,

    /// Too many failed attempts; the platform has locked the sensor.
    #[error("biometric sensor locked out")]
    Lockout,

    /// The user dismissed the biometric prompt.
    #[error("biometric prompt cancelled")]
    Cancelled,

    /// No usable sensor, or no biometrics enrolled.
    #[error("biometric collection unavailable")]
    Unavailable,

    /// The platform reported an unrecognized failure.
    #[error("unknown biometric failure")]
    Unknown,
}

impl BiometricFailure {
    /// Whether the session should stay on the biometric factor and retry.
    ///
    /// Only an unrecognized presentation is retryable; lockout, cancel,
    /// unavailability and unknown failures all fall back to code entry.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NotRecognized)
    }
}

/// Platform biometric verification service.
#[async_trait]
pub trait BiometricService: Send + Sync {
    /// Whether the device can collect a biometric right now, with the
    /// platform's reason when it cannot.
    fn can_collect(&self) -> (bool, Option<BiometricFailure>);

    /// Prompts for and verifies a biometric. Suspends until the platform
    /// delivers a result.
    ///
    /// # Errors
    ///
    /// Returns the [`BiometricFailure`] reported by the platform.
    async fn authenticate(&self) -> Result<(), BiometricFailure>;
}

/// User preference flags consumed by the authentication session.
pub trait PreferencesService: Send + Sync {
    /// Whether the user enabled biometric unlock.
    fn biometrics_enabled(&self) -> bool;

    /// Whether a verified biometric must additionally be confirmed with the
    /// code as a second factor.
    fn code_second_factor_enabled(&self) -> bool;
}

/// A persisted collection of [`WalletItem`]s with a stateful category
/// selector.
///
/// `items`, `save` and `clear` operate on whichever category is currently
/// selected. The selector is shared mutable state; components that switch
/// it (the re-encryptor) restore the previous selection when done.
pub trait WalletItemStore: Send + Sync {
    /// The currently selected category.
    fn category(&self) -> ItemCategory;

    /// Selects the category subsequent operations apply to.
    fn set_category(&self, category: ItemCategory);

    /// Loads all items of the selected category. `Ok(None)` when the
    /// category has never been written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::ItemStore`] if the backing collection
    /// cannot be read.
    fn items(&self) -> VaultResult<Option<Vec<WalletItem>>>;

    /// Replaces the selected category's contents with `items`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::ItemStore`] if persisting fails.
    fn save(&self, items: Vec<WalletItem>) -> VaultResult<()>;

    /// Deletes all items of the selected category.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::ItemStore`] if the deletion fails.
    fn clear(&self) -> VaultResult<()>;
}
