use passvault_secure_store::StoreError;
use thiserror::Error;

/// Result type for vault core operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors raised by the vault core.
///
/// Expected user-input failures (a wrong code, a rejected fingerprint) are
/// never errors; they surface through machine states and retry counters.
/// Everything here is either an integrity violation, a cryptographic
/// failure, or a persistence failure, and callers should fail closed.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A state transition was requested that the active transition table
    /// does not permit. Indicates a caller logic bug; the machine's state is
    /// left unchanged.
    #[error("illegal transition from `{from}` to `{to}`")]
    IllegalTransition {
        /// State the machine was in when the transition was requested.
        from: String,
        /// Requested target state.
        to: String,
    },

    /// Key derivation produced no usable key.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption or decryption failed.
    #[error("cipher failure: {0}")]
    Cipher(String),

    /// An operation required the master credential and none is stored.
    #[error("no master credential present")]
    MissingCredential,

    /// The secure credential store failed an operation.
    #[error(transparent)]
    SecureStore(#[from] StoreError),

    /// A persisted item collection failed to load or save.
    #[error("item store failure: {0}")]
    ItemStore(String),
}
