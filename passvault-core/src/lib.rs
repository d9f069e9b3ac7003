//! Authentication and credential-protection core for PassVault.
//!
//! This crate decides when a user may unlock the vault and guarantees that
//! the symmetric key protecting every stored secret is derived solely from a
//! user-supplied code, rotates safely when that code changes, and is never
//! persisted in plaintext.
//!
//! # Architecture
//!
//! Flows are modeled as directed-graph state machines driven by the
//! [`state_graph`] engine:
//!
//! * [`AuthSessionManager`] orchestrates an unlock session, combining the
//!   biometric factor with code entry.
//! * [`SecureCodeEntryManager`] collects and validates PINs/passcodes for
//!   authentication, first-time setup, and code changes, and triggers master
//!   key rotation.
//! * [`CredentialManager`] owns the master key/salt pair in the secure store
//!   and performs key derivation.
//! * [`Cipher`] is the symmetric primitive every stored secret goes through.
//! * [`WalletItemReEncryptor`] migrates all persisted item categories to a
//!   new master key after a code change.
//!
//! Platform services (biometrics, preferences, item collections, the secure
//! store itself) are consumed through the narrow traits in [`services`] and
//! [`passvault_secure_store`]; hosts inject implementations at construction.
//!
//! # Concurrency
//!
//! A manager instance represents a single logical session and is the unit of
//! concurrency: all of its methods take `&mut self` and there is no internal
//! locking. Run one session per task and serialize calls to it. The only
//! suspending operation is biometric authentication; it is awaited inside
//! the manager's own `async fn`, so its completion lands back on the
//! caller's executor, and dropping the manager cancels it.

#![allow(clippy::module_name_repetitions)]

mod auth_session;
pub use auth_session::*;

mod cipher;
pub use cipher::*;

mod code_entry;
pub use code_entry::*;

mod credentials;
pub use credentials::*;

mod error;
pub use error::*;

mod reencrypt;
pub use reencrypt::*;

pub mod services;
pub use services::{BiometricFailure, BiometricService, PreferencesService, WalletItemStore};

pub mod state_graph;
pub use state_graph::{StateGraph, StateGraphObserver, TransitionTable};

mod states;
pub use states::*;

mod wallet_item;
pub use wallet_item::*;
