//! Authentication session orchestration.
//!
//! An unlock session combines the biometric factor with code entry:
//!
//! ```text
//! authenticating ──► verifyingFingerprint ──► fingerprintVerified ──► authenticated
//!        │                   │    ▲                    │                    ▲
//!        │                   │    └─ retryable failure │                    │
//!        ▼                   ▼                         ▼                    │
//!        └────────────► verifyingCode ─────────────────┴── codeVerified() ──┘
//!                            │
//!                            └── codeRejected() ──► authenticationFailed
//! ```
//!
//! The session auto-advances until it reaches `verifyingCode` (parked,
//! waiting on a separate code-entry flow) or a terminal state. The code
//! entry outcome is delivered through [`AuthSessionManager::code_verified`]
//! and [`AuthSessionManager::code_rejected`].

use std::sync::Arc;

use tracing::debug;

use crate::services::{BiometricService, PreferencesService};
use crate::state_graph::{StateGraph, StateGraphObserver, TransitionTable};
use crate::states::AuthState;
use crate::VaultResult;

/// Manages a single authentication session for the vault.
///
/// One instance per unlock attempt; all methods take `&mut self` and the
/// manager performs no internal locking. Dropping the manager cancels any
/// in-flight biometric await, so a late platform completion has nothing to
/// mutate.
pub struct AuthSessionManager {
    graph: StateGraph<AuthState>,
    biometrics: Arc<dyn BiometricService>,
    preferences: Arc<dyn PreferencesService>,
}

fn transition_table() -> TransitionTable<AuthState> {
    let mut table = TransitionTable::new();
    table.permit(
        AuthState::VerifyingFingerprint,
        [AuthState::Authenticating, AuthState::VerifyingFingerprint],
    );
    table.permit(
        AuthState::FingerprintVerified,
        [AuthState::VerifyingFingerprint],
    );
    table.permit(
        AuthState::VerifyingCode,
        [
            AuthState::Authenticating,
            AuthState::VerifyingFingerprint,
            AuthState::FingerprintVerified,
        ],
    );
    table.permit(
        AuthState::Authenticated,
        [AuthState::FingerprintVerified, AuthState::VerifyingCode],
    );
    table.permit(AuthState::AuthenticationFailed, [AuthState::VerifyingCode]);
    table
}

impl AuthSessionManager {
    /// Creates a session manager with its injected collaborators.
    #[must_use]
    pub fn new(
        biometrics: Arc<dyn BiometricService>,
        preferences: Arc<dyn PreferencesService>,
    ) -> Self {
        Self {
            graph: StateGraph::new(transition_table(), vec![AuthState::Authenticating]),
            biometrics,
            preferences,
        }
    }

    /// Registers an observer for session state notifications.
    pub fn add_observer(&mut self, observer: Box<dyn StateGraphObserver<AuthState>>) {
        self.graph.add_observer(observer);
    }

    /// The session's current state.
    #[must_use]
    pub fn current_state(&self) -> AuthState {
        self.graph.current().unwrap_or(AuthState::Authenticating)
    }

    /// Begins (or restarts) the session and drives it until it parks.
    ///
    /// Returns the state the session parked in: `VerifyingCode` when a code
    /// entry flow must take over, `Authenticated` when biometrics alone were
    /// sufficient.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IllegalTransition`] if the machine is
    /// driven into an illegal transition; this indicates a logic bug, and
    /// the session should be abandoned (fail closed).
    pub async fn start(&mut self) -> VaultResult<AuthState> {
        let mut state = self.graph.start();
        while let Some(next) = self.step(state).await {
            self.graph.announce_leaving();
            state = self.graph.transition_to(next)?;
        }
        debug!(%state, "session parked");
        Ok(state)
    }

    /// Computes the next auto-advance target, or `None` to park.
    async fn step(&mut self, state: AuthState) -> Option<AuthState> {
        match state {
            AuthState::Authenticating => {
                // Preferences gate the collaborator: when biometric unlock
                // is disabled the platform service is never consulted.
                let next = if self.preferences.biometrics_enabled()
                    && self.biometrics.can_collect().0
                {
                    AuthState::VerifyingFingerprint
                } else {
                    AuthState::VerifyingCode
                };
                Some(next)
            }
            AuthState::VerifyingFingerprint => match self.biometrics.authenticate().await {
                Ok(()) => Some(AuthState::FingerprintVerified),
                Err(failure) if failure.is_retryable() => {
                    debug!(%failure, "biometric retry");
                    Some(AuthState::VerifyingFingerprint)
                }
                Err(failure) => {
                    debug!(%failure, "biometric fallback to code entry");
                    Some(AuthState::VerifyingCode)
                }
            },
            AuthState::FingerprintVerified => {
                if self.preferences.code_second_factor_enabled() {
                    Some(AuthState::VerifyingCode)
                } else {
                    Some(AuthState::Authenticated)
                }
            }
            // External-input and terminal states never auto-advance.
            AuthState::VerifyingCode
            | AuthState::Authenticated
            | AuthState::AuthenticationFailed => None,
        }
    }

    /// Reports that the separate code-entry flow verified the user's code.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IllegalTransition`] if the session is
    /// not parked in `VerifyingCode`; the session state is unchanged.
    pub fn code_verified(&mut self) -> VaultResult<AuthState> {
        self.graph.transition_to(AuthState::Authenticated)
    }

    /// Reports that the separate code-entry flow rejected the user.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IllegalTransition`] if the session is
    /// not parked in `VerifyingCode`; the session state is unchanged.
    pub fn code_rejected(&mut self) -> VaultResult<AuthState> {
        self.graph.transition_to(AuthState::AuthenticationFailed)
    }
}
