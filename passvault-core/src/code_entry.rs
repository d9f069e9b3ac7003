//! Secure-code (PIN/passcode) entry, setup, and change flows.
//!
//! A [`SecureCodeEntryManager`] runs one code-entry flow in one of three
//! contexts:
//!
//! * `Authenticate` — validate the existing code: `enterCode` loops on a
//!   mismatch until the retry limit is reached (`rejected`), and a match is
//!   `verified`.
//! * `Setup` — establish a first code: `setCode` ──► `verifyCode` ──►
//!   `verified`, with a mismatch during verification bouncing back to
//!   `setCode`. Success derives and persists the first master credential.
//! * `Change` — `enterCode` first proves knowledge of the old code, then the
//!   setup sub-flow collects the new one. Success rotates the master
//!   credential, bracketed by a full re-encryption of every stored item
//!   category so nothing remains decryptable under the old key.
//!
//! Codes are never compared against stored secrets directly: a candidate is
//! stretched through the KDF with the stored salt and the derived keys are
//! compared in constant time.
//!
//! Reaching the retry limit is a normal terminal outcome reported through
//! the `rejected` state, never an error. Errors out of this module mean the
//! flow itself is broken (illegal transition, store or KDF failure) and the
//! caller must fail closed.

use std::sync::Arc;

use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::credentials::CredentialManager;
use crate::reencrypt::WalletItemReEncryptor;
use crate::services::WalletItemStore;
use crate::state_graph::{StateGraph, StateGraphObserver, TransitionTable};
use crate::states::{CodeEntryContext, CodeEntryState, CodeKind};
use crate::VaultResult;

/// Builds the transition table for a code-entry machine in `context`.
///
/// Only the listed edges are legal; everything else is an integrity
/// violation.
fn transition_table(context: CodeEntryContext) -> TransitionTable<CodeEntryState> {
    use CodeEntryContext::{Authenticate, Change, Setup};
    use CodeEntryState::{Cancelled, EnterCode, Rejected, SetCode, Verified, VerifyCode};

    let mut table = TransitionTable::new();
    match context {
        Authenticate | Change => {
            table.permit(EnterCode, [EnterCode]);
            table.permit(Rejected, [EnterCode, Cancelled]);
        }
        Setup => {
            table.permit(EnterCode, []);
            table.permit(Rejected, [Cancelled]);
        }
    }
    match context {
        Change => {
            table.permit(SetCode, [EnterCode, VerifyCode]);
        }
        Setup => {
            table.permit(SetCode, [VerifyCode]);
        }
        Authenticate => {
            table.permit(SetCode, []);
        }
    }
    match context {
        Setup | Change => {
            table.permit(VerifyCode, [SetCode]);
            table.permit(Verified, [VerifyCode]);
        }
        Authenticate => {
            table.permit(VerifyCode, []);
            table.permit(Verified, [EnterCode]);
        }
    }
    table.permit(
        Cancelled,
        [EnterCode, SetCode, VerifyCode, Rejected, Verified],
    );
    table
}

const fn start_state(context: CodeEntryContext) -> CodeEntryState {
    match context {
        CodeEntryContext::Setup => CodeEntryState::SetCode,
        CodeEntryContext::Authenticate | CodeEntryContext::Change => CodeEntryState::EnterCode,
    }
}

/// Manages one secure-code entry flow.
///
/// One instance per flow; all methods take `&mut self` and the manager
/// performs no internal locking.
pub struct SecureCodeEntryManager {
    graph: StateGraph<CodeEntryState>,
    context: CodeEntryContext,
    code_kind: CodeKind,
    retry_limit: u32,
    enter_code_count: u32,
    set_code_count: u32,
    code: Zeroizing<String>,
    pending_code: Zeroizing<String>,
    credentials: CredentialManager,
    items: Arc<dyn WalletItemStore>,
}

impl SecureCodeEntryManager {
    /// Creates a manager for `context` with the given retry limit.
    ///
    /// `items` is only touched during a `Change` flow, when every stored
    /// category is re-encrypted around the key rotation.
    #[must_use]
    pub fn new(
        context: CodeEntryContext,
        retry_limit: u32,
        code_kind: CodeKind,
        credentials: CredentialManager,
        items: Arc<dyn WalletItemStore>,
    ) -> Self {
        Self {
            graph: StateGraph::new(transition_table(context), vec![start_state(context)]),
            context,
            code_kind,
            retry_limit,
            enter_code_count: 0,
            set_code_count: 0,
            code: Zeroizing::new(String::new()),
            pending_code: Zeroizing::new(String::new()),
            credentials,
            items,
        }
    }

    /// Registers an observer for flow state notifications.
    pub fn add_observer(&mut self, observer: Box<dyn StateGraphObserver<CodeEntryState>>) {
        self.graph.add_observer(observer);
    }

    /// The flow's context.
    #[must_use]
    pub const fn context(&self) -> CodeEntryContext {
        self.context
    }

    /// The kind of code this flow collects.
    #[must_use]
    pub const fn code_kind(&self) -> CodeKind {
        self.code_kind
    }

    /// The flow's current state.
    #[must_use]
    pub fn current_state(&self) -> CodeEntryState {
        self.graph.current().unwrap_or_else(|| start_state(self.context))
    }

    /// Failed current-code submissions so far. Resets only on `start`.
    #[must_use]
    pub const fn enter_code_count(&self) -> u32 {
        self.enter_code_count
    }

    /// New-code submissions so far. Resets only on `start`.
    #[must_use]
    pub const fn set_code_count(&self) -> u32 {
        self.set_code_count
    }

    /// Switches the flow to a different context.
    ///
    /// Rebuilds the transition table and start state; the flow must be
    /// started again afterwards.
    pub fn set_context(&mut self, context: CodeEntryContext) {
        self.context = context;
        self.graph
            .reconfigure(transition_table(context), vec![start_state(context)]);
    }

    /// Starts (or restarts) the flow: resets counters and transient codes
    /// and enters the context's start state.
    pub fn start(&mut self) -> CodeEntryState {
        self.enter_code_count = 0;
        self.set_code_count = 0;
        self.clear_codes();
        self.graph.start()
    }

    /// Submits a candidate code and advances the flow.
    ///
    /// Returns the state the flow settled in. Wrong codes and exhausted
    /// retries are states (`enterCode` again, `rejected`), not errors.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::VaultError`] when the flow itself fails: an
    /// illegal transition, a store failure, a KDF or cipher failure during
    /// credential rotation or re-encryption. The caller must treat the flow
    /// as dead and fail closed.
    pub fn submit_code(&mut self, candidate: &str) -> VaultResult<CodeEntryState> {
        let state = self.current_state();
        if matches!(state, CodeEntryState::Rejected | CodeEntryState::Verified) {
            // The flow already terminated; late submissions change nothing.
            return Ok(state);
        }
        self.code = Zeroizing::new(candidate.to_owned());
        let settled = self.handle(state)?;
        if matches!(settled, CodeEntryState::Rejected | CodeEntryState::Verified) {
            self.clear_codes();
        }
        Ok(settled)
    }

    /// Cancels the flow. Always settles in `rejected`.
    ///
    /// Entering `cancelled` is externally driven, so no `leaving`
    /// notification fires for it; only the auto-advance into `rejected`
    /// announces one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IllegalTransition`] if the flow was
    /// never started.
    pub fn cancel(&mut self) -> VaultResult<CodeEntryState> {
        self.clear_codes();
        self.graph.transition_to(CodeEntryState::Cancelled)?;
        let settled = self.handle(CodeEntryState::Cancelled)?;
        self.clear_codes();
        Ok(settled)
    }

    /// Runs the domain action for `state`, auto-advancing until the flow
    /// parks or terminates.
    fn handle(&mut self, state: CodeEntryState) -> VaultResult<CodeEntryState> {
        match state {
            CodeEntryState::EnterCode => {
                self.enter_code_count += 1;
                let next = if self.candidate_matches_credential()? {
                    if self.context == CodeEntryContext::Change {
                        // The old code checks out; a new one must follow.
                        CodeEntryState::SetCode
                    } else {
                        CodeEntryState::Verified
                    }
                } else if self.enter_code_count == self.retry_limit {
                    CodeEntryState::Rejected
                } else {
                    CodeEntryState::EnterCode
                };
                self.advance(next)
            }
            CodeEntryState::SetCode => {
                self.set_code_count += 1;
                self.pending_code = self.code.clone();
                self.advance(CodeEntryState::VerifyCode)
            }
            CodeEntryState::VerifyCode => {
                let matches: bool = self
                    .code
                    .as_bytes()
                    .ct_eq(self.pending_code.as_bytes())
                    .into();
                if matches {
                    self.advance(CodeEntryState::Verified)
                } else {
                    self.advance(CodeEntryState::SetCode)
                }
            }
            CodeEntryState::Cancelled => self.advance(CodeEntryState::Rejected),
            CodeEntryState::Verified => {
                self.complete_verified()?;
                Ok(CodeEntryState::Verified)
            }
            CodeEntryState::Rejected => Ok(CodeEntryState::Rejected),
        }
    }

    /// Transitions into `next`, recursing into states that carry their own
    /// handling (`cancelled` forwards to `rejected`; `verified` finalizes
    /// the credential).
    fn advance(&mut self, next: CodeEntryState) -> VaultResult<CodeEntryState> {
        self.graph.announce_leaving();
        self.graph.transition_to(next)?;
        match next {
            CodeEntryState::Cancelled | CodeEntryState::Verified => self.handle(next),
            _ => Ok(next),
        }
    }

    /// Derives a key from the submitted candidate with the stored salt and
    /// compares it against the stored master key in constant time.
    ///
    /// A missing credential fails closed as a mismatch.
    fn candidate_matches_credential(&self) -> VaultResult<bool> {
        let Some(salt) = self.credentials.current_salt()? else {
            warn!("code validation without a stored credential");
            return Ok(false);
        };
        let Some(stored) = self.credentials.current_key()? else {
            warn!("code validation without a stored credential");
            return Ok(false);
        };
        let candidate = self
            .credentials
            .derive(self.code.as_str(), salt.expose_secret())?;
        Ok(candidate
            .as_bytes()
            .ct_eq(stored.expose_secret().as_bytes())
            .into())
    }

    /// Finalizes a successful entry: for `Setup` and `Change`, establish a
    /// fresh credential from the verified code; for `Change`, bracket the
    /// rotation with a full re-encryption of all stored categories.
    fn complete_verified(&mut self) -> VaultResult<()> {
        match self.context {
            CodeEntryContext::Authenticate => {}
            CodeEntryContext::Setup => self.rotate_credential()?,
            CodeEntryContext::Change => {
                let mut reencryptor = WalletItemReEncryptor::new(
                    Arc::clone(&self.items),
                    self.credentials.clone(),
                );
                reencryptor.read()?;
                self.rotate_credential()?;
                reencryptor.write()?;
            }
        }
        self.clear_codes();
        debug!(context = %self.context, "code entry verified");
        Ok(())
    }

    /// Derives a new master key from the verified code under a fresh salt
    /// and persists the pair, replacing any prior credential.
    fn rotate_credential(&self) -> VaultResult<()> {
        let salt = self.credentials.random_salt();
        let key = self.credentials.derive(self.code.as_str(), &salt)?;
        self.credentials.update(&key, &salt)
    }

    fn clear_codes(&mut self) {
        self.code = Zeroizing::new(String::new());
        self.pending_code = Zeroizing::new(String::new());
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use CodeEntryContext::{Authenticate, Change, Setup};
    use CodeEntryState::{Cancelled, EnterCode, Rejected, SetCode, Verified, VerifyCode};

    #[test_case(Authenticate, EnterCode, EnterCode, true; "authenticate enter self loop")]
    #[test_case(Change, EnterCode, EnterCode, true; "change enter self loop")]
    #[test_case(Setup, EnterCode, EnterCode, false; "setup never enters enter code")]
    #[test_case(Change, EnterCode, SetCode, true; "change set after old code")]
    #[test_case(Change, VerifyCode, SetCode, true; "change set after verify mismatch")]
    #[test_case(Setup, VerifyCode, SetCode, true; "setup set after verify mismatch")]
    #[test_case(Setup, EnterCode, SetCode, false; "setup set not from enter")]
    #[test_case(Authenticate, EnterCode, SetCode, false; "authenticate never sets")]
    #[test_case(Setup, SetCode, VerifyCode, true; "setup verify after set")]
    #[test_case(Change, SetCode, VerifyCode, true; "change verify after set")]
    #[test_case(Authenticate, SetCode, VerifyCode, false; "authenticate never verifies new code")]
    #[test_case(Authenticate, EnterCode, Rejected, true; "authenticate reject from enter")]
    #[test_case(Change, Cancelled, Rejected, true; "change reject from cancel")]
    #[test_case(Setup, Cancelled, Rejected, true; "setup reject only from cancel")]
    #[test_case(Setup, EnterCode, Rejected, false; "setup reject not from enter")]
    #[test_case(Setup, VerifyCode, Verified, true; "setup verified from verify")]
    #[test_case(Change, VerifyCode, Verified, true; "change verified from verify")]
    #[test_case(Authenticate, EnterCode, Verified, true; "authenticate verified from enter")]
    #[test_case(Authenticate, VerifyCode, Verified, false; "authenticate verified not from verify")]
    #[test_case(Authenticate, Verified, Cancelled, true; "cancel from verified")]
    #[test_case(Setup, SetCode, Cancelled, true; "cancel from set")]
    fn test_transition_table(
        context: CodeEntryContext,
        from: CodeEntryState,
        to: CodeEntryState,
        legal: bool,
    ) {
        assert_eq!(transition_table(context).permits(from, to), legal);
    }

    #[test_case(Setup, SetCode; "setup starts at set code")]
    #[test_case(Authenticate, EnterCode; "authenticate starts at enter code")]
    #[test_case(Change, EnterCode; "change starts at enter code")]
    fn test_start_states(context: CodeEntryContext, expected: CodeEntryState) {
        assert_eq!(start_state(context), expected);
    }
}
