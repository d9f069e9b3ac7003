//! State and context tags for the vault's flow machines.

use strum::Display;

/// States of an [`crate::AuthSessionManager`] unlock session.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "camelCase")]
pub enum AuthState {
    /// The session has started and is selecting a first factor.
    Authenticating,
    /// The biometric collaborator is verifying the user's fingerprint.
    VerifyingFingerprint,
    /// Biometric verification succeeded.
    FingerprintVerified,
    /// The session is parked, waiting on a separate code-entry flow.
    VerifyingCode,
    /// Terminal: the user is authenticated with the vault.
    Authenticated,
    /// Terminal: the user could not authenticate.
    AuthenticationFailed,
}

/// States of a [`crate::SecureCodeEntryManager`] flow.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "camelCase")]
pub enum CodeEntryState {
    /// The user must enter their current code.
    EnterCode,
    /// The user must choose a new code.
    SetCode,
    /// The user must repeat the new code.
    VerifyCode,
    /// The user abandoned the flow.
    Cancelled,
    /// Terminal: code entry failed.
    Rejected,
    /// Terminal: code entry succeeded.
    Verified,
}

/// The mode a code-entry flow runs in.
///
/// The context decides the start state, which transitions are legal, and
/// whether a new master key must be established on success.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "camelCase")]
pub enum CodeEntryContext {
    /// Validate the existing code to unlock the vault.
    Authenticate,
    /// Establish a code for the first time.
    Setup,
    /// Verify the old code, then establish a new one.
    Change,
}

/// The kind of secure code being collected. Drives display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    /// A short numeric PIN.
    Pin,
    /// A longer alphanumeric passcode.
    Passcode,
}

impl CodeKind {
    /// Human-readable name of the code kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pin => "PIN",
            Self::Passcode => "passcode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_names_are_camel_case() {
        assert_eq!(AuthState::VerifyingFingerprint.to_string(), "verifyingFingerprint");
        assert_eq!(AuthState::AuthenticationFailed.to_string(), "authenticationFailed");
        assert_eq!(CodeEntryState::EnterCode.to_string(), "enterCode");
        assert_eq!(CodeEntryContext::Change.to_string(), "change");
    }

    #[test]
    fn test_code_kind_labels() {
        assert_eq!(CodeKind::Pin.label(), "PIN");
        assert_eq!(CodeKind::Passcode.label(), "passcode");
    }
}
