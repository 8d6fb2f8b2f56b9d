//! Model session state machine.

use parlor_core::{AuthCodeReason, SessionState};

use super::operation::{LoginOutcome, OperationError, OperationResult};

/// Session state as the model tracks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSession {
    /// No session.
    Disconnected,
    /// Connecting, with the retry count.
    Connecting(u32),
    /// Waiting for an auth code.
    AwaitingAuthCode {
        /// The previous code was rejected or blank.
        rejected: bool,
    },
    /// Logged in.
    LoggedIn,
    /// Stopped on a fatal error.
    Failed,
}

impl From<&SessionState> for ModelSession {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Disconnected => Self::Disconnected,
            SessionState::Connecting { retry_count } => Self::Connecting(*retry_count),
            SessionState::AwaitingAuthCode { reason } => {
                Self::AwaitingAuthCode { rejected: *reason == AuthCodeReason::Invalid }
            },
            SessionState::LoggedIn => Self::LoggedIn,
            SessionState::FatalError { .. } => Self::Failed,
        }
    }
}

impl ModelSession {
    pub(crate) fn connect(&mut self) -> OperationResult {
        match self {
            Self::Disconnected | Self::Failed => {
                *self = Self::Connecting(0);
                OperationResult::Ok
            },
            _ => OperationResult::Error(OperationError::InvalidState),
        }
    }

    pub(crate) fn disconnect(&mut self) {
        *self = Self::Disconnected;
    }

    pub(crate) fn submit_auth_code(&mut self, empty: bool) -> OperationResult {
        if !matches!(self, Self::AwaitingAuthCode { .. }) {
            return OperationResult::Error(OperationError::InvalidState);
        }
        *self = if empty { Self::AwaitingAuthCode { rejected: true } } else { Self::Connecting(0) };
        OperationResult::Ok
    }

    pub(crate) fn set_presence(self) -> OperationResult {
        if self == Self::LoggedIn {
            OperationResult::Ok
        } else {
            OperationResult::Error(OperationError::NotLoggedIn)
        }
    }

    pub(crate) fn retry(&mut self, reported: u8) {
        let tracked = match *self {
            Self::Connecting(count) => count.saturating_add(1),
            Self::LoggedIn => 1,
            _ => return,
        };
        *self = Self::Connecting(if reported == 0 { tracked } else { u32::from(reported) });
    }

    pub(crate) fn login_result(&mut self, outcome: LoginOutcome) {
        if !matches!(self, Self::Connecting(_)) {
            return;
        }
        match outcome {
            LoginOutcome::Ok => *self = Self::LoggedIn,
            LoginOutcome::Denied => *self = Self::AwaitingAuthCode { rejected: false },
            LoginOutcome::InvalidCode => *self = Self::AwaitingAuthCode { rejected: true },
            LoginOutcome::InvalidPassword | LoginOutcome::LoggedInElsewhere => {
                *self = Self::Failed;
            },
            LoginOutcome::ServiceUnavailable => {},
        }
    }

    pub(crate) fn logged_off(&mut self, protocol_mismatch: bool) {
        if protocol_mismatch {
            *self = Self::Failed;
        } else if *self == Self::LoggedIn {
            *self = Self::Connecting(0);
        }
    }
}
