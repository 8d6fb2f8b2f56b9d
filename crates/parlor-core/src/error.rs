//! Client error types.

use thiserror::Error;

use crate::{callback::EventKind, roster::PeerId, session::SessionState};

/// Errors from session intents (connect, auth code, presence).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operation is not valid in the current session state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Name of the rejected operation.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Username or password is empty.
    #[error("no valid username or password entered")]
    MissingCredentials,

    /// Operation requires a logged-in session.
    #[error("not logged in")]
    NotLoggedIn,
}

/// Errors raised by a bus subscriber while handling a callback.
///
/// These never reach the publisher; the bus reports them to its diagnostic
/// sink and keeps delivering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Callback references a peer the roster does not know.
    #[error("unknown peer: {peer}")]
    UnknownPeer {
        /// The peer that was not found.
        peer: PeerId,
    },

    /// Subscriber received a kind it does not handle.
    #[error("unexpected event kind: {kind:?}")]
    UnexpectedEvent {
        /// Kind of the offending event.
        kind: EventKind,
    },
}

/// Errors from [`crate::Client::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Session intent rejected.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Peer is not in the roster.
    #[error("unknown peer: {peer}")]
    UnknownPeer {
        /// The peer that was not found.
        peer: PeerId,
    },
}

impl ClientError {
    /// Returns true if the caller should prompt for new input.
    ///
    /// Credential problems need the user; everything else is a caller bug
    /// or a stale UI.
    pub fn needs_user_input(&self) -> bool {
        matches!(self, Self::Session(SessionError::MissingCredentials))
    }
}
