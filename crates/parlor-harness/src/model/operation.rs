//! Operations for model-based testing.
//!
//! Operations cover user intents and transport callbacks. They are generated
//! by proptest (or `arbitrary` in the fuzzer) and applied to both the model
//! and the real engine. Payloads are small codes expanded by the helpers
//! below so both sides see identical values.

use arbitrary::Arbitrary;
use parlor_core::{PresenceState, ResultCode};

/// Peer identifier (u8 keeps the roster small enough for collisions).
pub type ModelPeerId = u8;

/// Display names used by operations. Includes the empty name and names
/// that differ only in case.
const NAMES: [&str; 6] = ["", "Ann", "ann", "Bob", "Zed", "[Unknown]"];

/// Activities used by operations. Includes the empty activity.
const ACTIVITIES: [&str; 3] = ["", "Chess", "Go"];

/// Login results the model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum LoginOutcome {
    /// Logged in.
    Ok,
    /// Auth code required.
    Denied,
    /// Auth code rejected.
    InvalidCode,
    /// Wrong password.
    InvalidPassword,
    /// Session taken over elsewhere.
    LoggedInElsewhere,
    /// Transient service failure.
    ServiceUnavailable,
}

impl LoginOutcome {
    /// Wire result code.
    pub fn result_code(self) -> ResultCode {
        match self {
            Self::Ok => ResultCode::Ok,
            Self::Denied => ResultCode::AccountLogonDenied,
            Self::InvalidCode => ResultCode::InvalidLoginAuthCode,
            Self::InvalidPassword => ResultCode::InvalidPassword,
            Self::LoggedInElsewhere => ResultCode::LoggedInElsewhere,
            Self::ServiceUnavailable => ResultCode::ServiceUnavailable,
        }
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// User connects with valid credentials.
    Connect,

    /// User disconnects.
    Disconnect,

    /// User submits an auth code.
    SubmitAuthCode {
        /// Submit a blank code.
        empty: bool,
    },

    /// User changes their own presence.
    SetPresence {
        /// Presence code, see [`presence_state`].
        state: u8,
    },

    /// User sends a chat message.
    SendMessage {
        /// Recipient.
        peer: ModelPeerId,
        /// Body code, see [`message_body`].
        body: u8,
    },

    /// Transport connected.
    ConnectionEstablished,

    /// Transport lost or retried the connection.
    ConnectionRetrying {
        /// Count reported by the transport, 0 for none.
        count: u8,
    },

    /// Transport reported a login result.
    LoginResult {
        /// Result.
        outcome: LoginOutcome,
    },

    /// Transport reported a log off.
    LoggedOff {
        /// Log off was caused by a protocol version mismatch.
        protocol_mismatch: bool,
    },

    /// Peer presence changed.
    Presence {
        /// Peer.
        peer: ModelPeerId,
        /// Presence code, see [`presence_state`].
        state: u8,
        /// Activity code, see [`activity`].
        activity: Option<u8>,
    },

    /// Peer name changed.
    Name {
        /// Peer.
        peer: ModelPeerId,
        /// Name code, see [`display_name`].
        name: u8,
    },

    /// Peer avatar hash changed.
    Avatar {
        /// Peer.
        peer: ModelPeerId,
        /// Hash code, see [`avatar_hash`]. Zero means no avatar.
        hash: u8,
    },

    /// Peer sent a chat entry.
    ChatReceived {
        /// Sender.
        peer: ModelPeerId,
        /// Body code, see [`message_body`].
        body: u8,
        /// Entry is a typing notification rather than a message.
        typing: bool,
    },

    /// An avatar download finished.
    AvatarFetched {
        /// Hash code of the download.
        hash: u8,
        /// Download succeeded.
        ok: bool,
    },
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation accepted.
    Ok,

    /// Operation rejected.
    Error(OperationError),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Rejections the model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Intent not valid in the current session state.
    InvalidState,

    /// Presence change while not logged in.
    NotLoggedIn,

    /// Message to a peer that is not in the roster.
    UnknownPeer,
}

/// Presence state for a code.
pub fn presence_state(code: u8) -> PresenceState {
    match code % 7 {
        0 => PresenceState::Offline,
        1 => PresenceState::Online,
        2 => PresenceState::Busy,
        3 => PresenceState::Away,
        4 => PresenceState::Snooze,
        5 => PresenceState::LookingToTrade,
        _ => PresenceState::LookingToPlay,
    }
}

/// Display name for a code.
pub fn display_name(code: u8) -> &'static str {
    NAMES[usize::from(code) % NAMES.len()]
}

/// Activity for a code, before empty-activity normalisation.
pub fn activity(code: Option<u8>) -> Option<String> {
    code.map(|code| ACTIVITIES[usize::from(code) % ACTIVITIES.len()].to_string())
}

/// Raw avatar hash for a code.
pub fn avatar_hash(code: u8) -> Vec<u8> {
    vec![code; 20]
}

/// Cache key of the avatar for a code.
pub fn avatar_key(code: u8) -> String {
    format!("{code:02x}").repeat(20)
}

/// Message body for a code.
pub fn message_body(code: u8) -> String {
    format!("message {code}")
}
