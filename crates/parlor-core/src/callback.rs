//! Callback events pushed by the transport.
//!
//! The transport is an opaque collaborator: it owns the wire protocol and
//! reports what happened as typed [`CallbackEvent`]s. Events arrive unordered
//! relative to user intents and are routed by [`EventKind`].

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::roster::{PeerId, PresenceState};

/// Result codes reported by the service for logon and logoff.
///
/// Values match the service's numeric result codes so recorded traces stay
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum ResultCode {
    /// Success.
    Ok = 1,
    /// Generic failure.
    Fail = 2,
    /// No connection to the service.
    NoConnection = 3,
    /// Username or password rejected.
    InvalidPassword = 5,
    /// The account is logged in from another client.
    LoggedInElsewhere = 6,
    /// Client protocol version is not supported.
    InvalidProtocolVersion = 7,
    /// Service temporarily unavailable.
    ServiceUnavailable = 20,
    /// The server asked the client to try a different server.
    TryAnotherServer = 48,
    /// Logon requires an out-of-band auth code.
    AccountLogonDenied = 63,
    /// The supplied auth code was rejected or expired.
    InvalidLoginAuthCode = 65,
}

/// Kind of chat entry carried by a chat callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ChatEntryKind {
    /// Plain chat message.
    Message = 1,
    /// Peer started typing.
    Typing = 2,
    /// Emote ("/me") entry.
    Emote = 4,
    /// Peer closed the conversation window.
    LeftConversation = 6,
}

/// Event kinds used for bus subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Transport connection came up.
    Connected,
    /// Transport is retrying the connection.
    Retrying,
    /// Result of a logon attempt.
    LoginResult,
    /// Service ended the session.
    LoggedOff,
    /// Peer presence or activity changed.
    Presence,
    /// Peer display name changed.
    Name,
    /// Peer avatar hash changed.
    AvatarHash,
    /// Chat entry from a peer.
    ChatMessage,
}

/// Event pushed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackEvent {
    /// Transport connection established, logon may proceed.
    ConnectionEstablished,

    /// Transport lost or failed the connection and is retrying.
    ConnectionRetrying {
        /// Retry attempt as counted by the transport, 0 if it keeps no count.
        count: u32,
    },

    /// Result of a logon attempt.
    LoginResult {
        /// Service result code.
        result: ResultCode,
    },

    /// Service logged the session off.
    LoggedOff {
        /// Service result code.
        result: ResultCode,
    },

    /// Peer presence changed.
    PresenceChanged {
        /// Peer the update is about.
        peer: PeerId,
        /// New presence state.
        state: PresenceState,
        /// Name of the activity the peer is in, if any.
        #[serde(default)]
        activity: Option<String>,
    },

    /// Peer display name changed.
    NameChanged {
        /// Peer the update is about.
        peer: PeerId,
        /// New display name.
        name: String,
    },

    /// Peer avatar content hash changed.
    AvatarHashChanged {
        /// Peer the update is about.
        peer: PeerId,
        /// Raw content hash (all zeroes means no avatar).
        hash: Vec<u8>,
    },

    /// Chat entry received from a peer.
    ChatMessageReceived {
        /// Sending peer.
        peer: PeerId,
        /// Entry kind.
        entry: ChatEntryKind,
        /// Message text.
        body: String,
    },
}

impl CallbackEvent {
    /// Subscription kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionEstablished => EventKind::Connected,
            Self::ConnectionRetrying { .. } => EventKind::Retrying,
            Self::LoginResult { .. } => EventKind::LoginResult,
            Self::LoggedOff { .. } => EventKind::LoggedOff,
            Self::PresenceChanged { .. } => EventKind::Presence,
            Self::NameChanged { .. } => EventKind::Name,
            Self::AvatarHashChanged { .. } => EventKind::AvatarHash,
            Self::ChatMessageReceived { .. } => EventKind::ChatMessage,
        }
    }

    /// Peer referenced by this event, if any.
    pub fn peer(&self) -> Option<PeerId> {
        match self {
            Self::PresenceChanged { peer, .. }
            | Self::NameChanged { peer, .. }
            | Self::AvatarHashChanged { peer, .. }
            | Self::ChatMessageReceived { peer, .. } => Some(*peer),
            Self::ConnectionEstablished
            | Self::ConnectionRetrying { .. }
            | Self::LoginResult { .. }
            | Self::LoggedOff { .. } => None,
        }
    }
}
