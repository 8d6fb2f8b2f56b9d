//! Client events and actions.
//!
//! The client is a pure state machine: callers feed [`ClientEvent`]s and
//! execute the [`ClientAction`]s it returns, in order.

use crate::{
    avatar::{AvatarFetchError, AvatarImage},
    callback::CallbackEvent,
    peer::ChatMessage,
    roster::{PeerId, PresenceState},
    session::{AuthCodeReason, Credentials, SessionState},
};

/// Events fed into the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// User asked to connect.
    Connect {
        /// Account credentials.
        credentials: Credentials,
    },

    /// User asked to disconnect.
    Disconnect,

    /// User entered an out-of-band auth code.
    SubmitAuthCode {
        /// Code as typed.
        code: String,
    },

    /// User changed their own presence.
    SetPresence {
        /// Requested state.
        state: PresenceState,
    },

    /// User sent a chat message.
    SendMessage {
        /// Recipient.
        peer: PeerId,
        /// Message text.
        body: String,
    },

    /// Callback from the transport.
    Callback(CallbackEvent),

    /// An avatar download finished.
    AvatarFetched {
        /// Cache key of the download.
        key: String,
        /// Downloaded image or failure.
        result: Result<AvatarImage, AvatarFetchError>,
    },
}

/// Imperative calls into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRequest {
    /// Open a connection for this account.
    Connect {
        /// Account credentials.
        credentials: Credentials,
        /// Auth code from a previous prompt, if any.
        auth_code: Option<String>,
    },

    /// Log on over the established connection.
    LogOn {
        /// Account credentials.
        credentials: Credentials,
        /// Auth code from a previous prompt, if any.
        auth_code: Option<String>,
    },

    /// Close the connection.
    Disconnect,

    /// Enable or disable the transport's automatic reconnect.
    SetAutoReconnect {
        /// Whether reconnect is allowed.
        enabled: bool,
    },

    /// Publish the local user's presence.
    SetPresence {
        /// New state.
        state: PresenceState,
    },

    /// Send a chat message.
    SendChatMessage {
        /// Recipient.
        peer: PeerId,
        /// Message text.
        body: String,
    },

    /// Download an avatar image. Completion must come back as
    /// [`ClientEvent::AvatarFetched`] with the same key.
    FetchAvatar {
        /// Cache key.
        key: String,
        /// Download location.
        uri: String,
    },
}

/// Stage of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStage {
    /// Opening the transport connection.
    Connecting,
    /// Connection is up, logon sent.
    LoggingIn,
}

/// Progress of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectProgress {
    /// Current stage.
    pub stage: ConnectStage,
    /// Retries so far.
    pub retry_count: u32,
}

impl ConnectProgress {
    /// Human-readable progress line.
    pub fn message(&self) -> String {
        let base = match self.stage {
            ConnectStage::Connecting => "Connecting to the servers...",
            ConnectStage::LoggingIn => "Logging in...",
        };
        if self.retry_count > 0 {
            format!("{base} (retry {})", self.retry_count)
        } else {
            base.to_string()
        }
    }
}

/// Change notifications for display collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Session state changed.
    SessionStateChanged(SessionState),
    /// Connection attempt progressed.
    ConnectProgress(ConnectProgress),
    /// An auth code must be entered.
    AuthCodeRequested {
        /// Why the code is requested.
        reason: AuthCodeReason,
    },
    /// Roster membership or order may have changed.
    RosterChanged,
    /// Metadata of one peer changed.
    PeerChanged {
        /// Changed peer.
        peer: PeerId,
    },
    /// A message was added to a transcript.
    TranscriptAppended {
        /// Transcript owner.
        peer: PeerId,
        /// Appended message.
        message: ChatMessage,
    },
    /// A peer's avatar image is available.
    AvatarReady {
        /// Peer the avatar belongs to.
        peer: PeerId,
        /// Fetched image.
        image: AvatarImage,
    },
}

/// Actions produced by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Call into the transport.
    Transport(TransportRequest),
    /// Notify display collaborators.
    Notify(Notification),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_message_mentions_retries() {
        let first = ConnectProgress { stage: ConnectStage::LoggingIn, retry_count: 0 };
        let retried = ConnectProgress { stage: ConnectStage::LoggingIn, retry_count: 2 };

        assert_eq!(first.message(), "Logging in...");
        assert_eq!(retried.message(), "Logging in... (retry 2)");
    }
}
