//! Per-peer session: metadata plus chat transcript.

use crate::{
    avatar::{AvatarImage, AvatarRef},
    callback::ChatEntryKind,
    event::{ClientAction, Notification, TransportRequest},
    roster::{Peer, PeerId},
};

/// The local user, as attributed on outgoing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    /// Display name of the local user.
    pub name: String,
}

impl SelfIdentity {
    /// Create an identity with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSender {
    /// Sent by the local user.
    Local(SelfIdentity),
    /// Received from the peer.
    Peer(PeerId),
}

/// One entry of a transcript. Arrival order is the timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author.
    pub sender: ChatSender,
    /// Message text.
    pub body: String,
}

impl ChatMessage {
    /// Whether the local user wrote this message.
    pub fn is_local(&self) -> bool {
        matches!(self.sender, ChatSender::Local(_))
    }
}

/// Peer metadata combined with the chat transcript for that peer.
#[derive(Debug, Clone)]
pub struct PeerSession {
    peer: Peer,
    /// Append-only.
    transcript: Vec<ChatMessage>,
}

impl PeerSession {
    /// Session for a peer seen for the first time.
    pub fn new(id: PeerId) -> Self {
        Self { peer: Peer::new(id), transcript: Vec::new() }
    }

    /// Peer identifier.
    pub fn id(&self) -> PeerId {
        self.peer.id
    }

    /// Peer metadata.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub(crate) fn peer_mut(&mut self) -> &mut Peer {
        &mut self.peer
    }

    /// Messages exchanged with this peer, oldest first.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Send a chat message to this peer.
    ///
    /// The message is echoed into the transcript before the send is issued;
    /// delivery is not acknowledged.
    pub fn send_message(&mut self, identity: &SelfIdentity, body: String) -> Vec<ClientAction> {
        let message = ChatMessage { sender: ChatSender::Local(identity.clone()), body: body.clone() };
        self.transcript.push(message.clone());

        vec![
            ClientAction::Notify(Notification::TranscriptAppended { peer: self.id(), message }),
            ClientAction::Transport(TransportRequest::SendChatMessage { peer: self.id(), body }),
        ]
    }

    /// Handle a chat entry from this peer.
    ///
    /// Only plain messages are recorded; typing notifications and the like
    /// produce nothing.
    pub fn receive(&mut self, entry: ChatEntryKind, body: &str) -> Vec<ClientAction> {
        if entry != ChatEntryKind::Message {
            tracing::trace!(peer = %self.id(), ?entry, "ignoring non-message chat entry");
            return Vec::new();
        }

        let message = ChatMessage { sender: ChatSender::Peer(self.id()), body: body.to_string() };
        self.transcript.push(message.clone());

        vec![ClientAction::Notify(Notification::TranscriptAppended { peer: self.id(), message })]
    }

    /// Avatar that should be fetched: resolved and not yet cached locally.
    pub fn pending_avatar(&self) -> Option<&AvatarRef> {
        match (&self.peer.avatar, &self.peer.avatar_image) {
            (Some(avatar), None) => Some(avatar),
            _ => None,
        }
    }

    /// Attach a fetched image if it still matches the peer's avatar.
    ///
    /// Returns false when the peer's avatar changed while the download was
    /// running.
    pub(crate) fn attach_avatar(&mut self, key: &str, image: AvatarImage) -> bool {
        match &self.peer.avatar {
            Some(avatar) if avatar.key() == key => {
                self.peer.avatar_image = Some(image);
                true
            },
            _ => false,
        }
    }
}
