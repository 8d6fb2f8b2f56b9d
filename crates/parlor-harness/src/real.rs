//! Real engine behind the model's interface.
//!
//! Translates each [`Operation`] into a [`ClientEvent`] for a `Client` and
//! reads the engine's state back in the model's vocabulary.

use parlor_core::{
    AvatarFetchError, AvatarImage, CallbackEvent, ChatEntryKind, Client, ClientAction,
    ClientConfig, ClientError, ClientEvent, Credentials, PeerId, ResultCode, SessionError,
    TransportRequest,
};

use crate::model::{
    ModelMessage, ModelPeer, ModelSession, ObservableState, Operation, OperationError,
    OperationResult,
    operation::{activity, avatar_hash, avatar_key, display_name, message_body, presence_state},
};

/// Real engine wrapper that mirrors `ModelWorld`'s interface.
#[derive(Debug)]
pub struct RealWorld {
    client: Client,
    /// `FetchAvatar` requests seen so far.
    fetches: usize,
}

impl Default for RealWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl RealWorld {
    /// Disconnected engine with default configuration.
    pub fn new() -> Self {
        Self { client: Client::new(ClientConfig::default()), fetches: 0 }
    }

    /// The wrapped engine.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Apply an operation to the engine.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match self.client.handle(to_event(op)) {
            Ok(actions) => {
                self.fetches += actions
                    .iter()
                    .filter(|action| {
                        matches!(action, ClientAction::Transport(TransportRequest::FetchAvatar { .. }))
                    })
                    .count();
                OperationResult::Ok
            },
            Err(ClientError::Session(SessionError::NotLoggedIn)) => {
                OperationResult::Error(OperationError::NotLoggedIn)
            },
            Err(ClientError::Session(_)) => OperationResult::Error(OperationError::InvalidState),
            Err(ClientError::UnknownPeer { .. }) => {
                OperationResult::Error(OperationError::UnknownPeer)
            },
        }
    }

    /// Engine state in the model's vocabulary.
    pub fn observable_state(&self) -> ObservableState {
        let roster: Vec<_> = self
            .client
            .ordered_peers()
            .map(|peer| ModelPeer {
                id: peer.id.0,
                name: peer.display_name.clone(),
                presence: peer.presence,
                activity: peer.activity.clone(),
                avatar: peer.avatar.as_ref().map(|avatar| avatar.key().to_string()),
                has_image: peer.avatar_image.is_some(),
            })
            .collect();

        let mut ids: Vec<_> = roster.iter().map(|peer| peer.id).collect();
        ids.sort_unstable();
        let transcripts = ids
            .into_iter()
            .map(|id| {
                let messages = self
                    .client
                    .transcript(PeerId(id))
                    .unwrap_or_default()
                    .iter()
                    .map(|message| ModelMessage {
                        local: message.is_local(),
                        body: message.body.clone(),
                    })
                    .collect();
                (id, messages)
            })
            .collect();

        ObservableState {
            session: ModelSession::from(self.client.session_state()),
            roster,
            transcripts,
            avatar_fetches: self.fetches,
        }
    }
}

fn callback(event: CallbackEvent) -> ClientEvent {
    ClientEvent::Callback(event)
}

fn peer_id(peer: u8) -> PeerId {
    PeerId(u64::from(peer))
}

/// Engine event for an operation.
pub fn to_event(op: &Operation) -> ClientEvent {
    match op {
        Operation::Connect => {
            ClientEvent::Connect { credentials: Credentials::new("model", "secret") }
        },
        Operation::Disconnect => ClientEvent::Disconnect,
        Operation::SubmitAuthCode { empty } => ClientEvent::SubmitAuthCode {
            code: if *empty { "  ".to_string() } else { "K7QX2".to_string() },
        },
        Operation::SetPresence { state } => {
            ClientEvent::SetPresence { state: presence_state(*state) }
        },
        Operation::SendMessage { peer, body } => {
            ClientEvent::SendMessage { peer: peer_id(*peer), body: message_body(*body) }
        },
        Operation::ConnectionEstablished => callback(CallbackEvent::ConnectionEstablished),
        Operation::ConnectionRetrying { count } => {
            callback(CallbackEvent::ConnectionRetrying { count: u32::from(*count) })
        },
        Operation::LoginResult { outcome } => {
            callback(CallbackEvent::LoginResult { result: outcome.result_code() })
        },
        Operation::LoggedOff { protocol_mismatch } => callback(CallbackEvent::LoggedOff {
            result: if *protocol_mismatch {
                ResultCode::InvalidProtocolVersion
            } else {
                ResultCode::ServiceUnavailable
            },
        }),
        Operation::Presence { peer, state, activity: code } => {
            callback(CallbackEvent::PresenceChanged {
                peer: peer_id(*peer),
                state: presence_state(*state),
                activity: activity(*code),
            })
        },
        Operation::Name { peer, name } => callback(CallbackEvent::NameChanged {
            peer: peer_id(*peer),
            name: display_name(*name).to_string(),
        }),
        Operation::Avatar { peer, hash } => callback(CallbackEvent::AvatarHashChanged {
            peer: peer_id(*peer),
            hash: avatar_hash(*hash),
        }),
        Operation::ChatReceived { peer, body, typing } => {
            callback(CallbackEvent::ChatMessageReceived {
                peer: peer_id(*peer),
                entry: if *typing { ChatEntryKind::Typing } else { ChatEntryKind::Message },
                body: message_body(*body),
            })
        },
        Operation::AvatarFetched { hash, ok } => ClientEvent::AvatarFetched {
            key: avatar_key(*hash),
            result: if *ok {
                Ok(AvatarImage::from(vec![*hash]))
            } else {
                Err(AvatarFetchError { reason: "unavailable".to_string() })
            },
        },
    }
}
