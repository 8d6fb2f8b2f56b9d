//! Client state machine.
//!
//! The `Client` wires the session controller, roster, peer sessions and
//! avatar cache to a single [`CallbackBus`]. It is a pure state machine:
//! events go in through [`Client::handle`], actions come out, and the caller
//! performs the I/O.

use crate::{
    avatar::{AvatarCache, AvatarFetchError, AvatarImage, AvatarRef, FetchOutcome},
    bus::{CallbackBus, Registrar},
    callback::{CallbackEvent, EventKind},
    config::ClientConfig,
    error::{ClientError, HandlerError},
    event::{ClientAction, ClientEvent, Notification, TransportRequest},
    peer::{ChatMessage, SelfIdentity},
    roster::{Peer, PeerId, PeerPatch, Roster},
    session::{SessionController, SessionState},
};

/// Bus subscribers owned by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The session controller.
    Session,
    /// Roster metadata updates.
    Roster,
    /// Chat for one peer.
    Peer(PeerId),
}

/// Everything the bus delivers into.
#[derive(Debug)]
struct Engine {
    session: SessionController,
    roster: Roster,
    avatars: AvatarCache,
    identity: SelfIdentity,
    config: ClientConfig,
}

/// Client state machine.
///
/// Single-threaded by construction: whoever owns the `Client` is the only
/// writer of session, roster and avatar state.
#[derive(Debug)]
pub struct Client {
    bus: CallbackBus<Route>,
    engine: Engine,
}

impl Client {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let mut bus = CallbackBus::new();
        for kind in
            [EventKind::Connected, EventKind::Retrying, EventKind::LoginResult, EventKind::LoggedOff]
        {
            bus.subscribe(kind, Route::Session);
        }
        for kind in
            [EventKind::Presence, EventKind::Name, EventKind::AvatarHash, EventKind::ChatMessage]
        {
            bus.subscribe(kind, Route::Roster);
        }

        let engine = Engine {
            session: SessionController::new(config.retry),
            roster: Roster::new(),
            avatars: AvatarCache::new(),
            identity: SelfIdentity::new(config.self_name.clone()),
            config,
        };

        Self { bus, engine }
    }

    /// Identity attributed to outgoing messages.
    pub fn identity(&self) -> &SelfIdentity {
        &self.engine.identity
    }

    /// Current session state.
    pub fn session_state(&self) -> &SessionState {
        self.engine.session.state()
    }

    /// The roster.
    pub fn roster(&self) -> &Roster {
        &self.engine.roster
    }

    /// The avatar cache.
    pub fn avatars(&self) -> &AvatarCache {
        &self.engine.avatars
    }

    /// Metadata of one peer.
    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.engine.roster.peer(id)
    }

    /// Transcript of one peer.
    pub fn transcript(&self, id: PeerId) -> Option<&[ChatMessage]> {
        self.engine.roster.session(id).map(|session| session.transcript())
    }

    /// Peers in display order.
    pub fn ordered_peers(&self) -> impl Iterator<Item = &Peer> + '_ {
        self.engine.roster.ordered_view()
    }

    /// Queue a transport callback without processing it.
    pub fn publish(&mut self, event: CallbackEvent) {
        self.bus.publish(event);
    }

    /// Deliver every queued callback and return the resulting actions.
    ///
    /// Handler failures are logged by the bus and do not abort delivery.
    pub fn process_callbacks(&mut self) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        let engine = &mut self.engine;

        let report = self.bus.drain(|route, event, registrar| {
            engine.deliver(*route, event, registrar, &mut actions)
        });
        if !report.failures.is_empty() {
            tracing::debug!(
                delivered = report.delivered,
                failed = report.failures.len(),
                "callback delivery finished with failures"
            );
        }

        actions
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if a user intent is not valid right now. Callback
    /// and avatar events never fail.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connect { credentials } => Ok(self.engine.session.connect(credentials)?),
            ClientEvent::Disconnect => Ok(self.engine.session.disconnect()),
            ClientEvent::SubmitAuthCode { code } => {
                Ok(self.engine.session.submit_auth_code(&code)?)
            },
            ClientEvent::SetPresence { state } => Ok(self.engine.session.set_presence(state)?),
            ClientEvent::SendMessage { peer, body } => self.engine.send_message(peer, body),
            ClientEvent::Callback(callback) => {
                self.publish(callback);
                Ok(self.process_callbacks())
            },
            ClientEvent::AvatarFetched { key, result } => {
                Ok(self.engine.complete_avatar(&key, result))
            },
        }
    }
}

impl Engine {
    fn deliver(
        &mut self,
        route: Route,
        event: &CallbackEvent,
        registrar: &mut Registrar<Route>,
        actions: &mut Vec<ClientAction>,
    ) -> Result<(), HandlerError> {
        match route {
            Route::Session => {
                actions.extend(self.session.handle_callback(event)?);
                Ok(())
            },
            Route::Roster => self.apply_metadata(event, registrar, actions),
            Route::Peer(peer) => self.deliver_chat(peer, event, actions),
        }
    }

    /// Roster handler: creates unseen peers and applies metadata updates.
    fn apply_metadata(
        &mut self,
        event: &CallbackEvent,
        registrar: &mut Registrar<Route>,
        actions: &mut Vec<ClientAction>,
    ) -> Result<(), HandlerError> {
        let (peer, patch) = match event {
            CallbackEvent::PresenceChanged { peer, state, activity } => {
                (*peer, PeerPatch::presence(*state, activity.clone()))
            },
            CallbackEvent::NameChanged { peer, name } => (*peer, PeerPatch::name(name.clone())),
            CallbackEvent::AvatarHashChanged { peer, hash } => {
                (*peer, PeerPatch::avatar(AvatarRef::from_hash(hash)))
            },
            // Only membership: the peer's own session appends the message.
            CallbackEvent::ChatMessageReceived { peer, .. } => (*peer, PeerPatch::default()),
            _ => return Err(HandlerError::UnexpectedEvent { kind: event.kind() }),
        };

        let outcome = self.roster.upsert(peer, patch);

        if outcome.created {
            tracing::debug!(%peer, "peer added to roster");
            registrar.subscribe_from(EventKind::ChatMessage, peer, Route::Peer(peer));
        }
        if outcome.created || outcome.changed {
            actions.push(ClientAction::Notify(Notification::PeerChanged { peer }));
            actions.push(ClientAction::Notify(Notification::RosterChanged));
        }
        if outcome.avatar_changed {
            self.request_avatar(peer, actions);
        }

        Ok(())
    }

    /// Peer handler: chat entries addressed to one peer.
    fn deliver_chat(
        &mut self,
        peer: PeerId,
        event: &CallbackEvent,
        actions: &mut Vec<ClientAction>,
    ) -> Result<(), HandlerError> {
        let CallbackEvent::ChatMessageReceived { entry, body, .. } = event else {
            return Err(HandlerError::UnexpectedEvent { kind: event.kind() });
        };
        let session = self.roster.session_mut(peer).ok_or(HandlerError::UnknownPeer { peer })?;

        actions.extend(session.receive(*entry, body));
        Ok(())
    }

    fn send_message(
        &mut self,
        peer: PeerId,
        body: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let session = self.roster.session_mut(peer).ok_or(ClientError::UnknownPeer { peer })?;
        Ok(session.send_message(&self.identity, body))
    }

    /// Start or join the avatar download for `peer` if it needs one.
    fn request_avatar(&mut self, peer: PeerId, actions: &mut Vec<ClientAction>) {
        let Some(avatar) = self.roster.session(peer).and_then(|s| s.pending_avatar()).cloned()
        else {
            return;
        };

        match self.avatars.fetch(avatar.key(), peer) {
            FetchOutcome::Ready(image) => self.attach_avatar(peer, avatar.key(), image, actions),
            FetchOutcome::Started => {
                let uri = avatar.uri(&self.config.avatar_base_url);
                tracing::debug!(%peer, %uri, "fetching avatar");
                actions.push(ClientAction::Transport(TransportRequest::FetchAvatar {
                    key: avatar.key().to_string(),
                    uri,
                }));
            },
            FetchOutcome::Coalesced => tracing::trace!(%peer, "joined running avatar fetch"),
            FetchOutcome::Failed => tracing::trace!(%peer, "avatar previously failed"),
        }
    }

    fn complete_avatar(
        &mut self,
        key: &str,
        result: Result<AvatarImage, AvatarFetchError>,
    ) -> Vec<ClientAction> {
        let completion = self.avatars.complete(key, result);
        let mut actions = Vec::new();

        if let Some(image) = completion.image {
            for peer in completion.waiters {
                self.attach_avatar(peer, key, image.clone(), &mut actions);
            }
        }

        actions
    }

    fn attach_avatar(
        &mut self,
        peer: PeerId,
        key: &str,
        image: AvatarImage,
        actions: &mut Vec<ClientAction>,
    ) {
        let Some(session) = self.roster.session_mut(peer) else {
            return;
        };
        if !session.attach_avatar(key, image.clone()) {
            tracing::trace!(%peer, "avatar changed during fetch, dropping image");
            return;
        }

        actions.push(ClientAction::Notify(Notification::AvatarReady { peer, image }));
        actions.push(ClientAction::Notify(Notification::PeerChanged { peer }));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        avatar::AvatarEntryState,
        callback::{ChatEntryKind, ResultCode},
        peer::ChatSender,
        roster::PresenceState,
        session::{AuthCodeReason, Credentials},
    };

    const HASH: [u8; 20] = [0xab; 20];

    fn client() -> Client {
        Client::new(ClientConfig::default())
    }

    fn callback(client: &mut Client, event: CallbackEvent) -> Vec<ClientAction> {
        client.handle(ClientEvent::Callback(event)).unwrap()
    }

    fn logged_in() -> Client {
        let mut client = client();
        client
            .handle(ClientEvent::Connect { credentials: Credentials::new("alice", "pw") })
            .unwrap();
        callback(&mut client, CallbackEvent::ConnectionEstablished);
        callback(&mut client, CallbackEvent::LoginResult { result: ResultCode::Ok });
        client
    }

    fn fetches(actions: &[ClientAction]) -> Vec<(String, String)> {
        actions
            .iter()
            .filter_map(|action| match action {
                ClientAction::Transport(TransportRequest::FetchAvatar { key, uri }) => {
                    Some((key.clone(), uri.clone()))
                },
                _ => None,
            })
            .collect()
    }

    fn chat(peer: u64, body: &str) -> CallbackEvent {
        CallbackEvent::ChatMessageReceived {
            peer: PeerId(peer),
            entry: ChatEntryKind::Message,
            body: body.to_string(),
        }
    }

    #[test]
    fn login_notifies_logged_in_exactly_once() {
        let mut client = client();
        let mut actions = client
            .handle(ClientEvent::Connect { credentials: Credentials::new("alice", "pw") })
            .unwrap();
        actions.extend(callback(&mut client, CallbackEvent::ConnectionEstablished));
        actions.extend(callback(&mut client, CallbackEvent::LoginResult { result: ResultCode::Ok }));

        let logged_in = actions
            .iter()
            .filter(|action| {
                **action
                    == ClientAction::Notify(Notification::SessionStateChanged(
                        SessionState::LoggedIn,
                    ))
            })
            .count();

        assert_eq!(client.session_state(), &SessionState::LoggedIn);
        assert_eq!(logged_in, 1);
    }

    #[test]
    fn denied_logon_prompts_through_client() {
        let mut client = client();
        client
            .handle(ClientEvent::Connect { credentials: Credentials::new("alice", "pw") })
            .unwrap();

        callback(&mut client, CallbackEvent::LoginResult { result: ResultCode::AccountLogonDenied });
        let actions = client.handle(ClientEvent::SubmitAuthCode { code: String::new() }).unwrap();

        assert_eq!(client.session_state(), &SessionState::AwaitingAuthCode {
            reason: AuthCodeReason::Invalid
        });
        assert!(actions.iter().all(|action| !matches!(action, ClientAction::Transport(_))));
    }

    #[test]
    fn metadata_events_build_one_peer() {
        let mut client = logged_in();

        callback(&mut client, CallbackEvent::PresenceChanged {
            peer: PeerId(1),
            state: PresenceState::Online,
            activity: None,
        });
        callback(&mut client, CallbackEvent::NameChanged {
            peer: PeerId(1),
            name: "Ann".to_string(),
        });

        assert_eq!(client.roster().len(), 1);
        let peer = client.peer(PeerId(1)).unwrap();
        assert_eq!(peer.display_name, "Ann");
        assert_eq!(peer.presence, PresenceState::Online);
    }

    #[test]
    fn repeated_name_produces_no_notifications() {
        let mut client = logged_in();
        let name = CallbackEvent::NameChanged { peer: PeerId(1), name: "Ann".to_string() };

        let first = callback(&mut client, name.clone());
        let second = callback(&mut client, name);

        assert!(first.contains(&ClientAction::Notify(Notification::RosterChanged)));
        assert!(second.is_empty());
    }

    #[test]
    fn chat_from_unseen_peer_creates_peer_and_transcript() {
        let mut client = logged_in();

        let actions = callback(&mut client, chat(4, "hello"));

        assert!(client.roster().contains(PeerId(4)));
        assert_eq!(client.transcript(PeerId(4)).unwrap(), &[ChatMessage {
            sender: ChatSender::Peer(PeerId(4)),
            body: "hello".to_string(),
        }]);
        assert!(actions.iter().any(|action| matches!(
            action,
            ClientAction::Notify(Notification::TranscriptAppended { peer: PeerId(4), .. })
        )));
    }

    #[test]
    fn chat_is_routed_only_to_sender() {
        let mut client = logged_in();
        callback(&mut client, chat(1, "from one"));
        callback(&mut client, chat(2, "from two"));
        callback(&mut client, chat(1, "again"));

        assert_eq!(client.transcript(PeerId(1)).unwrap().len(), 2);
        assert_eq!(client.transcript(PeerId(2)).unwrap().len(), 1);
    }

    #[test]
    fn send_message_echoes_with_self_identity() {
        let mut client = logged_in();
        callback(&mut client, CallbackEvent::NameChanged {
            peer: PeerId(1),
            name: "Ann".to_string(),
        });

        let actions = client
            .handle(ClientEvent::SendMessage { peer: PeerId(1), body: "hi".to_string() })
            .unwrap();

        let transcript = client.transcript(PeerId(1)).unwrap();
        assert_eq!(transcript[0].sender, ChatSender::Local(SelfIdentity::new("Me")));
        assert!(actions.contains(&ClientAction::Transport(TransportRequest::SendChatMessage {
            peer: PeerId(1),
            body: "hi".to_string(),
        })));
    }

    #[test]
    fn send_to_unknown_peer_fails() {
        let mut client = logged_in();

        let result =
            client.handle(ClientEvent::SendMessage { peer: PeerId(9), body: "hi".to_string() });

        assert_eq!(result, Err(ClientError::UnknownPeer { peer: PeerId(9) }));
    }

    #[test]
    fn shared_avatar_is_downloaded_once() {
        let mut client = logged_in();

        let first = callback(&mut client, CallbackEvent::AvatarHashChanged {
            peer: PeerId(1),
            hash: HASH.to_vec(),
        });
        let second = callback(&mut client, CallbackEvent::AvatarHashChanged {
            peer: PeerId(2),
            hash: HASH.to_vec(),
        });

        let requested = fetches(&first);
        assert_eq!(requested.len(), 1);
        assert!(fetches(&second).is_empty());

        let key = requested[0].0.clone();
        assert!(requested[0].1.ends_with(&format!("/ab/{key}_medium.jpg")));

        let image = AvatarImage::from(vec![0xff, 0xd8, 0xff]);
        let actions = client
            .handle(ClientEvent::AvatarFetched { key: key.clone(), result: Ok(image.clone()) })
            .unwrap();

        assert_eq!(client.peer(PeerId(1)).unwrap().avatar_image, Some(image.clone()));
        assert_eq!(client.peer(PeerId(2)).unwrap().avatar_image, Some(image.clone()));
        assert!(actions.contains(&ClientAction::Notify(Notification::AvatarReady {
            peer: PeerId(2),
            image,
        })));
    }

    #[test]
    fn cached_avatar_is_attached_without_download() {
        let mut client = logged_in();
        let actions = callback(&mut client, CallbackEvent::AvatarHashChanged {
            peer: PeerId(1),
            hash: HASH.to_vec(),
        });
        let (key, _) = fetches(&actions).remove(0);
        client
            .handle(ClientEvent::AvatarFetched { key, result: Ok(AvatarImage::from(vec![1])) })
            .unwrap();

        let actions = callback(&mut client, CallbackEvent::AvatarHashChanged {
            peer: PeerId(2),
            hash: HASH.to_vec(),
        });

        assert!(fetches(&actions).is_empty());
        assert!(client.peer(PeerId(2)).unwrap().avatar_image.is_some());
    }

    #[test]
    fn failed_avatar_leaves_peer_without_image() {
        let mut client = logged_in();
        let actions = callback(&mut client, CallbackEvent::AvatarHashChanged {
            peer: PeerId(1),
            hash: HASH.to_vec(),
        });
        let (key, _) = fetches(&actions).remove(0);

        let actions = client
            .handle(ClientEvent::AvatarFetched {
                key: key.clone(),
                result: Err(AvatarFetchError { reason: "timed out".to_string() }),
            })
            .unwrap();

        assert!(actions.is_empty());
        assert_eq!(client.avatars().state(&key), AvatarEntryState::Failed);
        assert_eq!(client.peer(PeerId(1)).unwrap().avatar_image, None);
    }

    #[test]
    fn zero_hash_never_fetches() {
        let mut client = logged_in();

        let actions = callback(&mut client, CallbackEvent::AvatarHashChanged {
            peer: PeerId(1),
            hash: vec![0; 20],
        });

        assert!(fetches(&actions).is_empty());
        assert_eq!(client.peer(PeerId(1)).unwrap().avatar, None);
    }

    #[test]
    fn ordered_peers_follow_presence_and_activity() {
        let mut client = logged_in();
        for (id, name, state, activity) in [
            (3, "C", PresenceState::Offline, None),
            (2, "B", PresenceState::Online, None),
            (1, "A", PresenceState::Online, Some("Chess".to_string())),
        ] {
            callback(&mut client, CallbackEvent::NameChanged {
                peer: PeerId(id),
                name: name.to_string(),
            });
            callback(&mut client, CallbackEvent::PresenceChanged {
                peer: PeerId(id),
                state,
                activity,
            });
        }

        let order: Vec<_> = client.ordered_peers().map(|peer| peer.id.0).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
