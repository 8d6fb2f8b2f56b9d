//! Model roster, transcripts and avatar cache.

use std::collections::BTreeMap;

use parlor_core::{PresenceState, roster::UNKNOWN_NAME};

use super::operation::{OperationError, OperationResult};

/// Peer as observed through the display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPeer {
    /// Peer id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Presence.
    pub presence: PresenceState,
    /// Activity, never empty.
    pub activity: Option<String>,
    /// Avatar cache key.
    pub avatar: Option<String>,
    /// Whether an image is attached.
    pub has_image: bool,
}

impl ModelPeer {
    fn new(id: u64) -> Self {
        Self {
            id,
            name: UNKNOWN_NAME.to_string(),
            presence: PresenceState::Offline,
            activity: None,
            avatar: None,
            has_image: false,
        }
    }

    /// Display order: active, then online, then name, then id.
    fn sort_key(&self) -> (bool, bool, &str, u64) {
        let online = self.presence != PresenceState::Offline;
        let active = online && self.activity.is_some();
        (!active, !online, self.name.as_str(), self.id)
    }
}

/// Transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Written by the local user.
    pub local: bool,
    /// Text.
    pub body: String,
}

#[derive(Debug, Clone)]
enum ModelAvatar {
    InFlight(Vec<u64>),
    Ready,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ModelRoster {
    peers: BTreeMap<u64, ModelPeer>,
    transcripts: BTreeMap<u64, Vec<ModelMessage>>,
    avatars: BTreeMap<String, ModelAvatar>,
    fetches: usize,
}

impl ModelRoster {
    fn peer_mut(&mut self, id: u64) -> &mut ModelPeer {
        self.transcripts.entry(id).or_default();
        self.peers.entry(id).or_insert_with(|| ModelPeer::new(id))
    }

    pub(crate) fn set_name(&mut self, id: u64, name: &str) {
        let peer = self.peer_mut(id);
        if !name.is_empty() {
            peer.name = name.to_string();
        }
    }

    pub(crate) fn set_presence(
        &mut self,
        id: u64,
        presence: PresenceState,
        activity: Option<String>,
    ) {
        let peer = self.peer_mut(id);
        peer.presence = presence;
        peer.activity = activity.filter(|activity| !activity.is_empty());
    }

    pub(crate) fn set_avatar(&mut self, id: u64, key: Option<String>) {
        let peer = self.peer_mut(id);
        if peer.avatar == key {
            return;
        }
        peer.avatar.clone_from(&key);
        peer.has_image = false;

        let Some(key) = key else {
            return;
        };
        match self.avatars.get_mut(&key) {
            Some(ModelAvatar::Ready) => {
                if let Some(peer) = self.peers.get_mut(&id) {
                    peer.has_image = true;
                }
            },
            Some(ModelAvatar::Failed) => {},
            Some(ModelAvatar::InFlight(waiters)) => {
                if !waiters.contains(&id) {
                    waiters.push(id);
                }
            },
            None => {
                self.avatars.insert(key, ModelAvatar::InFlight(vec![id]));
                self.fetches += 1;
            },
        }
    }

    pub(crate) fn avatar_fetched(&mut self, key: &str, ok: bool) {
        let Some(ModelAvatar::InFlight(waiters)) = self.avatars.get(key).cloned() else {
            return;
        };
        self.avatars
            .insert(key.to_string(), if ok { ModelAvatar::Ready } else { ModelAvatar::Failed });
        if !ok {
            return;
        }

        for id in waiters {
            if let Some(peer) = self.peers.get_mut(&id) {
                if peer.avatar.as_deref() == Some(key) {
                    peer.has_image = true;
                }
            }
        }
    }

    pub(crate) fn receive(&mut self, id: u64, body: String, typing: bool) {
        self.peer_mut(id);
        if !typing {
            self.transcripts.entry(id).or_default().push(ModelMessage { local: false, body });
        }
    }

    pub(crate) fn send(&mut self, id: u64, body: String) -> OperationResult {
        match self.transcripts.get_mut(&id) {
            Some(transcript) => {
                transcript.push(ModelMessage { local: true, body });
                OperationResult::Ok
            },
            None => OperationResult::Error(OperationError::UnknownPeer),
        }
    }

    pub(crate) fn ordered(&self) -> Vec<ModelPeer> {
        let mut peers: Vec<_> = self.peers.values().collect();
        peers.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        peers.into_iter().cloned().collect()
    }

    pub(crate) fn transcripts(&self) -> Vec<(u64, Vec<ModelMessage>)> {
        self.transcripts.iter().map(|(id, messages)| (*id, messages.clone())).collect()
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches
    }
}
