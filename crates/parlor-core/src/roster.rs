//! Roster of known peers and its display ordering.
//!
//! Peers are created the first time any callback references them and are
//! never removed for the life of a session. The roster keeps a sorted order
//! that is recomputed after every change, so [`Roster::ordered_view`] is a
//! plain iteration.
//!
//! # Ordering
//!
//! Tiers are evaluated in sequence, most significant first:
//!
//! 1. Active peers (non-empty activity, not offline) before inactive ones
//! 2. Online (any non-offline state) before offline
//! 3. Display name, case-sensitive lexicographic
//! 4. Peer id, so equal names still order deterministically

use std::{cmp::Ordering, collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    avatar::{AvatarImage, AvatarRef},
    peer::PeerSession,
};

/// Display name of a peer whose name has not been resolved yet.
pub const UNKNOWN_NAME: &str = "[Unknown]";

/// Stable account identifier of a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse availability of a peer (or of the local user).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum PresenceState {
    /// Not signed in.
    #[default]
    Offline = 0,
    /// Available.
    Online = 1,
    /// Do not disturb.
    Busy = 2,
    /// Away from keyboard.
    Away = 3,
    /// Away for an extended period.
    Snooze = 4,
    /// Looking to trade.
    LookingToTrade = 5,
    /// Looking to play.
    LookingToPlay = 6,
}

impl PresenceState {
    /// Every state except [`PresenceState::Offline`].
    pub fn is_online(self) -> bool {
        self != Self::Offline
    }
}

/// Metadata of one remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Stable identifier.
    pub id: PeerId,
    /// Display name, [`UNKNOWN_NAME`] until resolved.
    pub display_name: String,
    /// Current presence.
    pub presence: PresenceState,
    /// Activity the peer is in. Never `Some("")`.
    pub activity: Option<String>,
    /// Avatar content reference, `None` until resolved or when the peer has
    /// no avatar.
    pub avatar: Option<AvatarRef>,
    /// Fetched avatar image.
    pub avatar_image: Option<AvatarImage>,
}

impl Peer {
    /// New peer with nothing resolved.
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            display_name: UNKNOWN_NAME.to_string(),
            presence: PresenceState::Offline,
            activity: None,
            avatar: None,
            avatar_image: None,
        }
    }

    /// In an activity and not offline.
    pub fn is_active(&self) -> bool {
        self.activity.is_some() && self.presence.is_online()
    }

    /// Whether a real display name has been received.
    pub fn has_name(&self) -> bool {
        self.display_name != UNKNOWN_NAME
    }

    /// Apply a partial update, returning what changed.
    fn apply(&mut self, patch: PeerPatch) -> PatchEffect {
        let mut effect = PatchEffect::default();

        if let Some(name) = patch.name.filter(|name| !name.is_empty()) {
            if self.display_name != name {
                self.display_name = name;
                effect.changed = true;
            }
        }

        if let Some(presence) = patch.presence {
            if self.presence != presence {
                self.presence = presence;
                effect.changed = true;
            }
        }

        if let Some(activity) = patch.activity {
            let activity = activity.filter(|name| !name.is_empty());
            if self.activity != activity {
                self.activity = activity;
                effect.changed = true;
            }
        }

        if let Some(avatar) = patch.avatar {
            if self.avatar != avatar {
                self.avatar = avatar;
                self.avatar_image = None;
                effect.changed = true;
                effect.avatar_changed = true;
            }
        }

        effect
    }
}

/// Partial metadata update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerPatch {
    /// New display name. Empty names are ignored.
    pub name: Option<String>,
    /// New presence state.
    pub presence: Option<PresenceState>,
    /// New activity (`Some(None)` clears it).
    pub activity: Option<Option<String>>,
    /// New avatar reference (`Some(None)` clears it).
    pub avatar: Option<Option<AvatarRef>>,
}

impl PeerPatch {
    /// Patch that only sets the display name.
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    /// Patch that sets presence and activity together.
    pub fn presence(state: PresenceState, activity: Option<String>) -> Self {
        Self { presence: Some(state), activity: Some(activity), ..Self::default() }
    }

    /// Patch that sets the avatar reference.
    pub fn avatar(avatar: Option<AvatarRef>) -> Self {
        Self { avatar: Some(avatar), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PatchEffect {
    changed: bool,
    avatar_changed: bool,
}

/// Result of [`Roster::upsert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Upsert {
    /// The peer was not known before.
    pub created: bool,
    /// Some metadata field changed value.
    pub changed: bool,
    /// The avatar reference changed (cached image was dropped).
    pub avatar_changed: bool,
}

/// Compare two peers for display order.
pub fn compare_peers(a: &Peer, b: &Peer) -> Ordering {
    b.is_active()
        .cmp(&a.is_active())
        .then_with(|| b.presence.is_online().cmp(&a.presence.is_online()))
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Set of known peers, each with its session.
#[derive(Debug, Default)]
pub struct Roster {
    sessions: HashMap<PeerId, PeerSession>,
    /// Display order, re-sorted on every change.
    order: Vec<PeerId>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No peer has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether `id` is known.
    pub fn contains(&self, id: PeerId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Metadata of a peer.
    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.sessions.get(&id).map(PeerSession::peer)
    }

    /// Session of a peer.
    pub fn session(&self, id: PeerId) -> Option<&PeerSession> {
        self.sessions.get(&id)
    }

    /// Mutable session of a peer.
    pub fn session_mut(&mut self, id: PeerId) -> Option<&mut PeerSession> {
        self.sessions.get_mut(&id)
    }

    /// Apply `patch` to a peer, creating it if unseen.
    pub fn upsert(&mut self, id: PeerId, patch: PeerPatch) -> Upsert {
        let created = !self.sessions.contains_key(&id);
        let session = self.sessions.entry(id).or_insert_with(|| PeerSession::new(id));
        let effect = session.peer_mut().apply(patch);

        if created {
            self.order.push(id);
        }
        if created || effect.changed {
            self.resort();
        }

        Upsert { created, changed: effect.changed, avatar_changed: effect.avatar_changed }
    }

    /// Peers in display order.
    pub fn ordered_view(&self) -> impl Iterator<Item = &Peer> + '_ {
        self.order.iter().filter_map(|id| self.peer(*id))
    }

    /// Owned copy of the ordered view.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.ordered_view().cloned().collect()
    }

    fn resort(&mut self) {
        let sessions = &self.sessions;
        self.order.sort_by(|a, b| match (sessions.get(a), sessions.get(b)) {
            (Some(a), Some(b)) => compare_peers(a.peer(), b.peer()),
            _ => a.cmp(b),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ids(roster: &Roster) -> Vec<u64> {
        roster.ordered_view().map(|peer| peer.id.0).collect()
    }

    #[test]
    fn unseen_peer_is_created_once() {
        let mut roster = Roster::new();

        let first = roster.upsert(PeerId(1), PeerPatch::presence(PresenceState::Online, None));
        let second = roster.upsert(PeerId(1), PeerPatch::name("Ann"));

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.peer(PeerId(1)).unwrap().display_name, "Ann");
        assert_eq!(roster.peer(PeerId(1)).unwrap().presence, PresenceState::Online);
    }

    #[test]
    fn new_peer_has_unknown_name() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(3), PeerPatch::default());

        let peer = roster.peer(PeerId(3)).unwrap();
        assert_eq!(peer.display_name, UNKNOWN_NAME);
        assert!(!peer.has_name());
    }

    #[test]
    fn same_name_twice_is_idempotent() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::name("Ann"));
        let before = roster.snapshot();

        let outcome = roster.upsert(PeerId(1), PeerPatch::name("Ann"));

        assert!(!outcome.changed);
        assert_eq!(roster.snapshot(), before);
    }

    #[test]
    fn empty_name_does_not_replace_resolved_name() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::name("Ann"));
        let outcome = roster.upsert(PeerId(1), PeerPatch::name(""));

        assert!(!outcome.changed);
        assert_eq!(roster.peer(PeerId(1)).unwrap().display_name, "Ann");
    }

    #[test]
    fn empty_activity_is_not_active() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::presence(PresenceState::Online, Some(String::new())));

        let peer = roster.peer(PeerId(1)).unwrap();
        assert_eq!(peer.activity, None);
        assert!(!peer.is_active());
    }

    #[test]
    fn active_then_online_then_offline() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(3), PeerPatch::name("C"));
        roster.upsert(PeerId(2), PeerPatch::presence(PresenceState::Online, None));
        roster.upsert(PeerId(2), PeerPatch::name("B"));
        roster.upsert(PeerId(1), PeerPatch::presence(PresenceState::Online, Some("Chess".into())));
        roster.upsert(PeerId(1), PeerPatch::name("A"));

        assert_eq!(ids(&roster), vec![1, 2, 3]);
    }

    #[test]
    fn names_break_ties() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::presence(PresenceState::Online, None));
        roster.upsert(PeerId(1), PeerPatch::name("Zed"));
        roster.upsert(PeerId(2), PeerPatch::presence(PresenceState::Online, None));
        roster.upsert(PeerId(2), PeerPatch::name("Ann"));

        assert_eq!(ids(&roster), vec![2, 1]);
    }

    #[test]
    fn names_compare_case_sensitively() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::name("ann"));
        roster.upsert(PeerId(2), PeerPatch::name("Bob"));

        // Uppercase sorts before lowercase.
        assert_eq!(ids(&roster), vec![2, 1]);
    }

    #[test]
    fn offline_peer_in_activity_is_not_active() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::presence(PresenceState::Offline, Some("Chess".into())));
        roster.upsert(PeerId(1), PeerPatch::name("A"));
        roster.upsert(PeerId(2), PeerPatch::presence(PresenceState::Away, None));
        roster.upsert(PeerId(2), PeerPatch::name("B"));

        assert_eq!(ids(&roster), vec![2, 1]);
    }

    #[test]
    fn presence_change_resorts() {
        let mut roster = Roster::new();
        roster.upsert(PeerId(1), PeerPatch::name("A"));
        roster.upsert(PeerId(2), PeerPatch::name("B"));
        assert_eq!(ids(&roster), vec![1, 2]);

        roster.upsert(PeerId(2), PeerPatch::presence(PresenceState::Busy, None));
        assert_eq!(ids(&roster), vec![2, 1]);
    }

    #[test]
    fn avatar_change_drops_cached_image() {
        let mut roster = Roster::new();
        let first = AvatarRef::from_hash(&[1; 20]);
        roster.upsert(PeerId(1), PeerPatch::avatar(first));
        roster.session_mut(PeerId(1)).unwrap().peer_mut().avatar_image =
            Some(AvatarImage::from(vec![1, 2, 3]));

        let outcome = roster.upsert(PeerId(1), PeerPatch::avatar(AvatarRef::from_hash(&[2; 20])));

        assert!(outcome.avatar_changed);
        assert_eq!(roster.peer(PeerId(1)).unwrap().avatar_image, None);
    }

    fn presence_strategy() -> impl Strategy<Value = PresenceState> {
        prop_oneof![
            Just(PresenceState::Offline),
            Just(PresenceState::Online),
            Just(PresenceState::Busy),
            Just(PresenceState::Away),
            Just(PresenceState::Snooze),
        ]
    }

    fn peer_strategy() -> impl Strategy<Value = Peer> {
        (
            0u64..8,
            "[a-cA-C]{0,2}",
            presence_strategy(),
            proptest::option::of("[x-z]{0,1}"),
        )
            .prop_map(|(id, name, presence, activity)| {
                let mut peer = Peer::new(PeerId(id));
                peer.display_name = name;
                peer.presence = presence;
                peer.activity = activity.filter(|a| !a.is_empty());
                peer
            })
    }

    proptest! {
        /// The comparator is a strict total order: antisymmetric and transitive.
        #[test]
        fn prop_compare_is_total_order(
            a in peer_strategy(),
            b in peer_strategy(),
            c in peer_strategy(),
        ) {
            prop_assert_eq!(compare_peers(&a, &b), compare_peers(&b, &a).reverse());

            if compare_peers(&a, &b) != Ordering::Greater
                && compare_peers(&b, &c) != Ordering::Greater
            {
                prop_assert_ne!(compare_peers(&a, &c), Ordering::Greater);
            }
        }
    }
}
