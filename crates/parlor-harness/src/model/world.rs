//! Model world: session plus roster.
//!
//! The world is the top-level container that applies operations to the
//! model. It's the oracle the real engine is verified against.

use super::{
    operation::{self, Operation, OperationResult},
    roster::{ModelMessage, ModelPeer, ModelRoster},
    session::ModelSession,
};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Session state.
    pub session: ModelSession,
    /// Roster in display order.
    pub roster: Vec<ModelPeer>,
    /// Transcript per peer, by ascending peer id.
    pub transcripts: Vec<(u64, Vec<ModelMessage>)>,
    /// Avatar downloads started so far.
    pub avatar_fetches: usize,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    session: ModelSession,
    roster: ModelRoster,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// Disconnected world with an empty roster.
    pub fn new() -> Self {
        Self { session: ModelSession::Disconnected, roster: ModelRoster::default() }
    }

    /// Current session state.
    pub fn session(&self) -> ModelSession {
        self.session
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real engine's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Connect => self.session.connect(),
            Operation::Disconnect => {
                self.session.disconnect();
                OperationResult::Ok
            },
            Operation::SubmitAuthCode { empty } => self.session.submit_auth_code(*empty),
            Operation::SetPresence { .. } => self.session.set_presence(),
            Operation::SendMessage { peer, body } => {
                self.roster.send(u64::from(*peer), operation::message_body(*body))
            },
            Operation::ConnectionEstablished => OperationResult::Ok,
            Operation::ConnectionRetrying { count } => {
                self.session.retry(*count);
                OperationResult::Ok
            },
            Operation::LoginResult { outcome } => {
                self.session.login_result(*outcome);
                OperationResult::Ok
            },
            Operation::LoggedOff { protocol_mismatch } => {
                self.session.logged_off(*protocol_mismatch);
                OperationResult::Ok
            },
            Operation::Presence { peer, state, activity } => {
                self.roster.set_presence(
                    u64::from(*peer),
                    operation::presence_state(*state),
                    operation::activity(*activity),
                );
                OperationResult::Ok
            },
            Operation::Name { peer, name } => {
                self.roster.set_name(u64::from(*peer), operation::display_name(*name));
                OperationResult::Ok
            },
            Operation::Avatar { peer, hash } => {
                let key = (*hash != 0).then(|| operation::avatar_key(*hash));
                self.roster.set_avatar(u64::from(*peer), key);
                OperationResult::Ok
            },
            Operation::ChatReceived { peer, body, typing } => {
                self.roster.receive(u64::from(*peer), operation::message_body(*body), *typing);
                OperationResult::Ok
            },
            Operation::AvatarFetched { hash, ok } => {
                self.roster.avatar_fetched(&operation::avatar_key(*hash), *ok);
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            session: self.session,
            roster: self.roster.ordered(),
            transcripts: self.roster.transcripts(),
            avatar_fetches: self.roster.fetches(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::operation::{LoginOutcome, OperationError};

    #[test]
    fn login_then_fatal_then_reconnect() {
        let mut world = ModelWorld::new();

        assert!(world.apply(&Operation::Connect).is_ok());
        world.apply(&Operation::LoginResult { outcome: LoginOutcome::InvalidPassword });
        assert_eq!(world.session(), ModelSession::Failed);

        assert!(world.apply(&Operation::Connect).is_ok());
        assert_eq!(world.session(), ModelSession::Connecting(0));
    }

    #[test]
    fn send_requires_known_peer() {
        let mut world = ModelWorld::new();

        assert_eq!(
            world.apply(&Operation::SendMessage { peer: 1, body: 0 }),
            OperationResult::Error(OperationError::UnknownPeer)
        );

        world.apply(&Operation::ChatReceived { peer: 1, body: 0, typing: true });
        assert!(world.apply(&Operation::SendMessage { peer: 1, body: 0 }).is_ok());
    }

    #[test]
    fn shared_avatar_counts_one_fetch() {
        let mut world = ModelWorld::new();
        world.apply(&Operation::Avatar { peer: 1, hash: 9 });
        world.apply(&Operation::Avatar { peer: 2, hash: 9 });
        world.apply(&Operation::AvatarFetched { hash: 9, ok: true });

        let state = world.observable_state();
        assert_eq!(state.avatar_fetches, 1);
        assert!(state.roster.iter().all(|peer| peer.has_image));
    }
}
