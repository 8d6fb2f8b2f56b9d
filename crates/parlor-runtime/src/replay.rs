//! Callback traces.
//!
//! A trace is a CBOR document holding a version and the callback events in
//! arrival order. Replaying one runs the events through a fresh engine with
//! no transport attached: transport requests are only counted, and avatar
//! downloads never complete.

use std::io::{Read, Write};

use parlor_core::{
    CallbackEvent, Client, ClientAction, ClientConfig, ClientEvent, Credentials, Notification,
    Peer, SessionState, TransportRequest,
};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// Trace format version written by this build.
pub const TRACE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Trace {
    version: u32,
    events: Vec<CallbackEvent>,
}

/// Encode `events` as a trace.
pub fn write_trace<W: Write>(writer: W, events: &[CallbackEvent]) -> Result<(), ReplayError> {
    let trace = Trace { version: TRACE_VERSION, events: events.to_vec() };
    ciborium::ser::into_writer(&trace, writer)
        .map_err(|error| ReplayError::Encode { reason: error.to_string() })
}

/// Decode a trace.
pub fn read_trace<R: Read>(reader: R) -> Result<Vec<CallbackEvent>, ReplayError> {
    let trace: Trace = ciborium::de::from_reader(reader)
        .map_err(|error| ReplayError::Decode { reason: error.to_string() })?;

    if trace.version != TRACE_VERSION {
        return Err(ReplayError::UnsupportedVersion {
            found: trace.version,
            expected: TRACE_VERSION,
        });
    }
    Ok(trace.events)
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Session state after the last event.
    pub state: SessionState,
    /// Roster in display order.
    pub roster: Vec<Peer>,
    /// Events replayed.
    pub events: usize,
    /// Transport requests the engine issued.
    pub requests: usize,
    /// Avatar downloads the engine started.
    pub avatar_fetches: usize,
    /// Messages appended to transcripts.
    pub messages: usize,
}

/// Run `events` through a fresh engine.
///
/// With `credentials`, a connect is issued first so login callbacks in the
/// trace drive the session state machine.
pub fn replay(
    config: ClientConfig,
    credentials: Option<Credentials>,
    events: Vec<CallbackEvent>,
) -> Result<ReplaySummary, ReplayError> {
    let mut client = Client::new(config);
    let mut summary = ReplaySummary {
        state: SessionState::Disconnected,
        roster: Vec::new(),
        events: events.len(),
        requests: 0,
        avatar_fetches: 0,
        messages: 0,
    };

    if let Some(credentials) = credentials {
        let actions = client.handle(ClientEvent::Connect { credentials })?;
        tally(&mut summary, &actions);
    }

    for event in events {
        tracing::trace!(kind = ?event.kind(), "replaying callback");
        let actions = client.handle(ClientEvent::Callback(event))?;
        tally(&mut summary, &actions);
    }

    summary.state = client.session_state().clone();
    summary.roster = client.roster().snapshot();
    Ok(summary)
}

fn tally(summary: &mut ReplaySummary, actions: &[ClientAction]) {
    for action in actions {
        match action {
            ClientAction::Transport(TransportRequest::FetchAvatar { .. }) => {
                summary.requests += 1;
                summary.avatar_fetches += 1;
            },
            ClientAction::Transport(_) => summary.requests += 1,
            ClientAction::Notify(Notification::TranscriptAppended { .. }) => summary.messages += 1,
            ClientAction::Notify(_) => {},
        }
    }
}
