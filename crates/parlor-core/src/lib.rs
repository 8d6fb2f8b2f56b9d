//! Parlor core
//!
//! Action-based engine for a presence/chat client. Turns the asynchronous
//! callback stream of a presence service into a login state machine and a
//! live, sorted roster of peers with chat transcripts and lazily fetched
//! avatars.
//!
//! # Architecture
//!
//! The engine is a pure state machine that:
//! - Receives events from the caller (transport callbacks, user intents,
//!   avatar download completions)
//! - Produces actions for the caller to execute (transport requests and
//!   display notifications)
//! - Performs no I/O of its own
//!
//! # Components
//!
//! - [`CallbackBus`]: Routes callbacks to subscribers by kind and sender
//! - [`SessionController`]: Connection and login state machine
//! - [`Roster`]: Known peers and their display order
//! - [`PeerSession`]: Per-peer metadata and chat transcript
//! - [`AvatarCache`]: Avatar downloads, at most one per content hash
//! - [`Client`]: Wires the above together

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod avatar;
pub mod bus;
pub mod callback;
mod client;
pub mod config;
mod error;
mod event;
pub mod peer;
pub mod roster;
pub mod session;

pub use avatar::{AvatarCache, AvatarEntryState, AvatarFetchError, AvatarImage, AvatarRef};
pub use bus::{CallbackBus, DeliveryReport, Registrar};
pub use callback::{CallbackEvent, ChatEntryKind, EventKind, ResultCode};
pub use client::{Client, Route};
pub use config::{ClientConfig, RetryPolicy};
pub use error::{ClientError, HandlerError, SessionError};
pub use event::{
    ClientAction, ClientEvent, ConnectProgress, ConnectStage, Notification, TransportRequest,
};
pub use peer::{ChatMessage, ChatSender, PeerSession, SelfIdentity};
pub use roster::{Peer, PeerId, PeerPatch, PresenceState, Roster};
pub use session::{AuthCodeReason, Credentials, FatalReason, SessionController, SessionState};
