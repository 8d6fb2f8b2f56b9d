//! Transport seam.
//!
//! The wire protocol lives behind [`Transport`]. The runtime only calls these
//! methods; callbacks flow the other way through a
//! [`CallbackSink`](crate::CallbackSink).

use async_trait::async_trait;
use bytes::Bytes;
use parlor_core::{Credentials, PeerId, PresenceState, TransportRequest};
use thiserror::Error;

/// Transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service connection is not available.
    #[error("not connected")]
    NotConnected,

    /// The request could not be completed.
    #[error("{operation} failed: {reason}")]
    Failed {
        /// Request that failed.
        operation: &'static str,
        /// Description of the failure.
        reason: String,
    },
}

/// Imperative calls into the presence service.
///
/// Implementations must not call back into the runtime synchronously; all
/// callbacks go through the callback sink.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection for this account.
    async fn connect(
        &self,
        credentials: Credentials,
        auth_code: Option<String>,
    ) -> Result<(), TransportError>;

    /// Log on over the established connection.
    async fn log_on(
        &self,
        credentials: Credentials,
        auth_code: Option<String>,
    ) -> Result<(), TransportError>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Enable or disable automatic reconnect.
    async fn set_auto_reconnect(&self, enabled: bool) -> Result<(), TransportError>;

    /// Publish the local user's presence.
    async fn set_presence(&self, state: PresenceState) -> Result<(), TransportError>;

    /// Send a chat message. Delivery is not acknowledged.
    async fn send_chat_message(&self, peer: PeerId, body: String) -> Result<(), TransportError>;

    /// Download an avatar image.
    async fn fetch_avatar(&self, uri: String) -> Result<Bytes, TransportError>;
}

/// Short name of a request, for logs.
pub(crate) fn operation(request: &TransportRequest) -> &'static str {
    match request {
        TransportRequest::Connect { .. } => "connect",
        TransportRequest::LogOn { .. } => "log on",
        TransportRequest::Disconnect => "disconnect",
        TransportRequest::SetAutoReconnect { .. } => "set auto reconnect",
        TransportRequest::SetPresence { .. } => "set presence",
        TransportRequest::SendChatMessage { .. } => "send chat message",
        TransportRequest::FetchAvatar { .. } => "fetch avatar",
    }
}
