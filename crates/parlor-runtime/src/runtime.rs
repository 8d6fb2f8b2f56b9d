//! Event task driving a [`Client`].
//!
//! ```text
//!  CallbackSink ─┐                       ┌─▶ broadcast<Notification>
//!  RuntimeHandle ┼─▶ mpsc<Command> ─▶ event task ─▶ watch<SessionState>
//!  avatar tasks ─┘                       └─▶ transport worker ─▶ Transport
//! ```
//!
//! The event task is the only owner of the `Client`, so callbacks, user
//! intents and avatar completions are applied one at a time. Transport
//! requests go to a worker task that performs them in emission order; each
//! avatar download runs on its own task and reports back as a command.

use std::sync::Arc;

use parlor_core::{
    AvatarFetchError, AvatarImage, CallbackEvent, ChatMessage, Client, ClientAction, ClientConfig,
    ClientError, ClientEvent, Credentials, Notification, Peer, PeerId, PresenceState,
    SessionState, TransportRequest,
};
use tokio::{
    sync::{
        broadcast,
        mpsc::{self, error::TrySendError},
        oneshot, watch,
    },
    task::JoinHandle,
};

use crate::{
    error::RuntimeError,
    transport::{self, Transport},
};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Engine configuration.
    pub client: ClientConfig,
    /// Capacity of the command queue feeding the event task.
    pub command_capacity: usize,
    /// Notifications buffered per subscriber before it starts lagging.
    pub notification_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { client: ClientConfig::default(), command_capacity: 256, notification_capacity: 1024 }
    }
}

#[derive(Debug)]
enum Command {
    Callback(CallbackEvent),
    Intent { event: ClientEvent, reply: oneshot::Sender<Result<(), ClientError>> },
    AvatarFetched { key: String, result: Result<AvatarImage, AvatarFetchError> },
    Roster { reply: oneshot::Sender<Vec<Peer>> },
    Transcript { peer: PeerId, reply: oneshot::Sender<Option<Vec<ChatMessage>>> },
    Shutdown,
}

/// Owner of the engine on the event task.
pub struct Runtime {
    client: Client,
    commands: mpsc::Receiver<Command>,
    requests: mpsc::UnboundedSender<TransportRequest>,
    notifications: broadcast::Sender<Notification>,
    session: watch::Sender<SessionState>,
}

impl Runtime {
    /// Start the event task and the transport worker.
    ///
    /// The event task stops when [`RuntimeHandle::shutdown`] is called or
    /// every handle and callback sink has been dropped.
    pub fn spawn<T: Transport>(
        config: RuntimeConfig,
        transport: Arc<T>,
    ) -> (RuntimeHandle, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        let (session, session_rx) = watch::channel(SessionState::Disconnected);
        let (requests, request_rx) = mpsc::unbounded_channel();

        tokio::spawn(drive_transport(transport, request_rx, command_tx.downgrade()));

        let runtime = Self {
            client: Client::new(config.client),
            commands,
            requests,
            notifications: notifications.clone(),
            session,
        };
        let task = tokio::spawn(runtime.run());

        (RuntimeHandle { commands: command_tx, notifications, session: session_rx }, task)
    }

    async fn run(mut self) {
        tracing::debug!("event task started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Callback(event) => {
                    self.client.publish(event);
                    let actions = self.client.process_callbacks();
                    self.execute(actions);
                },
                Command::Intent { event, reply } => {
                    let result = self.client.handle(event).map(|actions| self.execute(actions));
                    if reply.send(result).is_err() {
                        tracing::trace!("intent caller went away");
                    }
                },
                Command::AvatarFetched { key, result } => {
                    match self.client.handle(ClientEvent::AvatarFetched { key, result }) {
                        Ok(actions) => self.execute(actions),
                        Err(error) => tracing::warn!(%error, "avatar completion rejected"),
                    }
                },
                Command::Roster { reply } => {
                    let _ = reply.send(self.client.roster().snapshot());
                },
                Command::Transcript { peer, reply } => {
                    let _ = reply.send(self.client.transcript(peer).map(<[ChatMessage]>::to_vec));
                },
                Command::Shutdown => break,
            }
        }

        tracing::debug!("event task stopped");
    }

    fn execute(&self, actions: Vec<ClientAction>) {
        for action in actions {
            match action {
                ClientAction::Transport(request) => {
                    if self.requests.send(request).is_err() {
                        tracing::warn!("transport worker stopped, dropping request");
                    }
                },
                ClientAction::Notify(notification) => {
                    if let Notification::SessionStateChanged(state) = &notification {
                        tracing::debug!(%state, "session state changed");
                        self.session.send_replace(state.clone());
                    }
                    // No subscribers is not an error.
                    let _ = self.notifications.send(notification);
                },
            }
        }
    }
}

/// Perform transport requests in order. Avatar downloads run concurrently.
async fn drive_transport<T: Transport>(
    transport: Arc<T>,
    mut requests: mpsc::UnboundedReceiver<TransportRequest>,
    completions: mpsc::WeakSender<Command>,
) {
    while let Some(request) = requests.recv().await {
        let operation = transport::operation(&request);
        let outcome = match request {
            TransportRequest::Connect { credentials, auth_code } => {
                transport.connect(credentials, auth_code).await
            },
            TransportRequest::LogOn { credentials, auth_code } => {
                transport.log_on(credentials, auth_code).await
            },
            TransportRequest::Disconnect => transport.disconnect().await,
            TransportRequest::SetAutoReconnect { enabled } => {
                transport.set_auto_reconnect(enabled).await
            },
            TransportRequest::SetPresence { state } => transport.set_presence(state).await,
            TransportRequest::SendChatMessage { peer, body } => {
                transport.send_chat_message(peer, body).await
            },
            TransportRequest::FetchAvatar { key, uri } => {
                tokio::spawn(fetch_avatar(Arc::clone(&transport), key, uri, completions.clone()));
                Ok(())
            },
        };

        if let Err(error) = outcome {
            tracing::warn!(operation, %error, "transport request failed");
        }
    }
}

async fn fetch_avatar<T: Transport>(
    transport: Arc<T>,
    key: String,
    uri: String,
    completions: mpsc::WeakSender<Command>,
) {
    let result = transport
        .fetch_avatar(uri)
        .await
        .map(AvatarImage::from)
        .map_err(|error| AvatarFetchError { reason: error.to_string() });

    let Some(commands) = completions.upgrade() else {
        tracing::trace!(%key, "runtime stopped before avatar arrived");
        return;
    };
    if commands.send(Command::AvatarFetched { key, result }).await.is_err() {
        tracing::trace!("runtime stopped before avatar arrived");
    }
}

/// Entry point for transport callbacks.
#[derive(Debug, Clone)]
pub struct CallbackSink {
    commands: mpsc::Sender<Command>,
}

impl CallbackSink {
    /// Queue a callback, waiting for room in the command queue.
    pub async fn push(&self, event: CallbackEvent) -> Result<(), RuntimeError> {
        self.commands.send(Command::Callback(event)).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Queue a callback without waiting. For transports that call back from
    /// synchronous code.
    pub fn try_push(&self, event: CallbackEvent) -> Result<(), RuntimeError> {
        self.commands.try_send(Command::Callback(event)).map_err(|error| match error {
            TrySendError::Full(_) => RuntimeError::Busy,
            TrySendError::Closed(_) => RuntimeError::Stopped,
        })
    }
}

/// Handle for display collaborators and user intents.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    notifications: broadcast::Sender<Notification>,
    session: watch::Receiver<SessionState>,
}

impl RuntimeHandle {
    /// Sink the transport pushes callbacks into.
    pub fn callbacks(&self) -> CallbackSink {
        CallbackSink { commands: self.commands.clone() }
    }

    /// Subscribe to change notifications emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Watch the session state.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.clone()
    }

    /// Start a login.
    pub async fn connect(&self, credentials: Credentials) -> Result<(), RuntimeError> {
        self.intent(ClientEvent::Connect { credentials }).await
    }

    /// Log off and stop reconnecting.
    pub async fn disconnect(&self) -> Result<(), RuntimeError> {
        self.intent(ClientEvent::Disconnect).await
    }

    /// Answer an auth code prompt.
    pub async fn submit_auth_code(&self, code: impl Into<String>) -> Result<(), RuntimeError> {
        self.intent(ClientEvent::SubmitAuthCode { code: code.into() }).await
    }

    /// Change the local user's presence.
    pub async fn set_presence(&self, state: PresenceState) -> Result<(), RuntimeError> {
        self.intent(ClientEvent::SetPresence { state }).await
    }

    /// Send a chat message to a known peer.
    pub async fn send_message(
        &self,
        peer: PeerId,
        body: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.intent(ClientEvent::SendMessage { peer, body: body.into() }).await
    }

    /// Peers in display order.
    pub async fn roster(&self) -> Result<Vec<Peer>, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Roster { reply }).await?;
        response.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Transcript of one peer, `None` if the peer is unknown.
    pub async fn transcript(&self, peer: PeerId) -> Result<Option<Vec<ChatMessage>>, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Transcript { peer, reply }).await?;
        response.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Stop the event task after the commands already queued.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(Command::Shutdown).await
    }

    async fn intent(&self, event: ClientEvent) -> Result<(), RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Intent { event, reply }).await?;
        Ok(response.await.map_err(|_| RuntimeError::Stopped)??)
    }

    async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands.send(command).await.map_err(|_| RuntimeError::Stopped)
    }
}
