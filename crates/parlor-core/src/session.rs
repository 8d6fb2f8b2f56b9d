//! Session state machine.
//!
//! Owns the connection/login lifecycle. Transitions are driven by user
//! intents (`connect`, `disconnect`, `submit_auth_code`) and by transport
//! callbacks. Every transition is reported with exactly one
//! [`Notification::SessionStateChanged`], and the transport requests it needs
//! are returned from the same call.
//!
//! ```text
//!                 connect                 LoginResult(Ok)
//! Disconnected ───────────▶ Connecting(n) ─────────────────▶ LoggedIn
//!      ▲                      │  ▲   ▲                          │
//!      │          LogonDenied │  │   │ submit_auth_code(code)   │ retry
//!      │                      ▼  │   │                          │
//!      │               AwaitingAuthCode ◀─ empty code           ▼
//!      │ disconnect                                       Connecting(1)
//!      │ (any state)                         LoggedOff (other codes): Connecting(0)
//!      │                InvalidPassword / LoggedInElsewhere /
//!      └── FatalError ◀─ InvalidProtocolVersion / retries exhausted
//! ```
//!
//! `FatalError` never retries on its own; a fresh `connect` always works.
//! `Disconnected` and `FatalError` are left only through `connect`,
//! `disconnect` (from `FatalError`) or a protocol-mismatch log off.
//!
//! Retry counts follow the transport's own count when it reports one, so
//! progress text matches what the transport is doing.

use std::fmt;

use crate::{
    callback::{CallbackEvent, ResultCode},
    config::RetryPolicy,
    error::{HandlerError, SessionError},
    event::{ClientAction, ConnectProgress, ConnectStage, Notification, TransportRequest},
    roster::PresenceState,
};

/// Account credentials.
///
/// # Security
///
/// - **Debug Redaction**: the `Debug` impl never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Bundle a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &format_args!("<redacted {} chars>", self.password.len()))
            .finish()
    }
}

/// Why an auth code is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCodeReason {
    /// Service requires a code for this logon.
    Denied,
    /// The previous code was empty, rejected or expired.
    Invalid,
}

impl AuthCodeReason {
    /// Prompt text for the user.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Denied => "Please enter the auth code that has been sent to your email address",
            Self::Invalid => "The given auth code is invalid or expired, please try again",
        }
    }
}

/// Cause of a fatal session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    /// Username or password rejected.
    InvalidPassword,
    /// The account is in use by another client.
    AlreadyLoggedInElsewhere,
    /// Client protocol version not supported by the service.
    InvalidProtocolVersion,
    /// Connection retries exceeded the configured limit.
    RetriesExhausted,
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidPassword => "invalid username or password",
            Self::AlreadyLoggedInElsewhere => "account is already logged in elsewhere",
            Self::InvalidProtocolVersion => "invalid protocol version",
            Self::RetriesExhausted => "connection retries exhausted",
        };
        f.write_str(text)
    }
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session.
    #[default]
    Disconnected,
    /// Connecting or logging in.
    Connecting {
        /// Transport retries so far.
        retry_count: u32,
    },
    /// Waiting for the user to enter an auth code.
    AwaitingAuthCode {
        /// Why the code is needed.
        reason: AuthCodeReason,
    },
    /// Logged in.
    LoggedIn,
    /// Failed; needs an explicit `connect`.
    FatalError {
        /// Cause.
        reason: FatalReason,
    },
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting { retry_count: 0 } => f.write_str("connecting"),
            Self::Connecting { retry_count } => write!(f, "connecting (retry {retry_count})"),
            Self::AwaitingAuthCode { .. } => f.write_str("awaiting auth code"),
            Self::LoggedIn => f.write_str("logged in"),
            Self::FatalError { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Connection and login state machine.
#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    credentials: Option<Credentials>,
    auth_code: Option<String>,
    retry: RetryPolicy,
}

impl SessionController {
    /// Disconnected controller with the given retry policy.
    pub fn new(retry: RetryPolicy) -> Self {
        Self { state: SessionState::Disconnected, credentials: None, auth_code: None, retry }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether the session is logged in.
    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::LoggedIn
    }

    /// Start a session with `credentials`.
    ///
    /// Valid from `Disconnected` and `FatalError`.
    pub fn connect(&mut self, credentials: Credentials) -> Result<Vec<ClientAction>, SessionError> {
        if !matches!(self.state, SessionState::Disconnected | SessionState::FatalError { .. }) {
            return Err(SessionError::InvalidState {
                operation: "connect",
                state: self.state.clone(),
            });
        }
        if !credentials.is_complete() {
            return Err(SessionError::MissingCredentials);
        }

        tracing::info!(username = %credentials.username, "connecting");

        self.auth_code = None;
        self.credentials = Some(credentials.clone());

        let mut actions = vec![ClientAction::Transport(TransportRequest::Connect {
            credentials,
            auth_code: None,
        })];
        self.transition(SessionState::Connecting { retry_count: 0 }, &mut actions);
        actions.push(progress(ConnectStage::Connecting, 0));

        Ok(actions)
    }

    /// End the session. Valid from any state.
    pub fn disconnect(&mut self) -> Vec<ClientAction> {
        self.credentials = None;
        self.auth_code = None;

        let mut actions = vec![
            ClientAction::Transport(TransportRequest::SetAutoReconnect { enabled: false }),
            ClientAction::Transport(TransportRequest::Disconnect),
        ];
        self.transition(SessionState::Disconnected, &mut actions);
        actions
    }

    /// Answer an auth code prompt.
    ///
    /// An empty code re-prompts without contacting the transport.
    pub fn submit_auth_code(&mut self, code: &str) -> Result<Vec<ClientAction>, SessionError> {
        let credentials = match (&self.state, &self.credentials) {
            (SessionState::AwaitingAuthCode { .. }, Some(credentials)) => credentials.clone(),
            _ => {
                return Err(SessionError::InvalidState {
                    operation: "submit auth code",
                    state: self.state.clone(),
                });
            },
        };

        let mut actions = Vec::new();
        let code = code.trim();

        if code.is_empty() {
            self.prompt_auth_code(AuthCodeReason::Invalid, &mut actions);
            return Ok(actions);
        }

        self.auth_code = Some(code.to_string());
        actions.push(ClientAction::Transport(TransportRequest::Connect {
            credentials,
            auth_code: Some(code.to_string()),
        }));
        self.transition(SessionState::Connecting { retry_count: 0 }, &mut actions);
        actions.push(progress(ConnectStage::Connecting, 0));

        Ok(actions)
    }

    /// Publish the local user's presence. Requires a logged-in session.
    pub fn set_presence(&self, state: PresenceState) -> Result<Vec<ClientAction>, SessionError> {
        if !self.is_logged_in() {
            return Err(SessionError::NotLoggedIn);
        }
        Ok(vec![ClientAction::Transport(TransportRequest::SetPresence { state })])
    }

    /// Handle a connection or login callback.
    pub fn handle_callback(
        &mut self,
        event: &CallbackEvent,
    ) -> Result<Vec<ClientAction>, HandlerError> {
        let mut actions = Vec::new();

        match event {
            CallbackEvent::ConnectionEstablished => self.on_connected(&mut actions),
            CallbackEvent::ConnectionRetrying { count } => self.on_retry(*count, &mut actions),
            CallbackEvent::LoginResult { result } => self.on_login_result(*result, &mut actions),
            CallbackEvent::LoggedOff { result } => self.on_logged_off(*result, &mut actions),
            _ => return Err(HandlerError::UnexpectedEvent { kind: event.kind() }),
        }

        Ok(actions)
    }

    fn on_connected(&mut self, actions: &mut Vec<ClientAction>) {
        let SessionState::Connecting { retry_count } = self.state else {
            tracing::debug!(state = %self.state, "ignoring connection outside of connect");
            return;
        };
        let Some(credentials) = self.credentials.clone() else {
            tracing::warn!("connection established without stored credentials");
            return;
        };

        actions.push(ClientAction::Transport(TransportRequest::LogOn {
            credentials,
            auth_code: self.auth_code.clone(),
        }));
        actions.push(progress(ConnectStage::LoggingIn, retry_count));
    }

    fn on_retry(&mut self, reported: u32, actions: &mut Vec<ClientAction>) {
        let tracked = match self.state {
            SessionState::Connecting { retry_count } => retry_count.saturating_add(1),
            SessionState::LoggedIn => 1,
            _ => {
                tracing::debug!(state = %self.state, "ignoring retry outside of a session");
                return;
            },
        };
        // The transport's count is what the user sees; zero means it keeps none.
        let attempt = if reported == 0 { tracked } else { reported };
        if attempt != tracked {
            tracing::debug!(reported, tracked, "transport retry count differs");
        }

        if self.retry.is_exhausted(attempt) {
            tracing::warn!(attempt, "connection retry limit reached");
            self.fail(FatalReason::RetriesExhausted, actions);
            actions.push(ClientAction::Transport(TransportRequest::Disconnect));
            return;
        }

        self.transition(SessionState::Connecting { retry_count: attempt }, actions);
        actions.push(progress(ConnectStage::Connecting, attempt));
    }

    fn on_login_result(&mut self, result: ResultCode, actions: &mut Vec<ClientAction>) {
        if !matches!(self.state, SessionState::Connecting { .. }) {
            tracing::debug!(state = %self.state, ?result, "ignoring login result outside of connect");
            return;
        }

        match result {
            ResultCode::Ok => self.transition(SessionState::LoggedIn, actions),
            ResultCode::AccountLogonDenied => self.prompt_auth_code(AuthCodeReason::Denied, actions),
            ResultCode::InvalidLoginAuthCode => {
                self.auth_code = None;
                self.prompt_auth_code(AuthCodeReason::Invalid, actions);
            },
            ResultCode::InvalidPassword => self.fail(FatalReason::InvalidPassword, actions),
            ResultCode::LoggedInElsewhere => {
                self.fail(FatalReason::AlreadyLoggedInElsewhere, actions);
            },
            other => tracing::warn!(result = ?other, "login failed, waiting for transport retry"),
        }
    }

    fn on_logged_off(&mut self, result: ResultCode, actions: &mut Vec<ClientAction>) {
        if result == ResultCode::InvalidProtocolVersion {
            self.fail(FatalReason::InvalidProtocolVersion, actions);
            return;
        }

        tracing::info!(?result, state = %self.state, "logged off by service");
        if self.is_logged_in() {
            // Auto-reconnect is still on, so the transport logs on again.
            self.transition(SessionState::Connecting { retry_count: 0 }, actions);
            actions.push(progress(ConnectStage::Connecting, 0));
        }
    }

    fn prompt_auth_code(&mut self, reason: AuthCodeReason, actions: &mut Vec<ClientAction>) {
        self.transition(SessionState::AwaitingAuthCode { reason }, actions);
        actions.push(ClientAction::Notify(Notification::AuthCodeRequested { reason }));
    }

    fn fail(&mut self, reason: FatalReason, actions: &mut Vec<ClientAction>) {
        tracing::warn!(%reason, "session failed");
        self.auth_code = None;
        actions.push(ClientAction::Transport(TransportRequest::SetAutoReconnect { enabled: false }));
        self.transition(SessionState::FatalError { reason }, actions);
    }

    fn transition(&mut self, next: SessionState, actions: &mut Vec<ClientAction>) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "session transition");
        self.state = next.clone();
        actions.push(ClientAction::Notify(Notification::SessionStateChanged(next)));
    }
}

fn progress(stage: ConnectStage, retry_count: u32) -> ClientAction {
    ClientAction::Notify(Notification::ConnectProgress(ConnectProgress { stage, retry_count }))
}
