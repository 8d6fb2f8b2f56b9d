//! Fuzz target for the session state machine
//!
//! Drive `Client` with arbitrary interleavings of user intents and
//! connection callbacks, including out-of-order and duplicate callbacks.
//!
//! # Invariants
//!
//! - `LoggedIn` ONLY reachable via `LoginResult(Ok)` while connecting
//! - Every state change emits exactly one `SessionStateChanged`, carrying
//!   the new state
//! - `FatalError` and `Disconnected` only leave via `connect`, `disconnect`
//!   (from `FatalError`) or a protocol-mismatch log off
//! - Retry count never exceeds a bounded policy
//! - Rejected intents leave the state untouched
//! - NEVER panic on unexpected callbacks

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parlor_core::{
    CallbackEvent, Client, ClientAction, ClientConfig, ClientEvent, Credentials, Notification,
    PresenceState, ResultCode, RetryPolicy, SessionState,
};

const RESULT_CODES: [ResultCode; 10] = [
    ResultCode::Ok,
    ResultCode::Fail,
    ResultCode::NoConnection,
    ResultCode::InvalidPassword,
    ResultCode::LoggedInElsewhere,
    ResultCode::InvalidProtocolVersion,
    ResultCode::ServiceUnavailable,
    ResultCode::TryAnotherServer,
    ResultCode::AccountLogonDenied,
    ResultCode::InvalidLoginAuthCode,
];

#[derive(Debug, Clone, Arbitrary)]
enum SessionEvent {
    Connect { blank_password: bool },
    Disconnect,
    SubmitAuthCode { code: String },
    SetPresence,
    Established,
    Retrying { count: u32 },
    LoginResult { code: u8 },
    LoggedOff { code: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    max_retries: Option<u8>,
    events: Vec<SessionEvent>,
}

fn result_code(code: u8) -> ResultCode {
    RESULT_CODES[usize::from(code) % RESULT_CODES.len()]
}

fn to_event(event: &SessionEvent) -> ClientEvent {
    match event {
        SessionEvent::Connect { blank_password } => ClientEvent::Connect {
            credentials: Credentials::new("fuzz", if *blank_password { "" } else { "pw" }),
        },
        SessionEvent::Disconnect => ClientEvent::Disconnect,
        SessionEvent::SubmitAuthCode { code } => ClientEvent::SubmitAuthCode { code: code.clone() },
        SessionEvent::SetPresence => ClientEvent::SetPresence { state: PresenceState::Busy },
        SessionEvent::Established => ClientEvent::Callback(CallbackEvent::ConnectionEstablished),
        SessionEvent::Retrying { count } => {
            ClientEvent::Callback(CallbackEvent::ConnectionRetrying { count: *count })
        },
        SessionEvent::LoginResult { code } => {
            ClientEvent::Callback(CallbackEvent::LoginResult { result: result_code(*code) })
        },
        SessionEvent::LoggedOff { code } => {
            ClientEvent::Callback(CallbackEvent::LoggedOff { result: result_code(*code) })
        },
    }
}

fuzz_target!(|input: FuzzInput| {
    let retry = match input.max_retries {
        Some(max) => RetryPolicy::bounded(u32::from(max)),
        None => RetryPolicy::unbounded(),
    };
    let mut client = Client::new(ClientConfig { retry, ..ClientConfig::default() });

    for event in &input.events {
        let before = client.session_state().clone();
        let result = client.handle(to_event(event));
        let after = client.session_state().clone();

        let Ok(actions) = result else {
            assert_eq!(before, after, "rejected intent changed state: {event:?}");
            continue;
        };

        let changes: Vec<_> = actions
            .iter()
            .filter_map(|action| match action {
                ClientAction::Notify(Notification::SessionStateChanged(state)) => Some(state),
                _ => None,
            })
            .collect();

        if before == after {
            assert!(changes.is_empty(), "notified without a change: {event:?}");
        } else {
            assert_eq!(changes, vec![&after], "missing or extra notification: {event:?}");
        }

        if after == SessionState::LoggedIn && before != SessionState::LoggedIn {
            assert!(matches!(before, SessionState::Connecting { .. }));
            assert!(matches!(
                event,
                SessionEvent::LoginResult { code } if result_code(*code) == ResultCode::Ok
            ));
        }

        if matches!(before, SessionState::Disconnected | SessionState::FatalError { .. })
            && before != after
        {
            let protocol_mismatch = matches!(
                event,
                SessionEvent::LoggedOff { code }
                    if result_code(*code) == ResultCode::InvalidProtocolVersion
            );
            assert!(
                matches!(event, SessionEvent::Connect { .. } | SessionEvent::Disconnect)
                    || protocol_mismatch,
                "left {before} via {event:?}"
            );
        }

        if let (SessionState::Connecting { retry_count }, Some(max)) = (&after, input.max_retries)
        {
            assert!(*retry_count <= u32::from(max), "retry count {retry_count} past {max}");
        }
    }
});
