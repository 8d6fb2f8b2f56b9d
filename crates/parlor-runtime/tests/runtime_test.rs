//! Runtime tests against a recording transport.

#![allow(clippy::unwrap_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parlor_core::{
    CallbackEvent, ChatEntryKind, ChatSender, ClientError, Credentials, Notification, PeerId,
    PresenceState, ResultCode, SessionError, SessionState,
};
use parlor_runtime::{Runtime, RuntimeConfig, RuntimeError, RuntimeHandle, Transport, TransportError};
use tokio::sync::{broadcast, mpsc};

const WAIT: Duration = Duration::from_secs(5);

/// Transport call as observed by the test.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Connect { auth_code: Option<String> },
    LogOn { auth_code: Option<String> },
    Disconnect,
    SetAutoReconnect(bool),
    SetPresence(PresenceState),
    Send { peer: PeerId, body: String },
    Fetch(String),
}

struct RecordingTransport {
    calls: mpsc::UnboundedSender<Call>,
    fetches: AtomicUsize,
    fail_sends: bool,
}

impl RecordingTransport {
    fn new(fail_sends: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { calls, fetches: AtomicUsize::new(0), fail_sends }), rx)
    }

    fn record(&self, call: Call) {
        let _ = self.calls.send(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(
        &self,
        _credentials: Credentials,
        auth_code: Option<String>,
    ) -> Result<(), TransportError> {
        self.record(Call::Connect { auth_code });
        Ok(())
    }

    async fn log_on(
        &self,
        _credentials: Credentials,
        auth_code: Option<String>,
    ) -> Result<(), TransportError> {
        self.record(Call::LogOn { auth_code });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        Ok(())
    }

    async fn set_auto_reconnect(&self, enabled: bool) -> Result<(), TransportError> {
        self.record(Call::SetAutoReconnect(enabled));
        Ok(())
    }

    async fn set_presence(&self, state: PresenceState) -> Result<(), TransportError> {
        self.record(Call::SetPresence(state));
        Ok(())
    }

    async fn send_chat_message(&self, peer: PeerId, body: String) -> Result<(), TransportError> {
        self.record(Call::Send { peer, body });
        if self.fail_sends {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn fetch_avatar(&self, uri: String) -> Result<Bytes, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Fetch(uri));
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(Bytes::from_static(&[0xff, 0xd8, 0xff, 0xe0]))
    }
}

async fn next_call(calls: &mut mpsc::UnboundedReceiver<Call>) -> Call {
    tokio::time::timeout(WAIT, calls.recv()).await.unwrap().unwrap()
}

async fn wait_for_state(handle: &RuntimeHandle, expected: SessionState) {
    let mut session = handle.session_state();
    tokio::time::timeout(WAIT, session.wait_for(|state| *state == expected))
        .await
        .unwrap()
        .unwrap();
}

async fn next_matching<F>(notifications: &mut broadcast::Receiver<Notification>, mut matches: F)
where
    F: FnMut(&Notification) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let notification = notifications.recv().await.unwrap();
            if matches(&notification) {
                return;
            }
        }
    })
    .await
    .unwrap();
}

async fn logged_in(
    fail_sends: bool,
) -> (RuntimeHandle, Arc<RecordingTransport>, mpsc::UnboundedReceiver<Call>) {
    let (transport, mut calls) = RecordingTransport::new(fail_sends);
    let (handle, _task) = Runtime::spawn(RuntimeConfig::default(), Arc::clone(&transport));
    let sink = handle.callbacks();

    handle.connect(Credentials::new("alice", "pw")).await.unwrap();
    assert_eq!(next_call(&mut calls).await, Call::Connect { auth_code: None });

    sink.push(CallbackEvent::ConnectionEstablished).await.unwrap();
    assert_eq!(next_call(&mut calls).await, Call::LogOn { auth_code: None });

    sink.push(CallbackEvent::LoginResult { result: ResultCode::Ok }).await.unwrap();
    wait_for_state(&handle, SessionState::LoggedIn).await;

    (handle, transport, calls)
}

#[tokio::test]
async fn login_reaches_logged_in() {
    let (handle, _transport, _calls) = logged_in(false).await;

    assert_eq!(*handle.session_state().borrow(), SessionState::LoggedIn);
}

#[tokio::test]
async fn auth_code_round_trip() {
    let (transport, mut calls) = RecordingTransport::new(false);
    let (handle, _task) = Runtime::spawn(RuntimeConfig::default(), transport);
    let sink = handle.callbacks();
    let mut notifications = handle.subscribe();

    handle.connect(Credentials::new("alice", "pw")).await.unwrap();
    sink.push(CallbackEvent::LoginResult { result: ResultCode::AccountLogonDenied })
        .await
        .unwrap();
    next_matching(&mut notifications, |n| matches!(n, Notification::AuthCodeRequested { .. }))
        .await;

    handle.submit_auth_code(" K7QX2 ").await.unwrap();

    assert_eq!(next_call(&mut calls).await, Call::Connect { auth_code: None });
    assert_eq!(next_call(&mut calls).await, Call::Connect {
        auth_code: Some("K7QX2".to_string())
    });
}

#[tokio::test]
async fn invalid_intent_is_reported_to_caller() {
    let (transport, _calls) = RecordingTransport::new(false);
    let (handle, _task) = Runtime::spawn(RuntimeConfig::default(), transport);

    let result = handle.set_presence(PresenceState::Away).await;

    assert_eq!(result, Err(RuntimeError::Client(ClientError::Session(SessionError::NotLoggedIn))));
}

#[tokio::test]
async fn shared_avatar_downloads_once() {
    let (handle, transport, _calls) = logged_in(false).await;
    let sink = handle.callbacks();
    let mut notifications = handle.subscribe();

    for peer in [1, 2] {
        sink.push(CallbackEvent::AvatarHashChanged { peer: PeerId(peer), hash: vec![0x3c; 20] })
            .await
            .unwrap();
    }

    let mut ready = Vec::new();
    tokio::time::timeout(WAIT, async {
        while ready.len() < 2 {
            if let Notification::AvatarReady { peer, .. } = notifications.recv().await.unwrap() {
                ready.push(peer);
            }
        }
    })
    .await
    .unwrap();

    ready.sort();
    assert_eq!(ready, vec![PeerId(1), PeerId(2)]);
    assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);

    let roster = handle.roster().await.unwrap();
    assert!(roster.iter().all(|peer| peer.avatar_image.is_some()));
}

#[tokio::test]
async fn chat_is_echoed_and_sent() {
    let (handle, _transport, mut calls) = logged_in(false).await;
    let sink = handle.callbacks();

    sink.push(CallbackEvent::ChatMessageReceived {
        peer: PeerId(7),
        entry: ChatEntryKind::Message,
        body: "ping".to_string(),
    })
    .await
    .unwrap();
    handle.send_message(PeerId(7), "pong").await.unwrap();

    assert_eq!(next_call(&mut calls).await, Call::Send {
        peer: PeerId(7),
        body: "pong".to_string()
    });

    let transcript = handle.transcript(PeerId(7)).await.unwrap().unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender, ChatSender::Peer(PeerId(7)));
    assert!(transcript[1].is_local());
}

#[tokio::test]
async fn failed_send_keeps_transcript_entry() {
    let (handle, _transport, mut calls) = logged_in(true).await;
    handle
        .callbacks()
        .push(CallbackEvent::NameChanged { peer: PeerId(3), name: "Cy".to_string() })
        .await
        .unwrap();

    handle.send_message(PeerId(3), "hello?").await.unwrap();
    assert!(matches!(next_call(&mut calls).await, Call::Send { .. }));

    let transcript = handle.transcript(PeerId(3)).await.unwrap().unwrap();
    assert_eq!(transcript.len(), 1);
}

#[tokio::test]
async fn send_to_unknown_peer_is_rejected() {
    let (handle, _transport, _calls) = logged_in(false).await;

    let result = handle.send_message(PeerId(404), "anyone?").await;

    assert_eq!(result, Err(RuntimeError::Client(ClientError::UnknownPeer { peer: PeerId(404) })));
    assert_eq!(handle.transcript(PeerId(404)).await.unwrap(), None);
}

#[tokio::test]
async fn disconnect_stops_reconnect_first() {
    let (handle, _transport, mut calls) = logged_in(false).await;

    handle.disconnect().await.unwrap();

    assert_eq!(next_call(&mut calls).await, Call::SetAutoReconnect(false));
    assert_eq!(next_call(&mut calls).await, Call::Disconnect);
    wait_for_state(&handle, SessionState::Disconnected).await;
}

#[tokio::test]
async fn shutdown_stops_event_task() {
    let (transport, _calls) = RecordingTransport::new(false);
    let (handle, task) = Runtime::spawn(RuntimeConfig::default(), transport);

    handle.shutdown().await.unwrap();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(handle.roster().await, Err(RuntimeError::Stopped));
}
