//! Trace files on disk.

#![allow(clippy::unwrap_used)]

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
};

use parlor_core::{CallbackEvent, ClientConfig, Credentials, PeerId, ResultCode, SessionState};
use parlor_runtime::{ReplayError, replay};
use tempfile::TempDir;

#[test]
fn trace_file_replays_to_fatal_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.cbor");
    let events = vec![
        CallbackEvent::ConnectionEstablished,
        CallbackEvent::NameChanged { peer: PeerId(10), name: "Dee".to_string() },
        CallbackEvent::LoginResult { result: ResultCode::InvalidPassword },
    ];

    let mut writer = BufWriter::new(File::create(&path).unwrap());
    replay::write_trace(&mut writer, &events).unwrap();
    writer.flush().unwrap();

    let loaded = replay::read_trace(BufReader::new(File::open(&path).unwrap())).unwrap();
    let summary =
        replay::replay(ClientConfig::default(), Some(Credentials::new("me", "pw")), loaded)
            .unwrap();

    assert!(matches!(summary.state, SessionState::FatalError { .. }));
    assert_eq!(summary.roster.len(), 1);
    assert_eq!(summary.roster[0].display_name, "Dee");
}

#[test]
fn truncated_file_fails_to_decode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.cbor");

    let mut bytes = Vec::new();
    replay::write_trace(&mut bytes, &[CallbackEvent::ConnectionEstablished]).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let result = replay::read_trace(File::open(&path).unwrap());

    assert!(matches!(result, Err(ReplayError::Decode { .. })));
}

#[test]
fn empty_credentials_are_rejected() {
    let result = replay::replay(ClientConfig::default(), Some(Credentials::new("", "")), vec![]);

    assert!(matches!(result, Err(ReplayError::Client(_))));
}
