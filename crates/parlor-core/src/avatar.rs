//! Avatar references and the shared avatar cache.
//!
//! Avatars are addressed by content hash. The hash is both the cache key and
//! the source of the download location. The cache guarantees at most one
//! download per key: later requesters for an in-flight key are coalesced
//! onto it and receive the same result.
//!
//! ```text
//!              fetch()                complete(Ok)
//! NotStarted ──────────▶ InFlight ─────────────────▶ Ready(image)
//!                           │
//!                           │ complete(Err)
//!                           ▼
//!                         Failed
//! ```

use std::{collections::HashMap, fmt};

use bytes::Bytes;
use thiserror::Error;

use crate::roster::PeerId;

/// Content reference of a resolved avatar (lowercase hex hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvatarRef {
    hash: String,
}

impl AvatarRef {
    /// Build a reference from a raw hash.
    ///
    /// Returns `None` for an empty or all-zero hash, which the service uses
    /// for "no avatar".
    pub fn from_hash(hash: &[u8]) -> Option<Self> {
        if hash.iter().all(|byte| *byte == 0) {
            return None;
        }
        Some(Self { hash: hex::encode(hash) })
    }

    /// Cache key for this avatar.
    pub fn key(&self) -> &str {
        &self.hash
    }

    /// Download location relative to `base`: `<base>/<hh>/<hash>_medium.jpg`.
    pub fn uri(&self, base: &str) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}/{}_medium.jpg", base.trim_end_matches('/'), prefix, self.hash)
    }
}

/// Fetched (still encoded) avatar image.
#[derive(Clone, PartialEq, Eq)]
pub struct AvatarImage(Bytes);

impl AvatarImage {
    /// Encoded image bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }
}

impl fmt::Debug for AvatarImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AvatarImage(<{} bytes>)", self.0.len())
    }
}

impl From<Bytes> for AvatarImage {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for AvatarImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

/// Avatar download failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("avatar fetch failed: {reason}")]
pub struct AvatarFetchError {
    /// Description of the failure.
    pub reason: String,
}

/// Observable state of one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarEntryState {
    /// Never requested.
    NotStarted,
    /// Download running.
    InFlight,
    /// Downloaded.
    Ready(AvatarImage),
    /// Download failed. Not retried for the rest of the session.
    Failed,
}

/// Result of [`AvatarCache::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Image already cached.
    Ready(AvatarImage),
    /// New download: the caller must issue exactly one fetch for the key.
    Started,
    /// A download is already running; the waiter was added to it.
    Coalesced,
    /// A previous download failed.
    Failed,
}

/// Waiters released by [`AvatarCache::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Every peer coalesced onto the download.
    pub waiters: Vec<PeerId>,
    /// The shared result, `None` on failure.
    pub image: Option<AvatarImage>,
}

#[derive(Debug, Clone)]
enum Entry {
    InFlight { waiters: Vec<PeerId> },
    Ready(AvatarImage),
    Failed,
}

/// Process-wide avatar cache keyed by content hash.
#[derive(Debug, Default)]
pub struct AvatarCache {
    entries: HashMap<String, Entry>,
}

impl AvatarCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `key`.
    pub fn state(&self, key: &str) -> AvatarEntryState {
        match self.entries.get(key) {
            None => AvatarEntryState::NotStarted,
            Some(Entry::InFlight { .. }) => AvatarEntryState::InFlight,
            Some(Entry::Ready(image)) => AvatarEntryState::Ready(image.clone()),
            Some(Entry::Failed) => AvatarEntryState::Failed,
        }
    }

    /// Number of downloads currently running.
    pub fn in_flight(&self) -> usize {
        self.entries.values().filter(|entry| matches!(entry, Entry::InFlight { .. })).count()
    }

    /// Request `key` on behalf of `waiter`.
    pub fn fetch(&mut self, key: &str, waiter: PeerId) -> FetchOutcome {
        match self.entries.get_mut(key) {
            Some(Entry::Ready(image)) => FetchOutcome::Ready(image.clone()),
            Some(Entry::Failed) => FetchOutcome::Failed,
            Some(Entry::InFlight { waiters }) => {
                if !waiters.contains(&waiter) {
                    waiters.push(waiter);
                }
                FetchOutcome::Coalesced
            },
            None => {
                self.entries.insert(key.to_string(), Entry::InFlight { waiters: vec![waiter] });
                FetchOutcome::Started
            },
        }
    }

    /// Record the download result for `key` and release its waiters.
    ///
    /// A completion for a key that is not in flight changes nothing and
    /// releases nobody.
    pub fn complete(
        &mut self,
        key: &str,
        result: Result<AvatarImage, AvatarFetchError>,
    ) -> Completion {
        let Some(Entry::InFlight { waiters }) = self.entries.get_mut(key) else {
            tracing::debug!(key, "ignoring completion for avatar that is not in flight");
            return Completion { waiters: Vec::new(), image: None };
        };
        let waiters = std::mem::take(waiters);

        let (entry, image) = match result {
            Ok(image) => (Entry::Ready(image.clone()), Some(image)),
            Err(error) => {
                tracing::debug!(key, %error, "avatar unavailable");
                (Entry::Failed, None)
            },
        };
        self.entries.insert(key.to_string(), entry);

        Completion { waiters, image }
    }
}
