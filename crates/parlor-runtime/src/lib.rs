//! Parlor runtime.
//!
//! Drives the Sans-IO engine from `parlor-core` with Tokio:
//! - One event task owns the `Client` and applies callbacks, user intents
//!   and avatar completions in arrival order
//! - A transport worker performs transport requests in the order the engine
//!   emitted them
//! - Avatar downloads run concurrently and report back to the event task
//!
//! ## Architecture
//!
//! ```text
//! parlor-runtime
//!   ├─ Runtime        (event task, owns the Client)
//!   ├─ RuntimeHandle  (intents, snapshots, notifications)
//!   ├─ CallbackSink   (transport -> event task)
//!   ├─ Transport      (async seam to the presence service)
//!   └─ replay         (CBOR callback traces)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod replay;
mod runtime;
mod transport;

pub use error::{ReplayError, RuntimeError};
pub use runtime::{CallbackSink, Runtime, RuntimeConfig, RuntimeHandle};
pub use transport::{Transport, TransportError};
