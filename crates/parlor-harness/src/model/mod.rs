//! Reference model for model-based testing.
//!
//! The model restates the client's observable behaviour as directly as
//! possible: the roster is a sorted `BTreeMap`, ordering is a tuple sort
//! key, and the session is a small enum. It serves as the oracle the real
//! engine is checked against.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Observable behaviour only: no bus, no actions
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod roster;
mod session;
mod world;

pub use operation::{LoginOutcome, ModelPeerId, Operation, OperationError, OperationResult};
pub use roster::{ModelMessage, ModelPeer};
pub use session::ModelSession;
pub use world::{ModelWorld, ObservableState};
