//! Model-based testing harness for the Parlor engine.
//!
//! The `model` module provides a reference implementation of the session
//! state machine and the roster. Operations are applied to both the model
//! and the real `Client` (through [`RealWorld`]), and their observable
//! states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod real;

pub use model::{
    LoginOutcome, ModelMessage, ModelPeer, ModelPeerId, ModelSession, ModelWorld, ObservableState,
    Operation, OperationError, OperationResult,
};
pub use real::RealWorld;
