//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! other layers can stay focused on orchestration, transport, or persistence.

pub mod decision;
pub mod errors;

pub use decision::{
    DecisionRequest, DecisionSource, DecisionSourceFactory, MAX_PREDICTIONS, Prediction,
    PredictionResult,
};
pub use errors::{DecisionError, Result, RuntimeError, SinkError, TransportError};
