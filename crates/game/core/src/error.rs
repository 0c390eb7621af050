//! Errors raised while validating a match request.
//!
//! Only configuration problems are errors at this layer: once a match exists,
//! out-of-domain moves are clamped by the rules rather than rejected.

use thiserror::Error;

use crate::config::{MAX_ROUNDS, MIN_ROUNDS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown game type `{0}`")]
    UnknownGame(String),

    #[error("rounds must be between {} and {}, got {}", MIN_ROUNDS, MAX_ROUNDS, .0)]
    RoundsOutOfRange(u32),

    #[error("{side} personality must not be empty")]
    EmptyPersonality { side: crate::Side },
}

/// A move handed to a variant that belongs to a different game, or to the
/// wrong side of an asymmetric one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("move of kind `{found}` is not a playable {expected} move")]
pub struct MoveMismatch {
    pub expected: crate::GameKind,
    pub found: &'static str,
}
