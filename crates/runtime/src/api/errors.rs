//! Unified error types surfaced by the runtime API.
//!
//! Only configuration and transport failures reach callers. Decision and sink
//! failures are absorbed inside the match loop and only logged.
use std::time::Duration;

use arena_core::{ConfigError, MoveMismatch};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid match configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("match {0} not found")]
    MatchNotFound(String),

    #[error("match {match_id} is already {status}")]
    MatchStarted {
        match_id: String,
        status: crate::repository::MatchStatus,
    },

    #[error("match registry lock was poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Why a side's decision was replaced by the variant's default move.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision source timed out after {0:?}")]
    Timeout(Duration),

    #[error("decision source returned no move")]
    NoMove,

    #[error(transparent)]
    WrongVariant(#[from] MoveMismatch),

    #[error("decision task ended without a result")]
    TaskLost,

    #[error("decision source failed: {0}")]
    Source(String),
}

/// Failures of the optional persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive lock was poisoned")]
    LockPoisoned,

    #[error("match id `{0}` cannot be used as an archive key")]
    InvalidMatchId(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer disconnected")]
    Disconnected,

    #[error("no start_match message within {0:?}")]
    StartTimeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid match configuration: {0}")]
    InvalidConfig(#[source] ConfigError),

    #[error("unknown match `{0}`")]
    UnknownMatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
