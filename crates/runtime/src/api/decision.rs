//! Asynchronous abstraction for sourcing each side's next move.
//!
//! The orchestrator calls [`DecisionSource::decide`] once per side per round.
//! Implementations may wrap a language model, a scripted fixture, or the
//! built-in heuristic; the runtime only cares about the returned
//! [`PredictionResult`].
use std::sync::Arc;

use arena_core::{AnyMove, GameKind, MatchConfig, PrivateView, Side, StateSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::DecisionError;

/// Everything a side may see when choosing its move.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub match_id: String,
    pub side: Side,
    pub personality: String,
    pub game: GameKind,
    pub round: u32,
    pub total_rounds: u32,
    #[serde(flatten)]
    pub snapshot: StateSnapshot,
    pub private: PrivateView,
    pub legal_moves: Vec<AnyMove>,
    /// The opponent's legal moves, the space guesses are drawn from.
    pub opponent_moves: Vec<AnyMove>,
    pub own_history: Vec<AnyMove>,
    pub opponent_history: Vec<AnyMove>,
}

/// One ranked guess about the opponent's move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub opponent_move: AnyMove,
    pub confidence: f64,
    /// The move this side would answer the guess with.
    #[serde(default)]
    pub counter: Option<AnyMove>,
    #[serde(default)]
    pub rationale: String,
}

impl Prediction {
    pub fn new(opponent_move: impl Into<AnyMove>, confidence: f64) -> Self {
        Self {
            opponent_move: opponent_move.into(),
            confidence: confidence.clamp(0.0, 1.0),
            counter: None,
            rationale: String::new(),
        }
    }
}

/// Result of one decision call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Ranked guesses; only the first three are used.
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub chosen_move: Option<AnyMove>,
    #[serde(default)]
    pub rationale: String,
}

/// Maximum ranked guesses streamed per side per round.
pub const MAX_PREDICTIONS: usize = 3;

#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(&self, request: DecisionRequest) -> Result<PredictionResult, DecisionError>;
}

#[async_trait]
impl<T: DecisionSource + ?Sized> DecisionSource for Arc<T> {
    async fn decide(&self, request: DecisionRequest) -> Result<PredictionResult, DecisionError> {
        (**self).decide(request).await
    }
}

/// Builds one decision source per side when a match starts.
pub trait DecisionSourceFactory: Send + Sync {
    fn create(&self, config: &MatchConfig, side: Side) -> Arc<dyn DecisionSource>;
}
