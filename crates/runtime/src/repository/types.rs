//! Records shared by the registry and the archive.
use arena_core::{AnyMove, GameKind, MatchConfig, Outcome, PerSide, RoundResolution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a match: `created → running → {completed | disconnected}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchStatus {
    Created,
    Running,
    Completed,
    Disconnected,
}

impl MatchStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Disconnected)
    }
}

/// Listing entry for one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: String,
    pub game_type: GameKind,
    pub personalities: PerSide<String>,
    pub status: MatchStatus,
    pub total_rounds: u32,
    pub seed: u64,
    pub event_count: usize,
    pub winner: Option<Outcome>,
    pub final_scores: Option<PerSide<i64>>,
    pub accuracy: Option<PerSide<f64>>,
    pub created_at: DateTime<Utc>,
}

impl MatchSummary {
    /// Summary of a match that has not finished yet.
    pub fn pending(config: &MatchConfig, status: MatchStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            match_id: config.match_id.clone(),
            game_type: config.game,
            personalities: config.personalities.clone(),
            status,
            total_rounds: config.total_rounds,
            seed: config.seed,
            event_count: 0,
            winner: None,
            final_scores: None,
            accuracy: None,
            created_at,
        }
    }
}

/// One resolved round as handed to the archive.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub match_id: String,
    pub round: u32,
    /// Commitment to the public state the round was played from.
    pub state_hash: String,
    pub moves: PerSide<AnyMove>,
    pub fallback: PerSide<bool>,
    pub resolution: RoundResolution,
    pub scores: PerSide<i64>,
    pub accuracy: PerSide<f64>,
    pub recorded_at: DateTime<Utc>,
}
