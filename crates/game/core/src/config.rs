//! Match configuration and the catalogue of playable variants.
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::side::{PerSide, Side};

/// Smallest accepted round count for a match request.
pub const MIN_ROUNDS: u32 = 1;
/// Largest accepted round count for a match request.
pub const MAX_ROUNDS: u32 = 50;

/// Configuration tag selecting which rule set a match runs.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GameKind {
    #[serde(alias = "resource_wars")]
    #[strum(to_string = "resource_capture", serialize = "resource_wars")]
    ResourceCapture,
    Negotiation,
    Auction,
    GpuBidding,
}

/// Static description of a variant, served to clients choosing a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDescriptor {
    pub id: GameKind,
    pub name: &'static str,
    pub description: &'static str,
    pub default_rounds: u32,
}

impl GameKind {
    pub const fn descriptor(self) -> GameDescriptor {
        match self {
            GameKind::ResourceCapture => GameDescriptor {
                id: self,
                name: "Resource Wars",
                description: "Strategic resource capture. Sides bid, bluff, and counter for control of three resource pools.",
                default_rounds: 10,
            },
            GameKind::Negotiation => GameDescriptor {
                id: self,
                name: "The Negotiation",
                description: "Sequential offer negotiation. One side sells, the other buys. Hidden walkaway prices determine scoring.",
                default_rounds: 5,
            },
            GameKind::Auction => GameDescriptor {
                id: self,
                name: "The Auction",
                description: "Eight-item sealed-bid auction. Each side starts with 1000 credits and hidden valuations.",
                default_rounds: 8,
            },
            GameKind::GpuBidding => GameDescriptor {
                id: self,
                name: "GPU Marketplace",
                description: "GPU capacity bidding. The bidder optimizes cost, the seller optimizes revenue under demand-driven surge pricing.",
                default_rounds: 10,
            },
        }
    }

    /// All variants in presentation order.
    pub fn catalogue() -> Vec<GameDescriptor> {
        use strum::IntoEnumIterator;
        GameKind::iter().map(GameKind::descriptor).collect()
    }
}

/// Immutable configuration of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub match_id: String,
    pub game: GameKind,
    pub personalities: PerSide<String>,
    pub total_rounds: u32,
    pub inter_round_delay_ms: u64,
    /// Seed for the match RNG; recorded so any match can be replayed.
    pub seed: u64,
}

impl MatchConfig {
    pub fn inter_round_delay(&self) -> Duration {
        Duration::from_millis(self.inter_round_delay_ms)
    }

    pub fn personality(&self, side: Side) -> &str {
        &self.personalities[side]
    }
}

/// Client-supplied match parameters prior to validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchRequest {
    #[serde(alias = "game_type")]
    pub game_type: String,
    #[serde(alias = "side_a_personality")]
    pub side_a_personality: String,
    #[serde(alias = "side_b_personality")]
    pub side_b_personality: String,
    pub rounds: u32,
}

impl Default for MatchRequest {
    fn default() -> Self {
        Self {
            game_type: GameKind::ResourceCapture.to_string(),
            side_a_personality: "aggressive".to_string(),
            side_b_personality: "defensive".to_string(),
            rounds: 10,
        }
    }
}

impl MatchRequest {
    pub fn new(game: GameKind, side_a: impl Into<String>, side_b: impl Into<String>, rounds: u32) -> Self {
        Self {
            game_type: game.to_string(),
            side_a_personality: side_a.into(),
            side_b_personality: side_b.into(),
            rounds,
        }
    }

    /// Validates the request and freezes it into a [`MatchConfig`].
    ///
    /// `seed` of `None` draws a fresh random seed.
    pub fn into_config(
        self,
        match_id: impl Into<String>,
        inter_round_delay: Duration,
        seed: Option<u64>,
    ) -> Result<MatchConfig, ConfigError> {
        let game = GameKind::from_str(self.game_type.trim())
            .map_err(|_| ConfigError::UnknownGame(self.game_type.clone()))?;

        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&self.rounds) {
            return Err(ConfigError::RoundsOutOfRange(self.rounds));
        }

        let personalities = PerSide::new(self.side_a_personality, self.side_b_personality)
            .map(|label| label.trim().to_string());
        for side in Side::BOTH {
            if personalities[side].is_empty() {
                return Err(ConfigError::EmptyPersonality { side });
            }
        }

        Ok(MatchConfig {
            match_id: match_id.into(),
            game,
            personalities,
            total_rounds: self.rounds,
            inter_round_delay_ms: u64::try_from(inter_round_delay.as_millis()).unwrap_or(u64::MAX),
            seed: seed.unwrap_or_else(rand::random::<u64>),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_aliases() {
        assert_eq!(GameKind::from_str("auction").unwrap(), GameKind::Auction);
        assert_eq!(
            GameKind::from_str("resource_wars").unwrap(),
            GameKind::ResourceCapture
        );
        assert_eq!(GameKind::from_str("GPU_BIDDING").unwrap(), GameKind::GpuBidding);
        assert_eq!(GameKind::ResourceCapture.to_string(), "resource_capture");
        assert!(GameKind::from_str("chess").is_err());
    }

    #[test]
    fn rejects_bad_requests() {
        let request = MatchRequest {
            game_type: "chess".into(),
            ..MatchRequest::default()
        };
        assert_eq!(
            request.into_config("m", Duration::ZERO, Some(1)),
            Err(ConfigError::UnknownGame("chess".into()))
        );

        for rounds in [0, 51] {
            let request = MatchRequest {
                rounds,
                ..MatchRequest::default()
            };
            assert_eq!(
                request.into_config("m", Duration::ZERO, Some(1)),
                Err(ConfigError::RoundsOutOfRange(rounds))
            );
        }

        let request = MatchRequest {
            side_b_personality: "   ".into(),
            ..MatchRequest::default()
        };
        assert_eq!(
            request.into_config("m", Duration::ZERO, Some(1)),
            Err(ConfigError::EmptyPersonality { side: Side::SideB })
        );
    }

    #[test]
    fn accepts_boundary_rounds() {
        for rounds in [MIN_ROUNDS, MAX_ROUNDS] {
            let config = MatchRequest::new(GameKind::Negotiation, "greedy", "calm", rounds)
                .into_config("match_1", Duration::from_millis(250), Some(99))
                .unwrap();
            assert_eq!(config.total_rounds, rounds);
            assert_eq!(config.seed, 99);
            assert_eq!(config.inter_round_delay(), Duration::from_millis(250));
            assert_eq!(config.personality(Side::SideA), "greedy");
        }
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: MatchRequest =
            serde_json::from_str(r#"{"gameType":"auction","rounds":4}"#).unwrap();
        assert_eq!(request.game_type, "auction");
        assert_eq!(request.side_a_personality, "aggressive");
        assert_eq!(request.rounds, 4);
    }

    #[test]
    fn catalogue_lists_every_variant() {
        let ids: Vec<_> = GameKind::catalogue().into_iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                GameKind::ResourceCapture,
                GameKind::Negotiation,
                GameKind::Auction,
                GameKind::GpuBidding
            ]
        );
    }
}
