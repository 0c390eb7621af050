//! Personality-driven decision source that needs no external service.
//!
//! Moves are scored on a single "pressure" axis (how hard a move pushes for
//! gain at the cost of risk) and the personality decides which band of that
//! axis to play from. Guesses about the opponent come from its observed move
//! frequencies, falling back to random legal moves before any history exists.
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use arena_core::{
    AnyMove, AuctionKind, BidderKind, CaptureKind, GameRng, MatchConfig, NegotiationKind,
    SellerKind, Side,
};
use async_trait::async_trait;

use crate::api::{
    DecisionError, DecisionRequest, DecisionSource, DecisionSourceFactory, MAX_PREDICTIONS,
    Prediction, PredictionResult,
};

/// Play style of a heuristic side; unknown labels play balanced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Personality {
    Aggressive,
    Defensive,
    Chaotic,
    Balanced,
}

impl Personality {
    pub fn parse(label: &str) -> Self {
        Personality::from_str(label.trim()).unwrap_or(Personality::Balanced)
    }
}

/// How strongly a move presses for gain, roughly 0..=200.
fn pressure(mv: &AnyMove, side: Side) -> f64 {
    match mv {
        AnyMove::ResourceCapture(m) => {
            let weight = match m.kind {
                CaptureKind::Counter => 1.5,
                CaptureKind::AggressiveBid => 1.0,
                CaptureKind::DefensiveSpread => 0.33,
                CaptureKind::Bluff => 0.25,
                CaptureKind::Retreat => 0.0,
            };
            f64::from(m.amount) * weight
        }
        AnyMove::Negotiation(m) => match m.kind {
            // The seller presses with high asks, the buyer with low bids.
            NegotiationKind::Propose | NegotiationKind::CounterOffer => match side {
                Side::SideA => f64::from(m.price),
                Side::SideB => 100.0 - f64::from(m.price.min(100)),
            },
            NegotiationKind::BluffWalkaway => 100.0,
            NegotiationKind::Reject => 50.0,
            NegotiationKind::Accept => 0.0,
        },
        AnyMove::Auction(m) => match m.kind {
            AuctionKind::Pass => 0.0,
            AuctionKind::Bid => f64::from(m.amount) / 2.5,
            AuctionKind::BluffBid => f64::from(m.amount) / 3.0,
        },
        AnyMove::Bidder(m) => match m.kind {
            BidderKind::Wait => 0.0,
            BidderKind::Pass => 10.0,
            BidderKind::Bid => 50.0 + f64::from(m.hours) * 10.0,
            BidderKind::SurgeBid => 150.0,
        },
        AnyMove::Seller(m) => match m.kind {
            SellerKind::Discount => 100.0 - m.adjustment.abs() * 100.0,
            SellerKind::Hold => 100.0,
            SellerKind::SetPrice => 100.0 + m.adjustment * 100.0,
            SellerKind::SurgePricing => 100.0 + m.adjustment.abs() * 100.0,
        },
    }
}

/// Built-in decision source driven by a personality label.
pub struct HeuristicDecisionSource {
    personality: Personality,
    rng: Mutex<GameRng>,
}

impl HeuristicDecisionSource {
    pub fn new(personality: Personality, seed: u64) -> Self {
        Self {
            personality,
            rng: Mutex::new(GameRng::new(seed)),
        }
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    /// Picks an own move from the legal list according to the personality.
    fn choose(&self, rng: &mut GameRng, moves: &[AnyMove], side: Side) -> Option<AnyMove> {
        if moves.is_empty() {
            return None;
        }
        let mut ranked: Vec<&AnyMove> = moves.iter().collect();
        ranked.sort_by(|a, b| pressure(a, side).total_cmp(&pressure(b, side)));

        let len = ranked.len();
        let quarter = (len / 4).max(1);
        let band = match self.personality {
            Personality::Aggressive => &ranked[len - quarter..],
            Personality::Defensive => &ranked[..quarter],
            Personality::Chaotic => &ranked[..],
            Personality::Balanced => {
                let start = len.saturating_sub(quarter) / 2;
                &ranked[start..(start + quarter).min(len)]
            }
        };
        rng.choose(band).map(|mv| (*mv).clone())
    }

    /// Ranks guesses from the opponent's move frequencies.
    fn guess(&self, rng: &mut GameRng, request: &DecisionRequest) -> Vec<Prediction> {
        let history = &request.opponent_history;
        if history.is_empty() {
            let mut guesses = Vec::new();
            for confidence in [0.4, 0.3, 0.2] {
                let Some(mv) = rng.choose(&request.opponent_moves) else {
                    break;
                };
                if guesses.iter().any(|g: &Prediction| &g.opponent_move == mv) {
                    continue;
                }
                let mut guess = Prediction::new(mv.clone(), confidence);
                guess.rationale = "No history yet; sampling the opponent's options.".into();
                guesses.push(guess);
            }
            return guesses;
        }

        let mut counts: HashMap<String, (usize, usize, &AnyMove)> = HashMap::new();
        for (index, mv) in history.iter().enumerate() {
            let entry = counts.entry(mv.to_string()).or_insert((0, index, mv));
            entry.0 += 1;
            // Ties resolve toward the most recent occurrence.
            entry.1 = index;
            entry.2 = mv;
        }
        let mut ranked: Vec<_> = counts.into_values().collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let total = history.len() as f64;
        ranked
            .into_iter()
            .take(MAX_PREDICTIONS)
            .map(|(count, _, mv)| {
                let mut guess = Prediction::new(mv.clone(), count as f64 / total);
                guess.rationale = format!("Played {count} of {} rounds.", history.len());
                guess
            })
            .collect()
    }
}

#[async_trait]
impl DecisionSource for HeuristicDecisionSource {
    async fn decide(&self, request: DecisionRequest) -> Result<PredictionResult, DecisionError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| DecisionError::Source("heuristic rng lock was poisoned".into()))?;

        let mut predictions = self.guess(&mut rng, &request);
        let chosen = self.choose(&mut rng, &request.legal_moves, request.side);
        for guess in &mut predictions {
            guess.counter = chosen.clone();
        }

        Ok(PredictionResult {
            predictions,
            chosen_move: chosen,
            rationale: format!("{} play in round {}.", self.personality, request.round),
        })
    }
}

/// Factory handing each side a [`HeuristicDecisionSource`] seeded from the match.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicFactory;

impl DecisionSourceFactory for HeuristicFactory {
    fn create(&self, config: &MatchConfig, side: Side) -> Arc<dyn DecisionSource> {
        let salt = match side {
            Side::SideA => 0x5A17_A000_0000_0001,
            Side::SideB => 0x5A17_B000_0000_0002,
        };
        Arc::new(HeuristicDecisionSource::new(
            Personality::parse(config.personality(side)),
            config.seed ^ salt,
        ))
    }
}

#[cfg(test)]
mod tests {
    use arena_core::{
        CaptureMove, GameKind, GameVariant, PrivateView, Resource, ResourceCapture, StateSnapshot,
        CaptureState,
    };

    use super::*;

    fn request(side: Side, history: Vec<AnyMove>) -> DecisionRequest {
        let state = CaptureState::new(10);
        let legal: Vec<AnyMove> = ResourceCapture::valid_moves(&state, side)
            .into_iter()
            .map(Into::into)
            .collect();
        DecisionRequest {
            match_id: "match_test".into(),
            side,
            personality: "aggressive".into(),
            game: GameKind::ResourceCapture,
            round: 1,
            total_rounds: 10,
            snapshot: StateSnapshot::ResourceCapture(state),
            private: PrivateView::ResourceCapture { economy_bonus: 0 },
            legal_moves: legal.clone(),
            opponent_moves: legal,
            own_history: Vec::new(),
            opponent_history: history,
        }
    }

    #[test]
    fn personality_labels_parse_loosely() {
        assert_eq!(Personality::parse("Aggressive"), Personality::Aggressive);
        assert_eq!(Personality::parse(" chaotic "), Personality::Chaotic);
        assert_eq!(Personality::parse("stoic"), Personality::Balanced);
    }

    #[tokio::test]
    async fn aggressive_plays_high_pressure_moves() {
        let source = HeuristicDecisionSource::new(Personality::Aggressive, 1);
        let result = source.decide(request(Side::SideA, Vec::new())).await.unwrap();
        let chosen = result.chosen_move.expect("a move");
        assert!(pressure(&chosen, Side::SideA) >= 60.0, "chose {chosen}");
    }

    #[tokio::test]
    async fn defensive_plays_low_pressure_moves() {
        let source = HeuristicDecisionSource::new(Personality::Defensive, 1);
        let result = source.decide(request(Side::SideA, Vec::new())).await.unwrap();
        let chosen = result.chosen_move.expect("a move");
        assert!(pressure(&chosen, Side::SideA) <= 20.0, "chose {chosen}");
    }

    #[tokio::test]
    async fn guesses_follow_opponent_frequency() {
        let favourite: AnyMove = CaptureMove::new(CaptureKind::Counter, Resource::B, 60).into();
        let other: AnyMove = CaptureMove::new(CaptureKind::Retreat, Resource::A, 20).into();
        let history = vec![favourite.clone(), other, favourite.clone()];

        let source = HeuristicDecisionSource::new(Personality::Balanced, 9);
        let result = source.decide(request(Side::SideB, history)).await.unwrap();
        assert_eq!(result.predictions.len(), 2);
        assert_eq!(result.predictions[0].opponent_move, favourite);
        assert!((result.predictions[0].confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cold_start_guesses_are_capped() {
        let source = HeuristicDecisionSource::new(Personality::Chaotic, 4);
        let result = source.decide(request(Side::SideA, Vec::new())).await.unwrap();
        assert!(!result.predictions.is_empty());
        assert!(result.predictions.len() <= MAX_PREDICTIONS);
    }

    #[tokio::test]
    async fn factory_seeds_sides_independently() {
        let config = arena_core::MatchRequest::new(GameKind::Auction, "aggressive", "defensive", 4)
            .into_config("match_x", std::time::Duration::ZERO, Some(77))
            .unwrap();
        let a = HeuristicFactory.create(&config, Side::SideA);
        let again = HeuristicFactory.create(&config, Side::SideA);
        let req = request(Side::SideA, Vec::new());
        assert_eq!(
            a.decide(req.clone()).await.unwrap(),
            again.decide(req).await.unwrap()
        );
    }
}
