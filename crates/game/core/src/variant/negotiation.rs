//! Sequential Negotiation between a seller (side A) and a buyer (side B).
//!
//! Both sides hold hidden walkaway prices drawn so that a zone of agreement
//! always exists. The game ends at the first deal or after the last round.

use serde::{Deserialize, Serialize};

use super::{
    AnyMove, GameVariant, PrivateView, ResolutionDetail, RoundResolution, StateSnapshot,
};
use crate::config::{GameKind, MatchConfig};
use crate::error::MoveMismatch;
use crate::rng::GameRng;
use crate::side::{Outcome, PerSide, Side};

pub const SELLER_FLOOR_RANGE: std::ops::RangeInclusive<u32> = 20..=45;
pub const BUYER_CEILING_RANGE: std::ops::RangeInclusive<u32> = 55..=80;
pub const MAX_PRICE: u32 = 100;

const SELLER: Side = Side::SideA;
const BUYER: Side = Side::SideB;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NegotiationKind {
    Propose,
    Accept,
    Reject,
    CounterOffer,
    BluffWalkaway,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationMove {
    #[serde(rename = "type")]
    pub kind: NegotiationKind,
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub terms: String,
}

impl NegotiationMove {
    pub fn new(kind: NegotiationKind, price: u32) -> Self {
        Self {
            kind,
            price,
            terms: String::new(),
        }
    }

    pub fn propose(price: u32) -> Self {
        Self::new(NegotiationKind::Propose, price)
    }

    pub fn counter(price: u32) -> Self {
        Self::new(NegotiationKind::CounterOffer, price)
    }

    pub fn accept() -> Self {
        Self::new(NegotiationKind::Accept, 0)
    }

    pub fn reject() -> Self {
        Self::new(NegotiationKind::Reject, 0)
    }

    pub fn bluff() -> Self {
        Self::new(NegotiationKind::BluffWalkaway, 0)
    }

    /// Price named by a propose or counter-offer, clamped to the price domain.
    fn offered_price(&self) -> Option<u32> {
        matches!(
            self.kind,
            NegotiationKind::Propose | NegotiationKind::CounterOffer
        )
        .then(|| self.price.min(MAX_PRICE))
    }

    fn is(&self, kind: NegotiationKind) -> bool {
        self.kind == kind
    }
}

impl From<NegotiationMove> for AnyMove {
    fn from(value: NegotiationMove) -> Self {
        AnyMove::Negotiation(value)
    }
}

impl TryFrom<AnyMove> for NegotiationMove {
    type Error = MoveMismatch;

    fn try_from(value: AnyMove) -> Result<Self, Self::Error> {
        match value {
            AnyMove::Negotiation(m) => Ok(m),
            other => Err(MoveMismatch {
                expected: GameKind::Negotiation,
                found: other.kind_name(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationState {
    pub round: u32,
    pub total_rounds: u32,
    #[serde(skip)]
    pub seller_floor: u32,
    #[serde(skip)]
    pub buyer_ceiling: u32,
    pub current_offer: Option<u32>,
    pub offer_by: Option<Side>,
    pub deal_price: Option<u32>,
    pub deal_round: Option<u32>,
    pub scores: PerSide<u32>,
    pub bluffs_used: PerSide<u32>,
}

impl NegotiationState {
    pub fn new(total_rounds: u32, seller_floor: u32, buyer_ceiling: u32) -> Self {
        Self {
            round: 1,
            total_rounds,
            seller_floor,
            buyer_ceiling,
            current_offer: None,
            offer_by: None,
            deal_price: None,
            deal_round: None,
            scores: PerSide::default(),
            bluffs_used: PerSide::default(),
        }
    }

    /// Hidden walkaway price of `side`: the floor for the seller, the ceiling
    /// for the buyer.
    pub fn walkaway(&self, side: Side) -> u32 {
        match side {
            Side::SideA => self.seller_floor,
            Side::SideB => self.buyer_ceiling,
        }
    }
}

/// Sequential negotiation rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialNegotiation;

impl SequentialNegotiation {
    /// Applies the deal precedence and returns the agreed price, if any.
    fn settle(
        state: &NegotiationState,
        seller: &NegotiationMove,
        buyer: &NegotiationMove,
        notes: &mut Vec<String>,
    ) -> Option<u32> {
        use NegotiationKind::Accept;

        if seller.is(Accept) && buyer.is(Accept) {
            return state.current_offer;
        }

        if buyer.is(Accept) {
            if let Some(price) = seller.offered_price() {
                return Some(price);
            }
        }
        if seller.is(Accept) {
            if let Some(price) = buyer.offered_price() {
                return Some(price);
            }
        }

        // Accepting the opponent's standing offer; the opponent did not propose.
        if let Some(offer_by) = state.offer_by {
            let (acceptor, other) = match offer_by {
                Side::SideA => (buyer, seller),
                Side::SideB => (seller, buyer),
            };
            if acceptor.is(Accept) && other.offered_price().is_none() {
                return state.current_offer;
            }
        }

        match (seller.offered_price(), buyer.offered_price()) {
            (Some(ask), Some(bid)) if ask <= bid => {
                notes.push(format!("Prices cross! Seller asks {ask}, buyer offers {bid}."));
                Some((ask + bid) / 2)
            }
            _ => None,
        }
    }
}

impl GameVariant for SequentialNegotiation {
    type State = NegotiationState;
    type Move = NegotiationMove;

    const KIND: GameKind = GameKind::Negotiation;

    fn initial_state(config: &MatchConfig, rng: &mut GameRng) -> NegotiationState {
        let floor = rng.range(SELLER_FLOOR_RANGE);
        let ceiling = rng.range(BUYER_CEILING_RANGE);
        NegotiationState::new(config.total_rounds, floor, ceiling)
    }

    fn valid_moves(_state: &NegotiationState, _side: Side) -> Vec<NegotiationMove> {
        let mut moves: Vec<_> = (10..100)
            .step_by(10)
            .flat_map(|price| [NegotiationMove::propose(price), NegotiationMove::counter(price)])
            .collect();
        moves.extend([
            NegotiationMove::accept(),
            NegotiationMove::reject(),
            NegotiationMove::bluff(),
        ]);
        moves
    }

    fn resolve_round(
        state: &mut NegotiationState,
        seller: &NegotiationMove,
        buyer: &NegotiationMove,
        _rng: &mut GameRng,
    ) -> RoundResolution {
        let round = state.round;
        let no_deal = |description: String| RoundResolution {
            round,
            round_winner: None,
            description,
            detail: ResolutionDetail::Negotiation {
                deal_struck: false,
                deal_price: None,
            },
        };

        if seller.is(NegotiationKind::BluffWalkaway) && buyer.is(NegotiationKind::BluffWalkaway) {
            return no_deal(
                "Both sides walk away from the table. Tensions rise.".to_string(),
            );
        }

        let mut notes = Vec::new();
        for (side, mv) in [(SELLER, seller), (BUYER, buyer)] {
            if mv.is(NegotiationKind::BluffWalkaway) {
                state.bluffs_used[side] += 1;
                notes.push(format!("{} bluffs a walkaway!", side.label()));
            }
        }

        let Some(price) = Self::settle(state, seller, buyer, &mut notes) else {
            for (side, mv) in [(SELLER, seller), (BUYER, buyer)] {
                if let Some(price) = mv.offered_price() {
                    state.current_offer = Some(price);
                    state.offer_by = Some(side);
                    let verb = if mv.is(NegotiationKind::Propose) {
                        "proposes"
                    } else {
                        "counters at"
                    };
                    notes.push(format!("{} {verb} {price}.", side.label()));
                    break;
                }
            }
            for (side, mv) in [(SELLER, seller), (BUYER, buyer)] {
                if mv.is(NegotiationKind::Reject) {
                    notes.push(format!("{} rejects the offer.", side.label()));
                }
            }
            let description = if notes.is_empty() {
                "Negotiations continue.".to_string()
            } else {
                notes.join(" ")
            };
            return no_deal(description);
        };

        state.deal_price = Some(price);
        state.deal_round = Some(round);
        let gains = PerSide::new(
            price.saturating_sub(state.seller_floor),
            state.buyer_ceiling.saturating_sub(price),
        );
        state.scores.side_a += gains.side_a;
        state.scores.side_b += gains.side_b;
        notes.push(format!(
            "Deal struck at {price}! Seller gains {}, buyer gains {}.",
            gains.side_a, gains.side_b
        ));

        RoundResolution {
            round,
            round_winner: Outcome::from_scores(gains.side_a, gains.side_b).side(),
            description: notes.join(" "),
            detail: ResolutionDetail::Negotiation {
                deal_struck: true,
                deal_price: Some(price),
            },
        }
    }

    fn is_terminal(state: &NegotiationState) -> bool {
        state.deal_price.is_some() || state.round > state.total_rounds
    }

    fn winner(state: &NegotiationState) -> Outcome {
        if state.deal_price.is_none() {
            return Outcome::Draw;
        }
        Outcome::from_scores(state.scores.side_a, state.scores.side_b)
    }

    fn default_move(_state: &NegotiationState, _side: Side) -> NegotiationMove {
        NegotiationMove::propose(50)
    }

    fn round(state: &NegotiationState) -> u32 {
        state.round
    }

    fn advance_round(state: &mut NegotiationState) {
        state.round += 1;
    }

    fn scores(state: &NegotiationState) -> PerSide<i64> {
        state.scores.map(i64::from)
    }

    fn snapshot(state: &NegotiationState) -> StateSnapshot {
        StateSnapshot::Negotiation(state.clone())
    }

    fn private_view(state: &NegotiationState, side: Side) -> PrivateView {
        PrivateView::Negotiation {
            role: match side {
                Side::SideA => "seller",
                Side::SideB => "buyer",
            },
            walkaway: state.walkaway(side),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state() -> NegotiationState {
        NegotiationState::new(5, 30, 70)
    }

    fn resolve(
        state: &mut NegotiationState,
        seller: NegotiationMove,
        buyer: NegotiationMove,
    ) -> RoundResolution {
        SequentialNegotiation::resolve_round(state, &seller, &buyer, &mut GameRng::new(0))
    }

    fn deal(resolution: &RoundResolution) -> Option<u32> {
        match resolution.detail {
            ResolutionDetail::Negotiation { deal_price, .. } => deal_price,
            _ => None,
        }
    }

    #[test]
    fn crossing_offers_settle_at_midpoint() {
        let mut state = state();
        let resolution = resolve(
            &mut state,
            NegotiationMove::propose(50),
            NegotiationMove::counter(60),
        );
        assert_eq!(deal(&resolution), Some(55));
        assert_eq!(state.scores, PerSide::new(25, 15));
        assert_eq!(resolution.round_winner, Some(Side::SideA));
        assert!(SequentialNegotiation::is_terminal(&state));
        assert_eq!(SequentialNegotiation::winner(&state), Outcome::SideA);
    }

    #[test]
    fn proposal_40_and_counter_60_settle_at_50() {
        // Seller floor 30, buyer ceiling 70.
        let mut state = state();
        let resolution = resolve(
            &mut state,
            NegotiationMove::propose(40),
            NegotiationMove::counter(60),
        );
        assert_eq!(deal(&resolution), Some(50));
        assert_eq!(state.deal_price, Some(50));
        assert_eq!(state.deal_round, Some(1));
        assert_eq!(state.scores, PerSide::new(50 - 30, 70 - 50));
        assert_eq!(resolution.round_winner, None);
        assert_eq!(SequentialNegotiation::winner(&state), Outcome::Draw);
    }

    #[test]
    fn accepting_a_proposal_pays_the_proposer_price() {
        let mut state = state();
        let resolution = resolve(&mut state, NegotiationMove::accept(), NegotiationMove::propose(40));
        assert_eq!(deal(&resolution), Some(40));
        assert_eq!(state.deal_round, Some(1));
    }

    #[test]
    fn accepting_the_standing_offer() {
        let mut state = state();
        resolve(&mut state, NegotiationMove::propose(65), NegotiationMove::reject());
        assert_eq!(state.current_offer, Some(65));
        assert_eq!(state.offer_by, Some(Side::SideA));

        SequentialNegotiation::advance_round(&mut state);
        let resolution = resolve(&mut state, NegotiationMove::reject(), NegotiationMove::accept());
        assert_eq!(deal(&resolution), Some(65));
        assert_eq!(state.deal_round, Some(2));
    }

    #[test]
    fn both_accepting_without_an_offer_is_no_deal() {
        let mut state = state();
        let resolution = resolve(&mut state, NegotiationMove::accept(), NegotiationMove::accept());
        assert_eq!(deal(&resolution), None);
        assert!(!SequentialNegotiation::is_terminal(&state));
    }

    #[test]
    fn mutual_bluff_changes_nothing() {
        let mut state = state();
        let before = state.clone();
        let resolution = resolve(&mut state, NegotiationMove::bluff(), NegotiationMove::bluff());
        assert_eq!(state, before);
        assert_eq!(resolution.round_winner, None);
    }

    #[test]
    fn single_bluff_is_counted() {
        let mut state = state();
        resolve(&mut state, NegotiationMove::bluff(), NegotiationMove::propose(40));
        assert_eq!(state.bluffs_used, PerSide::new(1, 0));
        assert_eq!(state.current_offer, Some(40));
        assert_eq!(state.offer_by, Some(Side::SideB));
    }

    #[test]
    fn unsettled_game_is_a_draw() {
        let mut state = NegotiationState::new(1, 30, 70);
        resolve(&mut state, NegotiationMove::propose(90), NegotiationMove::propose(10));
        SequentialNegotiation::advance_round(&mut state);
        assert!(SequentialNegotiation::is_terminal(&state));
        assert_eq!(SequentialNegotiation::winner(&state), Outcome::Draw);
    }

    #[test]
    fn walkaways_leave_a_zone_of_agreement() {
        let config = crate::MatchRequest::new(GameKind::Negotiation, "a", "b", 5)
            .into_config("m", std::time::Duration::ZERO, Some(3))
            .unwrap();
        for seed in 0..50 {
            let state = SequentialNegotiation::initial_state(&config, &mut GameRng::new(seed));
            assert!(SELLER_FLOOR_RANGE.contains(&state.seller_floor));
            assert!(BUYER_CEILING_RANGE.contains(&state.buyer_ceiling));
            assert!(state.seller_floor < state.buyer_ceiling);
        }
    }

    #[test]
    fn walkaways_stay_out_of_the_public_snapshot() {
        let json = serde_json::to_value(SequentialNegotiation::snapshot(&state())).unwrap();
        let public = &json["negotiationState"];
        assert!(public.get("sellerFloor").is_none());
        assert!(public.get("buyerCeiling").is_none());
        assert_eq!(public["round"], 1);
    }

    proptest! {
        #[test]
        fn crossing_implies_deal(ask in 0u32..=100, bid in 0u32..=100) {
            prop_assume!(ask <= bid);
            let mut state = state();
            let resolution = resolve(
                &mut state,
                NegotiationMove::counter(ask),
                NegotiationMove::propose(bid),
            );
            prop_assert_eq!(deal(&resolution), Some((ask + bid) / 2));
        }
    }
}
