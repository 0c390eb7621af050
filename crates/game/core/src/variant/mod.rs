//! Rule sets and the contract every variant satisfies.
//!
//! A [`GameVariant`] is a stateless rule type: it creates the initial state,
//! lists legal moves, and resolves rounds. The orchestrator picks one variant
//! per match from the [`GameKind`] tag and is generic over it afterwards, so no
//! code path branches on the tag inside the round loop.
//!
//! [`GameVariant::resolve_round`] is the only place game state changes apart
//! from the round counter advance. It is synchronous and takes the random
//! source explicitly, which makes every round replayable.

pub mod auction;
pub mod capture;
pub mod gpu;
pub mod negotiation;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{GameKind, MatchConfig};
use crate::error::MoveMismatch;
use crate::rng::GameRng;
use crate::side::{Outcome, PerSide, Side};

pub use auction::{AuctionItem, AuctionKind, AuctionMove, AuctionState, SealedBidAuction, WonItem};
pub use capture::{CaptureKind, CaptureMove, CaptureState, Resource, ResourceCapture};
pub use gpu::{
    BidderKind, BidderMove, DynamicPriceBidding, GpuMove, GpuSku, MarketRole, MarketRoundResult,
    MarketState, ProviderQuote, SellerKind, SellerMove, MARKET_ROUNDS,
};
pub use negotiation::{NegotiationKind, NegotiationMove, NegotiationState, SequentialNegotiation};

/// Shared contract of the four rule sets.
pub trait GameVariant: Send + Sync + 'static {
    type State: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;
    type Move: Clone
        + fmt::Debug
        + PartialEq
        + Send
        + Sync
        + Into<AnyMove>
        + TryFrom<AnyMove, Error = MoveMismatch>
        + 'static;

    const KIND: GameKind;

    /// Builds the starting state; hidden values are drawn from `rng`.
    fn initial_state(config: &MatchConfig, rng: &mut GameRng) -> Self::State;

    /// Finite set of legal moves, for introspection only. Moves outside this
    /// set are clamped during resolution, never rejected.
    fn valid_moves(state: &Self::State, side: Side) -> Vec<Self::Move>;

    /// Resolves one round, mutating `state` in place.
    fn resolve_round(
        state: &mut Self::State,
        side_a: &Self::Move,
        side_b: &Self::Move,
        rng: &mut GameRng,
    ) -> RoundResolution;

    fn is_terminal(state: &Self::State) -> bool;

    fn winner(state: &Self::State) -> Outcome;

    /// Converts a decision source's move into one `side` may play.
    fn accept_move(side: Side, mv: AnyMove) -> Result<Self::Move, MoveMismatch> {
        let _ = side;
        Self::Move::try_from(mv)
    }

    /// Fallback used when a side's decision source fails.
    fn default_move(state: &Self::State, side: Side) -> Self::Move;

    /// Current round, starting at 1.
    fn round(state: &Self::State) -> u32;

    fn advance_round(state: &mut Self::State);

    fn scores(state: &Self::State) -> PerSide<i64>;

    /// Public view of the state, safe to stream to both sides.
    fn snapshot(state: &Self::State) -> StateSnapshot;

    /// Hidden information visible only to `side`.
    fn private_view(state: &Self::State, side: Side) -> PrivateView;
}

/// Public state of whichever variant is running.
///
/// Serialized externally tagged, so the key names the variant
/// (`gameState`, `negotiationState`, `auctionState`, `marketState`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum StateSnapshot {
    #[serde(rename = "gameState")]
    ResourceCapture(CaptureState),
    #[serde(rename = "negotiationState")]
    Negotiation(NegotiationState),
    #[serde(rename = "auctionState")]
    Auction(AuctionState),
    #[serde(rename = "marketState")]
    GpuBidding(MarketState),
}

impl StateSnapshot {
    pub fn kind(&self) -> GameKind {
        match self {
            StateSnapshot::ResourceCapture(_) => GameKind::ResourceCapture,
            StateSnapshot::Negotiation(_) => GameKind::Negotiation,
            StateSnapshot::Auction(_) => GameKind::Auction,
            StateSnapshot::GpuBidding(_) => GameKind::GpuBidding,
        }
    }

    /// JSON key under which this snapshot is streamed.
    pub fn state_key(&self) -> &'static str {
        match self {
            StateSnapshot::ResourceCapture(_) => "gameState",
            StateSnapshot::Negotiation(_) => "negotiationState",
            StateSnapshot::Auction(_) => "auctionState",
            StateSnapshot::GpuBidding(_) => "marketState",
        }
    }

    /// Rounds the variant will actually play. The auction caps this at its
    /// item count and the GPU marketplace at [`MARKET_ROUNDS`].
    pub fn total_rounds(&self) -> u32 {
        match self {
            StateSnapshot::ResourceCapture(state) => state.total_rounds,
            StateSnapshot::Negotiation(state) => state.total_rounds,
            StateSnapshot::Auction(state) => state.total_rounds,
            StateSnapshot::GpuBidding(state) => state.total_rounds,
        }
    }

    /// Short SHA-256 commitment to the public state: the first 8 bytes of the
    /// digest of its JSON encoding, hex-encoded.
    pub fn state_hash(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        if let Ok(bytes) = serde_json::to_vec(self) {
            hasher.update(&bytes);
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }
}

/// Per-side hidden information handed to that side's decision source.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrivateView {
    #[serde(rename_all = "camelCase")]
    ResourceCapture { economy_bonus: u32 },
    #[serde(rename_all = "camelCase")]
    Negotiation { role: &'static str, walkaway: u32 },
    #[serde(rename_all = "camelCase")]
    Auction {
        credits: u32,
        current_valuation: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    GpuBidding {
        role: MarketRole,
        objective: &'static str,
        cheapest_quote: Option<(String, u32)>,
    },
}

/// Outcome of a single round.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResolution {
    pub round: u32,
    pub round_winner: Option<Side>,
    pub description: String,
    pub detail: ResolutionDetail,
}

/// Variant-specific deltas of a round.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolutionDetail {
    #[serde(rename_all = "camelCase")]
    ResourceCapture {
        resource_changes: std::collections::BTreeMap<Resource, PerSide<u32>>,
    },
    #[serde(rename_all = "camelCase")]
    Negotiation {
        deal_struck: bool,
        deal_price: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    Auction {
        item_name: Option<String>,
        winning_bid: u32,
        paid: Option<u32>,
    },
    GpuBidding(MarketRoundResult),
}

/// A move from any variant.
///
/// This is the currency at the decision-source boundary and in the event
/// stream. Kind names are distinct per variant except the auction/bidder
/// overlap (`bid`, `pass`), which the bidder's required `sku` disambiguates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnyMove {
    ResourceCapture(CaptureMove),
    Negotiation(NegotiationMove),
    Bidder(BidderMove),
    Auction(AuctionMove),
    Seller(SellerMove),
}

/// How well a guessed move matched the move actually played.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    /// Same kind and same key parameter.
    Exact,
    /// Same kind only.
    Partial,
    Miss,
}

impl AnyMove {
    /// Snake-case name of the move kind, e.g. `aggressive_bid`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnyMove::ResourceCapture(m) => m.kind.into(),
            AnyMove::Negotiation(m) => m.kind.into(),
            AnyMove::Auction(m) => m.kind.into(),
            AnyMove::Bidder(m) => m.kind.into(),
            AnyMove::Seller(m) => m.kind.into(),
        }
    }

    /// The parameter that distinguishes two moves of the same kind: pool
    /// target, price, bid amount, or SKU.
    pub fn key_param(&self) -> String {
        match self {
            AnyMove::ResourceCapture(m) => m.target.to_string(),
            AnyMove::Negotiation(m) => m.price.to_string(),
            AnyMove::Auction(m) => m.amount.to_string(),
            AnyMove::Bidder(m) => m.sku.clone(),
            AnyMove::Seller(m) => m.sku.clone().unwrap_or_default(),
        }
    }

    pub fn game(&self) -> GameKind {
        match self {
            AnyMove::ResourceCapture(_) => GameKind::ResourceCapture,
            AnyMove::Negotiation(_) => GameKind::Negotiation,
            AnyMove::Auction(_) => GameKind::Auction,
            AnyMove::Bidder(_) | AnyMove::Seller(_) => GameKind::GpuBidding,
        }
    }

    /// Grades `self` as a guess against the move that was actually played.
    pub fn grade(&self, actual: &AnyMove) -> MatchQuality {
        if self.kind_name() != actual.kind_name() {
            MatchQuality::Miss
        } else if self.key_param() == actual.key_param() {
            MatchQuality::Exact
        } else {
            MatchQuality::Partial
        }
    }
}

impl fmt::Display for AnyMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind_name(), self.key_param())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_uses_kind_and_key() {
        let actual: AnyMove = CaptureMove::new(CaptureKind::AggressiveBid, Resource::A, 80).into();
        let exact: AnyMove = CaptureMove::new(CaptureKind::AggressiveBid, Resource::A, 20).into();
        let partial: AnyMove = CaptureMove::new(CaptureKind::AggressiveBid, Resource::C, 80).into();
        let miss: AnyMove = CaptureMove::new(CaptureKind::Counter, Resource::A, 80).into();

        assert_eq!(exact.grade(&actual), MatchQuality::Exact);
        assert_eq!(partial.grade(&actual), MatchQuality::Partial);
        assert_eq!(miss.grade(&actual), MatchQuality::Miss);
    }

    #[test]
    fn state_hash_tracks_public_state() {
        let mut state = CaptureState::new(10);
        let before = StateSnapshot::ResourceCapture(state.clone()).state_hash();
        assert_eq!(before.len(), 16);
        assert_eq!(before, StateSnapshot::ResourceCapture(state.clone()).state_hash());

        state.round += 1;
        assert_ne!(before, StateSnapshot::ResourceCapture(state).state_hash());
    }

    #[test]
    fn untagged_moves_round_trip_to_the_right_variant() {
        let auction: AnyMove = serde_json::from_str(r#"{"type":"bid","amount":120}"#).unwrap();
        assert!(matches!(auction, AnyMove::Auction(_)));

        let bidder: AnyMove =
            serde_json::from_str(r#"{"type":"bid","amount":300,"sku":"NVIDIA A100","hours":2}"#)
                .unwrap();
        assert!(matches!(bidder, AnyMove::Bidder(_)));

        let negotiation: AnyMove =
            serde_json::from_str(r#"{"type":"counter_offer","price":60}"#).unwrap();
        assert_eq!(negotiation.to_string(), "counter_offer_60");

        let capture: AnyMove =
            serde_json::from_str(r#"{"type":"retreat","target":"B","amount":40}"#).unwrap();
        assert_eq!(capture.game(), GameKind::ResourceCapture);

        let seller: AnyMove = serde_json::from_str(r#"{"type":"hold"}"#).unwrap();
        assert!(matches!(seller, AnyMove::Seller(_)));
    }
}
