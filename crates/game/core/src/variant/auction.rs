//! Sealed-bid auction over a fixed lot of eight items.
//!
//! Each side holds a private valuation for every item. A bluff bid competes at
//! its full declared amount but the winner pays only half of it.

use serde::{Deserialize, Serialize};

use super::{
    AnyMove, GameVariant, PrivateView, ResolutionDetail, RoundResolution, StateSnapshot,
};
use crate::config::{GameKind, MatchConfig};
use crate::error::MoveMismatch;
use crate::rng::GameRng;
use crate::side::{Outcome, PerSide, Side};

pub const STARTING_CREDITS: u32 = 1000;
pub const TOTAL_ITEMS: u32 = 8;

/// Valuation offset drawn per side and item, relative to the base value.
pub const VALUATION_JITTER: std::ops::RangeInclusive<i64> = -30..=50;

const ITEM_TEMPLATES: [(&str, u32); TOTAL_ITEMS as usize] = [
    ("Alpha Core", 100),
    ("Beta Shield", 80),
    ("Gamma Drive", 120),
    ("Delta Array", 90),
    ("Epsilon Node", 110),
    ("Zeta Link", 70),
    ("Eta Pulse", 130),
    ("Theta Grid", 95),
];

const MAX_LISTED_BID: u32 = 500;

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
pub enum AuctionKind {
    Bid,
    Pass,
    BluffBid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuctionMove {
    #[serde(rename = "type")]
    pub kind: AuctionKind,
    #[serde(default)]
    pub amount: u32,
}

impl AuctionMove {
    pub const fn bid(amount: u32) -> Self {
        Self {
            kind: AuctionKind::Bid,
            amount,
        }
    }

    pub const fn bluff(amount: u32) -> Self {
        Self {
            kind: AuctionKind::BluffBid,
            amount,
        }
    }

    pub const fn pass() -> Self {
        Self {
            kind: AuctionKind::Pass,
            amount: 0,
        }
    }

    /// Amount the move competes with, capped by the bidder's credits.
    fn effective_bid(&self, credits: u32) -> u32 {
        match self.kind {
            AuctionKind::Pass => 0,
            AuctionKind::Bid | AuctionKind::BluffBid => self.amount.min(credits),
        }
    }
}

impl From<AuctionMove> for AnyMove {
    fn from(value: AuctionMove) -> Self {
        AnyMove::Auction(value)
    }
}

impl TryFrom<AnyMove> for AuctionMove {
    type Error = MoveMismatch;

    fn try_from(value: AnyMove) -> Result<Self, Self::Error> {
        match value {
            AnyMove::Auction(m) => Ok(m),
            other => Err(MoveMismatch {
                expected: GameKind::Auction,
                found: other.kind_name(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionItem {
    pub name: String,
    pub base_value: u32,
    #[serde(skip)]
    pub valuations: PerSide<u32>,
}

/// Ledger entry for an item a side won.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WonItem {
    pub name: String,
    pub bid: u32,
    pub paid: u32,
    pub valuation: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionState {
    pub round: u32,
    pub total_rounds: u32,
    pub credits: PerSide<u32>,
    pub items: Vec<AuctionItem>,
    pub won_items: PerSide<Vec<WonItem>>,
    /// Sum of valuation minus payment over won items; may go negative.
    pub scores: PerSide<i64>,
    pub total_spent: PerSide<u32>,
    pub bluffs_used: PerSide<u32>,
}

impl AuctionState {
    pub fn new(total_rounds: u32, items: Vec<AuctionItem>) -> Self {
        Self {
            round: 1,
            total_rounds: total_rounds.min(TOTAL_ITEMS),
            credits: PerSide::splat(STARTING_CREDITS),
            items,
            won_items: PerSide::default(),
            scores: PerSide::default(),
            total_spent: PerSide::default(),
            bluffs_used: PerSide::default(),
        }
    }

    /// Item on the block this round.
    pub fn current_item(&self) -> Option<&AuctionItem> {
        let index = usize::try_from(self.round.checked_sub(1)?).ok()?;
        self.items.get(index)
    }

    pub fn items_remaining(&self) -> usize {
        self.items.len().saturating_sub(self.round as usize)
    }
}

/// Draws the lot with per-side private valuations.
pub fn generate_items(rng: &mut GameRng) -> Vec<AuctionItem> {
    ITEM_TEMPLATES
        .iter()
        .map(|&(name, base)| {
            let valuations = PerSide::from_fn(|_| {
                let value = i64::from(base) + rng.range(VALUATION_JITTER);
                u32::try_from(value.max(0)).unwrap_or(0)
            });
            AuctionItem {
                name: name.to_string(),
                base_value: base,
                valuations,
            }
        })
        .collect()
}

/// Sealed-bid auction rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedBidAuction;

impl GameVariant for SealedBidAuction {
    type State = AuctionState;
    type Move = AuctionMove;

    const KIND: GameKind = GameKind::Auction;

    fn initial_state(config: &MatchConfig, rng: &mut GameRng) -> AuctionState {
        AuctionState::new(config.total_rounds, generate_items(rng))
    }

    fn valid_moves(state: &AuctionState, side: Side) -> Vec<AuctionMove> {
        let mut moves = vec![AuctionMove::pass()];
        if state.current_item().is_none() {
            return moves;
        }
        let cap = state.credits[side].min(MAX_LISTED_BID);
        moves.extend((10..=cap).step_by(10).map(AuctionMove::bid));
        moves.extend((50..=cap).step_by(50).map(AuctionMove::bluff));
        moves
    }

    fn resolve_round(
        state: &mut AuctionState,
        side_a: &AuctionMove,
        side_b: &AuctionMove,
        rng: &mut GameRng,
    ) -> RoundResolution {
        let round = state.round;
        let Some(item) = state.current_item().cloned() else {
            return RoundResolution {
                round,
                round_winner: None,
                description: "No item to auction.".to_string(),
                detail: ResolutionDetail::Auction {
                    item_name: None,
                    winning_bid: 0,
                    paid: None,
                },
            };
        };

        let moves = PerSide::new(*side_a, *side_b);
        for side in Side::BOTH {
            if moves[side].kind == AuctionKind::BluffBid {
                state.bluffs_used[side] += 1;
            }
        }
        let bids = PerSide::from_fn(|side| moves[side].effective_bid(state.credits[side]));
        let winning_bid = bids.side_a.max(bids.side_b);

        let mut notes = vec![format!(
            "Item: {} (base value: {}).",
            item.name, item.base_value
        )];

        let winner = match Outcome::from_scores(bids.side_a, bids.side_b) {
            Outcome::Draw if winning_bid == 0 => None,
            Outcome::Draw => {
                let side = if rng.coin_flip() {
                    Side::SideA
                } else {
                    Side::SideB
                };
                notes.push(format!(
                    "Tied bids at {winning_bid}! {} wins the tiebreak.",
                    side.label()
                ));
                Some(side)
            }
            decided => decided.side(),
        };

        let Some(winner) = winner else {
            notes.push("Both sides pass. Item goes unsold.".to_string());
            return RoundResolution {
                round,
                round_winner: None,
                description: notes.join(" "),
                detail: ResolutionDetail::Auction {
                    item_name: Some(item.name),
                    winning_bid: 0,
                    paid: None,
                },
            };
        };

        let bid = bids[winner];
        let paid = match moves[winner].kind {
            AuctionKind::BluffBid => bid / 2,
            _ => bid,
        }
        .min(state.credits[winner]);
        let valuation = item.valuations[winner];
        let net = i64::from(valuation) - i64::from(paid);

        state.credits[winner] -= paid;
        state.total_spent[winner] += paid;
        state.scores[winner] += net;
        state.won_items[winner].push(WonItem {
            name: item.name.clone(),
            bid,
            paid,
            valuation,
        });
        notes.push(format!(
            "{} wins with bid {bid} (paid {paid}). Net value: {net}.",
            winner.label()
        ));

        RoundResolution {
            round,
            round_winner: Some(winner),
            description: notes.join(" "),
            detail: ResolutionDetail::Auction {
                item_name: Some(item.name),
                winning_bid,
                paid: Some(paid),
            },
        }
    }

    fn is_terminal(state: &AuctionState) -> bool {
        state.round > state.total_rounds || (state.credits.side_a == 0 && state.credits.side_b == 0)
    }

    fn winner(state: &AuctionState) -> Outcome {
        Outcome::from_scores(state.scores.side_a, state.scores.side_b)
    }

    fn default_move(_state: &AuctionState, _side: Side) -> AuctionMove {
        AuctionMove::bid(50)
    }

    fn round(state: &AuctionState) -> u32 {
        state.round
    }

    fn advance_round(state: &mut AuctionState) {
        state.round += 1;
    }

    fn scores(state: &AuctionState) -> PerSide<i64> {
        state.scores
    }

    fn snapshot(state: &AuctionState) -> StateSnapshot {
        StateSnapshot::Auction(state.clone())
    }

    fn private_view(state: &AuctionState, side: Side) -> PrivateView {
        PrivateView::Auction {
            credits: state.credits[side],
            current_valuation: state.current_item().map(|item| item.valuations[side]),
        }
    }
}
