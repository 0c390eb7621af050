//! Dynamic-price GPU bidding: a bidder (side A) against a seller (side B).
//!
//! The seller adjusts the active SKU's price first, then the bidder's move is
//! matched against it. After the transaction the market takes one random-walk
//! step and the next active SKU is drawn by demand.

mod market;

pub use market::{
    GpuSku, MarketRole, MarketRoundResult, MarketState, ProviderQuote, DEMAND_HISTORY_LEN,
    MARKET_ROUNDS, STARTING_BUDGET,
};

use serde::{Deserialize, Serialize};

use super::{
    AnyMove, AuctionKind, GameVariant, PrivateView, ResolutionDetail, RoundResolution,
    StateSnapshot,
};
use crate::config::{GameKind, MatchConfig};
use crate::error::MoveMismatch;
use crate::rng::GameRng;
use crate::side::{Outcome, PerSide, Side};

use market::scale;

pub const MIN_HOURS: u32 = 1;
pub const MAX_HOURS: u32 = 24;
pub const ADJUSTMENT_BOUNDS: (f64, f64) = (-0.5, 1.0);

const SURGE_PREMIUM: f64 = 1.3;
const WAIT_COOLING: f64 = 0.05;
const GOOD_DEAL_RATIO: f64 = 0.9;
const PREMIUM_RATIO: f64 = 1.2;
const WIN_MARGIN: f64 = 1.1;

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
pub enum BidderKind {
    Bid,
    Pass,
    /// Skips the round and cools demand for the active SKU.
    Wait,
    /// Pays a 1.3x premium for guaranteed access.
    SurgeBid,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidderMove {
    #[serde(rename = "type")]
    pub kind: BidderKind,
    #[serde(default)]
    pub amount: u32,
    pub sku: String,
    #[serde(default = "default_hours")]
    pub hours: u32,
}

fn default_hours() -> u32 {
    MIN_HOURS
}

impl BidderMove {
    pub fn new(kind: BidderKind, amount: u32, sku: impl Into<String>, hours: u32) -> Self {
        Self {
            kind,
            amount,
            sku: sku.into(),
            hours,
        }
    }

    pub fn pass(sku: impl Into<String>) -> Self {
        Self::new(BidderKind::Pass, 0, sku, MIN_HOURS)
    }
}

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
pub enum SellerKind {
    SetPrice,
    SurgePricing,
    Discount,
    Hold,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SellerMove {
    #[serde(rename = "type")]
    pub kind: SellerKind,
    #[serde(default)]
    pub adjustment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl SellerMove {
    pub fn new(kind: SellerKind, adjustment: f64) -> Self {
        Self {
            kind,
            adjustment,
            sku: None,
        }
    }

    pub fn hold() -> Self {
        Self::new(SellerKind::Hold, 0.0)
    }

    fn clamped_adjustment(&self) -> f64 {
        if self.adjustment.is_nan() {
            return 0.0;
        }
        self.adjustment
            .clamp(ADJUSTMENT_BOUNDS.0, ADJUSTMENT_BOUNDS.1)
    }

    /// Price of `sku` after this adjustment.
    fn apply(&self, sku: &mut GpuSku) {
        let adj = self.clamped_adjustment();
        match self.kind {
            SellerKind::SurgePricing => {
                sku.current_price = scale(sku.base_price, 1.0 + adj.abs());
                sku.surge_active = true;
            }
            SellerKind::Discount => {
                sku.current_price = scale(sku.base_price, (1.0 - adj.abs()).max(0.5));
                sku.surge_active = false;
            }
            SellerKind::SetPrice => {
                sku.current_price = scale(sku.base_price, 1.0 + adj);
            }
            SellerKind::Hold => {}
        }
    }
}

/// A move in the GPU market: the bidder's or the seller's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpuMove {
    Bidder(BidderMove),
    Seller(SellerMove),
}

impl From<BidderMove> for GpuMove {
    fn from(value: BidderMove) -> Self {
        GpuMove::Bidder(value)
    }
}

impl From<SellerMove> for GpuMove {
    fn from(value: SellerMove) -> Self {
        GpuMove::Seller(value)
    }
}

impl From<BidderMove> for AnyMove {
    fn from(value: BidderMove) -> Self {
        AnyMove::Bidder(value)
    }
}

impl From<SellerMove> for AnyMove {
    fn from(value: SellerMove) -> Self {
        AnyMove::Seller(value)
    }
}

impl From<GpuMove> for AnyMove {
    fn from(value: GpuMove) -> Self {
        match value {
            GpuMove::Bidder(m) => AnyMove::Bidder(m),
            GpuMove::Seller(m) => AnyMove::Seller(m),
        }
    }
}

impl TryFrom<AnyMove> for GpuMove {
    type Error = MoveMismatch;

    fn try_from(value: AnyMove) -> Result<Self, Self::Error> {
        match value {
            AnyMove::Bidder(m) => Ok(GpuMove::Bidder(m)),
            AnyMove::Seller(m) => Ok(GpuMove::Seller(m)),
            // A bid or pass without a SKU parses as an auction move.
            AnyMove::Auction(m) => {
                let kind = match m.kind {
                    AuctionKind::Bid => BidderKind::Bid,
                    AuctionKind::Pass => BidderKind::Pass,
                    AuctionKind::BluffBid => {
                        return Err(MoveMismatch {
                            expected: GameKind::GpuBidding,
                            found: AnyMove::Auction(m).kind_name(),
                        });
                    }
                };
                Ok(GpuMove::Bidder(BidderMove::new(kind, m.amount, "", MIN_HOURS)))
            }
            other => Err(MoveMismatch {
                expected: GameKind::GpuBidding,
                found: other.kind_name(),
            }),
        }
    }
}

/// GPU bidding rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicPriceBidding;

impl DynamicPriceBidding {
    fn bidder_move(mv: &GpuMove, sku: &str) -> BidderMove {
        match mv {
            GpuMove::Bidder(m) => m.clone(),
            GpuMove::Seller(_) => BidderMove::pass(sku),
        }
    }

    fn seller_move(mv: &GpuMove) -> SellerMove {
        match mv {
            GpuMove::Seller(m) => m.clone(),
            GpuMove::Bidder(_) => SellerMove::hold(),
        }
    }

    /// Bidder and seller scores used for the overall verdict.
    pub fn verdict_scores(state: &MarketState) -> (f64, f64) {
        let expected_revenue = state.mean_base_price() * f64::from(state.units_sold);
        let revenue_ratio = state.seller_revenue as f64 / expected_revenue.max(1.0);
        let bidder = state.cost_efficiency * 100.0;
        (bidder, revenue_ratio)
    }
}

impl GameVariant for DynamicPriceBidding {
    type State = MarketState;
    type Move = GpuMove;

    const KIND: GameKind = GameKind::GpuBidding;

    fn initial_state(config: &MatchConfig, rng: &mut GameRng) -> MarketState {
        MarketState::new(config.total_rounds, rng)
    }

    /// The bidder may only play bidder moves and the seller only seller moves.
    fn accept_move(side: Side, mv: AnyMove) -> Result<GpuMove, MoveMismatch> {
        let found = mv.kind_name();
        let mv = GpuMove::try_from(mv)?;
        match (MarketRole::of(side), &mv) {
            (MarketRole::Bidder, GpuMove::Bidder(_)) | (MarketRole::Seller, GpuMove::Seller(_)) => {
                Ok(mv)
            }
            _ => Err(MoveMismatch {
                expected: GameKind::GpuBidding,
                found,
            }),
        }
    }

    fn valid_moves(state: &MarketState, side: Side) -> Vec<GpuMove> {
        match MarketRole::of(side) {
            MarketRole::Bidder => {
                let Some(sku) = state.active() else {
                    return vec![BidderMove::pass("").into()];
                };
                let mut moves: Vec<GpuMove> = vec![
                    BidderMove::pass(&sku.name).into(),
                    BidderMove::new(BidderKind::Wait, 0, &sku.name, MIN_HOURS).into(),
                ];
                for factor in [0.8, 0.9, 1.0, 1.1] {
                    let amount = scale(sku.current_price, factor);
                    for hours in [1, 2, 4] {
                        moves.push(BidderMove::new(BidderKind::Bid, amount, &sku.name, hours).into());
                    }
                }
                let premium = scale(sku.current_price, SURGE_PREMIUM);
                moves.push(BidderMove::new(BidderKind::SurgeBid, premium, &sku.name, 1).into());
                moves
            }
            MarketRole::Seller => {
                let mut moves: Vec<GpuMove> = vec![SellerMove::hold().into()];
                moves.extend(
                    [-0.2, -0.1, 0.1, 0.2]
                        .map(|adj| GpuMove::from(SellerMove::new(SellerKind::SetPrice, adj))),
                );
                moves.extend(
                    [0.2, 0.3, 0.5]
                        .map(|adj| GpuMove::from(SellerMove::new(SellerKind::SurgePricing, adj))),
                );
                moves.extend(
                    [0.1, 0.15, 0.25]
                        .map(|adj| GpuMove::from(SellerMove::new(SellerKind::Discount, adj))),
                );
                moves
            }
        }
    }

    fn resolve_round(
        state: &mut MarketState,
        side_a: &GpuMove,
        side_b: &GpuMove,
        rng: &mut GameRng,
    ) -> RoundResolution {
        let round = state.round;
        let bidder = Self::bidder_move(side_a, &state.active_sku);
        let seller = Self::seller_move(side_b);
        let budget = state.bidder_budget;

        let mut transaction = None;
        let mut favoured = None;
        let sku_name = state.active_sku.clone();
        if let Some(sku) = state.active_mut() {
            seller.apply(sku);

            let price = sku.current_price;
            let hours = bidder.hours.clamp(MIN_HOURS, MAX_HOURS);
            match bidder.kind {
                BidderKind::Bid if bidder.amount >= price && price <= budget => {
                    transaction = Some((price, sku.compute_units * hours));
                    let ratio = sku.price_ratio();
                    favoured = if ratio < GOOD_DEAL_RATIO {
                        Some(MarketRole::Bidder)
                    } else if ratio > PREMIUM_RATIO {
                        Some(MarketRole::Seller)
                    } else {
                        None
                    };
                }
                BidderKind::SurgeBid => {
                    let premium = scale(price, SURGE_PREMIUM);
                    if bidder.amount >= premium && premium <= budget {
                        transaction = Some((premium, sku.compute_units * hours));
                        favoured = Some(MarketRole::Seller);
                    }
                }
                BidderKind::Wait => {
                    sku.demand_level = (sku.demand_level - WAIT_COOLING).max(0.1);
                }
                BidderKind::Bid | BidderKind::Pass => {}
            }
        }

        let mut provider = None;
        let (final_price, compute_gained) = transaction.unwrap_or((0, 0));
        if transaction.is_some() {
            state.bidder_budget -= final_price;
            state.compute_acquired += u64::from(compute_gained);
            state.seller_revenue += u64::from(final_price);
            state.units_sold += 1;
            state.cost_efficiency =
                state.compute_acquired as f64 / f64::from(state.total_spent().max(1));
            state.scores = PerSide::new(
                i64::try_from(state.compute_acquired).unwrap_or(i64::MAX),
                i64::try_from(state.seller_revenue / 100).unwrap_or(i64::MAX),
            );
            if let Some((name, _)) = state.cheapest_quote(&sku_name) {
                state.credit_provider(&name, final_price);
                provider = Some(name);
            }
        }

        let description = match transaction {
            Some(_) => format!(
                "Bidder acquires {compute_gained} compute units of {sku_name} for {final_price} credits."
            ),
            None => format!(
                "No transaction on {sku_name}: bidder played {}, seller played {}.",
                <&str>::from(bidder.kind),
                <&str>::from(seller.kind)
            ),
        };

        let result = MarketRoundResult {
            round,
            sku: sku_name,
            bidder_move: bidder,
            seller_move: seller,
            transaction_occurred: transaction.is_some(),
            final_price,
            compute_gained,
            budget_after: state.bidder_budget,
            revenue_after: state.seller_revenue,
            provider,
            market_demand: state.market_demand,
            favoured,
        };
        state.round_results.push(result.clone());

        state.update_market_demand(rng);
        state.select_active_sku(rng);

        RoundResolution {
            round,
            round_winner: favoured.map(MarketRole::side),
            description,
            detail: ResolutionDetail::GpuBidding(result),
        }
    }

    fn is_terminal(state: &MarketState) -> bool {
        state.round > state.total_rounds || state.bidder_budget == 0
    }

    fn winner(state: &MarketState) -> Outcome {
        let (bidder, seller) = Self::verdict_scores(state);
        if bidder > seller * WIN_MARGIN {
            Outcome::SideA
        } else if seller > bidder * WIN_MARGIN {
            Outcome::SideB
        } else {
            Outcome::Draw
        }
    }

    fn default_move(state: &MarketState, side: Side) -> GpuMove {
        match MarketRole::of(side) {
            MarketRole::Bidder => match state.active() {
                Some(sku) if state.bidder_budget >= sku.current_price => {
                    BidderMove::new(BidderKind::Bid, sku.current_price, &sku.name, 1).into()
                }
                _ => BidderMove::pass(&state.active_sku).into(),
            },
            MarketRole::Seller => {
                let mut mv = if state.market_demand > 0.7 {
                    SellerMove::new(SellerKind::SurgePricing, 0.3)
                } else if state.market_demand < 0.4 {
                    SellerMove::new(SellerKind::Discount, 0.15)
                } else {
                    SellerMove::hold()
                };
                if mv.kind != SellerKind::Hold {
                    mv.sku = Some(state.active_sku.clone());
                }
                mv.into()
            }
        }
    }

    fn round(state: &MarketState) -> u32 {
        state.round
    }

    fn advance_round(state: &mut MarketState) {
        state.round += 1;
    }

    fn scores(state: &MarketState) -> PerSide<i64> {
        state.scores
    }

    fn snapshot(state: &MarketState) -> StateSnapshot {
        StateSnapshot::GpuBidding(state.clone())
    }

    fn private_view(state: &MarketState, side: Side) -> PrivateView {
        let role = MarketRole::of(side);
        PrivateView::GpuBidding {
            role,
            objective: role.objective(),
            cheapest_quote: match role {
                MarketRole::Bidder => state.cheapest_quote(&state.active_sku),
                MarketRole::Seller => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchRequest;
    use crate::variant::AuctionMove;

    fn market() -> MarketState {
        let mut state = MarketState::new(10, &mut GameRng::new(21));
        for sku in &mut state.skus {
            sku.current_price = sku.base_price;
            sku.surge_active = false;
        }
        state.active_sku = "NVIDIA A100".into();
        state
    }

    fn resolve(state: &mut MarketState, a: GpuMove, b: GpuMove) -> MarketRoundResult {
        let resolution =
            DynamicPriceBidding::resolve_round(state, &a, &b, &mut GameRng::new(8));
        match resolution.detail {
            ResolutionDetail::GpuBidding(result) => result,
            other => panic!("unexpected detail {other:?}"),
        }
    }

    fn bid(amount: u32, hours: u32) -> GpuMove {
        BidderMove::new(BidderKind::Bid, amount, "NVIDIA A100", hours).into()
    }

    #[test]
    fn discounted_bid_favours_the_bidder() {
        let mut state = market();
        let result = resolve(
            &mut state,
            bid(300, 2),
            SellerMove::new(SellerKind::Discount, 0.2).into(),
        );
        assert!(result.transaction_occurred);
        assert_eq!(result.final_price, 240);
        assert_eq!(result.compute_gained, 160);
        assert_eq!(result.favoured, Some(MarketRole::Bidder));
        assert_eq!(state.bidder_budget, STARTING_BUDGET - 240);
        assert_eq!(state.scores, PerSide::new(160, 2));
        assert_eq!(state.round_results.len(), 1);
        assert!(result.provider.is_some());
    }

    #[test]
    fn bid_below_price_fails() {
        let mut state = market();
        let result = resolve(
            &mut state,
            bid(300, 1),
            SellerMove::new(SellerKind::SurgePricing, 0.5).into(),
        );
        assert!(!result.transaction_occurred);
        assert_eq!(state.bidder_budget, STARTING_BUDGET);
        assert_eq!(state.units_sold, 0);
    }

    #[test]
    fn surge_bid_pays_premium_and_favours_seller() {
        let mut state = market();
        let result = resolve(
            &mut state,
            BidderMove::new(BidderKind::SurgeBid, 1000, "NVIDIA A100", 1).into(),
            SellerMove::hold().into(),
        );
        assert_eq!(result.final_price, 390);
        assert_eq!(result.favoured, Some(MarketRole::Seller));
    }

    #[test]
    fn bid_beyond_budget_is_refused() {
        let mut state = market();
        state.bidder_budget = 100;
        let result = resolve(&mut state, bid(5000, 1), SellerMove::hold().into());
        assert!(!result.transaction_occurred);
        assert_eq!(state.bidder_budget, 100);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut state = market();
        let result = resolve(
            &mut state,
            bid(10_000, 99),
            SellerMove::new(SellerKind::SetPrice, 7.0).into(),
        );
        // Adjustment clamps to +1.0 and hours to 24.
        assert_eq!(result.final_price, 600);
        assert_eq!(result.compute_gained, 80 * MAX_HOURS);
    }

    #[test]
    fn wrong_role_moves_become_pass_and_hold() {
        let mut state = market();
        let result = resolve(&mut state, SellerMove::hold().into(), bid(400, 1));
        assert_eq!(result.bidder_move.kind, BidderKind::Pass);
        assert_eq!(result.seller_move.kind, SellerKind::Hold);
        assert!(!result.transaction_occurred);
    }

    #[test]
    fn round_ends_with_a_market_step() {
        let mut state = market();
        resolve(&mut state, SellerMove::hold().into(), SellerMove::hold().into());
        assert_eq!(state.demand_history.len(), 1);
        assert!(state.active().is_some());
    }

    #[test]
    fn verdict_needs_a_ten_percent_margin() {
        let mut state = market();
        assert_eq!(DynamicPriceBidding::winner(&state), Outcome::Draw);

        state.units_sold = 1;
        state.seller_revenue = 1000;
        state.cost_efficiency = 0.001;
        assert_eq!(DynamicPriceBidding::winner(&state), Outcome::SideB);

        state.cost_efficiency = 0.5;
        assert_eq!(DynamicPriceBidding::winner(&state), Outcome::SideA);
    }

    #[test]
    fn default_moves_follow_role() {
        let mut state = market();
        let GpuMove::Bidder(bidder) = DynamicPriceBidding::default_move(&state, Side::SideA)
        else {
            panic!("bidder default must be a bidder move");
        };
        assert_eq!(bidder.kind, BidderKind::Bid);
        assert_eq!(bidder.amount, 300);

        state.market_demand = 0.9;
        let GpuMove::Seller(seller) = DynamicPriceBidding::default_move(&state, Side::SideB)
        else {
            panic!("seller default must be a seller move");
        };
        assert_eq!(seller.kind, SellerKind::SurgePricing);

        state.bidder_budget = 10;
        let GpuMove::Bidder(bidder) = DynamicPriceBidding::default_move(&state, Side::SideA)
        else {
            panic!("bidder default must be a bidder move");
        };
        assert_eq!(bidder.kind, BidderKind::Pass);
    }

    #[test]
    fn skuless_auction_bid_is_accepted_for_the_bidder() {
        let mv: AnyMove = serde_json::from_str(r#"{"type":"pass"}"#).unwrap();
        let gpu = GpuMove::try_from(mv).unwrap();
        assert!(matches!(gpu, GpuMove::Bidder(BidderMove { kind: BidderKind::Pass, .. })));
    }

    #[test]
    fn private_view_reveals_quotes_to_bidder_only() {
        let state = market();
        let PrivateView::GpuBidding { cheapest_quote, .. } =
            DynamicPriceBidding::private_view(&state, Side::SideA)
        else {
            panic!("expected a market view");
        };
        assert!(cheapest_quote.is_some());
        let PrivateView::GpuBidding { cheapest_quote, role, .. } =
            DynamicPriceBidding::private_view(&state, Side::SideB)
        else {
            panic!("expected a market view");
        };
        assert_eq!(role, MarketRole::Seller);
        assert!(cheapest_quote.is_none());
    }

    #[test]
    fn market_session_is_capped_at_ten_rounds() {
        let config = MatchRequest::new(GameKind::GpuBidding, "a", "b", 25)
            .into_config("match_gpu", std::time::Duration::ZERO, Some(4))
            .unwrap();
        let state = DynamicPriceBidding::initial_state(&config, &mut GameRng::new(4));
        assert_eq!(state.total_rounds, MARKET_ROUNDS);
        assert_eq!(DynamicPriceBidding::snapshot(&state).total_rounds(), 10);

        let short = MarketState::new(4, &mut GameRng::new(4));
        assert_eq!(short.total_rounds, 4);
    }

    #[test]
    fn moves_for_the_other_role_are_rejected() {
        let hold: AnyMove = SellerMove::hold().into();
        let pass: AnyMove = BidderMove::pass("NVIDIA A100").into();

        assert!(DynamicPriceBidding::accept_move(Side::SideA, hold.clone()).is_err());
        assert!(DynamicPriceBidding::accept_move(Side::SideB, pass.clone()).is_err());
        assert_eq!(
            DynamicPriceBidding::accept_move(Side::SideA, pass.clone()).unwrap(),
            GpuMove::try_from(pass).unwrap()
        );
        assert_eq!(
            DynamicPriceBidding::accept_move(Side::SideB, hold.clone()).unwrap(),
            GpuMove::try_from(hold).unwrap()
        );

        // A SKU-less auction bid still reads as a bidder move, for the bidder only.
        let bid: AnyMove = AuctionMove::bid(300).into();
        assert!(DynamicPriceBidding::accept_move(Side::SideA, bid.clone()).is_ok());
        assert!(DynamicPriceBidding::accept_move(Side::SideB, bid).is_err());
    }
}
