//! GPU catalogue, provider quotes, and the demand-driven price walk.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{BidderMove, SellerMove};
use crate::rng::GameRng;
use crate::side::{PerSide, Side};

pub const STARTING_BUDGET: u32 = 10_000;
/// Length of a marketplace session; longer requests are capped.
pub const MARKET_ROUNDS: u32 = 10;
pub const DEMAND_HISTORY_LEN: usize = 20;

pub const SKU_DEMAND_BOUNDS: (f64, f64) = (0.1, 0.95);
pub const MARKET_DEMAND_BOUNDS: (f64, f64) = (0.2, 0.95);
pub const SURGE_THRESHOLD: f64 = 0.75;
pub const DISCOUNT_THRESHOLD: f64 = 0.4;

const INITIAL_SURGE_THRESHOLD: f64 = 0.7;
const INITIAL_MARKET_DEMAND: f64 = 0.5;
const MARKET_STEP: f64 = 0.15;
const SKU_STEP: f64 = 0.1;
const QUOTE_VARIANCE: f64 = 0.1;

/// `(name, compute units, base price, scarcity)`
const CATALOGUE: [(&str, u32, u32, f64); 6] = [
    ("NVIDIA H100", 100, 400, 0.3),
    ("NVIDIA A100", 80, 300, 0.5),
    ("NVIDIA A10G", 40, 150, 0.7),
    ("NVIDIA RTX 4090", 60, 200, 0.6),
    ("NVIDIA L4", 30, 100, 0.8),
    ("AMD MI300X", 90, 350, 0.4),
];

/// `(name, pricing style, multiplier)`
const PROVIDERS: [(&str, &str, f64); 6] = [
    ("AWS", "premium", 1.2),
    ("Azure", "enterprise", 1.15),
    ("Google Cloud", "competitive", 1.0),
    ("Lambda Labs", "budget", 0.85),
    ("CoreWeave", "dynamic", 0.9),
    ("Nebius", "value", 0.8),
];

/// Which side of the market a participant plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRole {
    Bidder,
    Seller,
}

impl MarketRole {
    pub const fn of(side: Side) -> Self {
        match side {
            Side::SideA => MarketRole::Bidder,
            Side::SideB => MarketRole::Seller,
        }
    }

    pub const fn side(self) -> Side {
        match self {
            MarketRole::Bidder => Side::SideA,
            MarketRole::Seller => Side::SideB,
        }
    }

    pub const fn objective(self) -> &'static str {
        match self {
            MarketRole::Bidder => "Maximize compute acquired while minimizing cost",
            MarketRole::Seller => "Maximize revenue through dynamic pricing",
        }
    }
}

/// Truncating price scale; negative or NaN results land on 0.
pub(crate) fn scale(price: u32, factor: f64) -> u32 {
    (f64::from(price) * factor) as u32
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuSku {
    pub name: String,
    pub compute_units: u32,
    pub base_price: u32,
    pub scarcity: f64,
    pub current_price: u32,
    pub demand_level: f64,
    pub surge_active: bool,
}

impl GpuSku {
    fn new(name: &str, compute_units: u32, base_price: u32, scarcity: f64, demand: f64) -> Self {
        let mut sku = Self {
            name: name.to_string(),
            compute_units,
            base_price,
            scarcity,
            current_price: base_price,
            demand_level: demand,
            surge_active: false,
        };
        if demand > INITIAL_SURGE_THRESHOLD {
            sku.current_price = scale(base_price, 1.0 + (demand - 0.5) * 0.5);
            sku.surge_active = true;
        }
        sku
    }

    /// Current price over base price.
    pub fn price_ratio(&self) -> f64 {
        f64::from(self.current_price) / f64::from(self.base_price.max(1))
    }

    /// Re-derives the price from the demand level.
    fn reprice(&mut self) {
        let d = self.demand_level;
        if d > SURGE_THRESHOLD {
            self.surge_active = true;
            self.current_price = scale(self.base_price, 1.0 + (d - 0.5) * 0.8);
        } else if d < DISCOUNT_THRESHOLD {
            self.surge_active = false;
            self.current_price = scale(self.base_price, 1.0 - (DISCOUNT_THRESHOLD - d) * 0.3);
        } else {
            self.surge_active = false;
            self.current_price = self.base_price;
        }
    }
}

/// A provider's price list and sales ledger.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuote {
    pub name: String,
    pub pricing_style: String,
    pub multiplier: f64,
    pub prices: BTreeMap<String, u32>,
    pub total_revenue: u64,
    pub units_sold: u32,
}

/// Per-round record kept in the market history.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRoundResult {
    pub round: u32,
    pub sku: String,
    pub bidder_move: BidderMove,
    pub seller_move: SellerMove,
    pub transaction_occurred: bool,
    pub final_price: u32,
    pub compute_gained: u32,
    pub budget_after: u32,
    pub revenue_after: u64,
    pub provider: Option<String>,
    pub market_demand: f64,
    /// Side the deal favoured, `None` for a fair price or no deal.
    pub favoured: Option<MarketRole>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    pub round: u32,
    pub total_rounds: u32,
    pub skus: Vec<GpuSku>,
    pub providers: Vec<ProviderQuote>,
    pub active_sku: String,
    pub bidder_budget: u32,
    pub compute_acquired: u64,
    pub cost_efficiency: f64,
    pub seller_revenue: u64,
    pub units_sold: u32,
    pub market_demand: f64,
    pub demand_history: Vec<f64>,
    pub round_results: Vec<MarketRoundResult>,
    pub scores: PerSide<i64>,
}

impl MarketState {
    /// Fresh market with randomized demand and provider quotes.
    pub fn new(total_rounds: u32, rng: &mut GameRng) -> Self {
        let skus: Vec<GpuSku> = CATALOGUE
            .iter()
            .map(|&(name, cu, base, scarcity)| {
                GpuSku::new(name, cu, base, scarcity, rng.uniform(0.3, 0.9))
            })
            .collect();

        let providers = PROVIDERS
            .iter()
            .map(|&(name, style, multiplier)| {
                let prices = skus
                    .iter()
                    .map(|sku| {
                        let base = scale(sku.base_price, multiplier);
                        let variance = rng.uniform(-QUOTE_VARIANCE, QUOTE_VARIANCE);
                        (sku.name.clone(), scale(base, 1.0 + variance))
                    })
                    .collect();
                ProviderQuote {
                    name: name.to_string(),
                    pricing_style: style.to_string(),
                    multiplier,
                    prices,
                    total_revenue: 0,
                    units_sold: 0,
                }
            })
            .collect();

        let mut state = Self {
            round: 1,
            total_rounds: total_rounds.min(MARKET_ROUNDS),
            skus,
            providers,
            active_sku: String::new(),
            bidder_budget: STARTING_BUDGET,
            compute_acquired: 0,
            cost_efficiency: 0.0,
            seller_revenue: 0,
            units_sold: 0,
            market_demand: INITIAL_MARKET_DEMAND,
            demand_history: Vec::new(),
            round_results: Vec::new(),
            scores: PerSide::default(),
        };
        state.select_active_sku(rng);
        state
    }

    pub fn active(&self) -> Option<&GpuSku> {
        self.skus.iter().find(|sku| sku.name == self.active_sku)
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut GpuSku> {
        let name = &self.active_sku;
        self.skus.iter_mut().find(|sku| &sku.name == name)
    }

    /// Draws the SKU for the next round, weighted by demand.
    pub fn select_active_sku(&mut self, rng: &mut GameRng) {
        let weights: Vec<f64> = self.skus.iter().map(|sku| sku.demand_level).collect();
        let index = rng.weighted_index(&weights).unwrap_or(0);
        if let Some(sku) = self.skus.get(index) {
            self.active_sku = sku.name.clone();
        }
    }

    /// One step of the demand random walk; reprices every SKU.
    pub fn update_market_demand(&mut self, rng: &mut GameRng) {
        let change = rng.uniform(-MARKET_STEP, MARKET_STEP);
        self.market_demand =
            (self.market_demand + change).clamp(MARKET_DEMAND_BOUNDS.0, MARKET_DEMAND_BOUNDS.1);

        for sku in &mut self.skus {
            let step = rng.uniform(-SKU_STEP, SKU_STEP);
            sku.demand_level = (sku.demand_level + step + change * 0.5)
                .clamp(SKU_DEMAND_BOUNDS.0, SKU_DEMAND_BOUNDS.1);
            sku.reprice();
        }

        self.demand_history.push(self.market_demand);
        if self.demand_history.len() > DEMAND_HISTORY_LEN {
            let excess = self.demand_history.len() - DEMAND_HISTORY_LEN;
            self.demand_history.drain(..excess);
        }
    }

    /// Cheapest provider quote for `sku`.
    pub fn cheapest_quote(&self, sku: &str) -> Option<(String, u32)> {
        self.providers
            .iter()
            .filter_map(|provider| {
                provider
                    .prices
                    .get(sku)
                    .map(|&price| (provider.name.clone(), price))
            })
            .min_by_key(|(_, price)| *price)
    }

    pub(crate) fn credit_provider(&mut self, provider: &str, revenue: u32) {
        if let Some(quote) = self.providers.iter_mut().find(|p| p.name == provider) {
            quote.total_revenue += u64::from(revenue);
            quote.units_sold += 1;
        }
    }

    /// Mean base price across the catalogue.
    pub fn mean_base_price(&self) -> f64 {
        if self.skus.is_empty() {
            return 0.0;
        }
        let total: f64 = self.skus.iter().map(|sku| f64::from(sku.base_price)).sum();
        total / self.skus.len() as f64
    }

    pub fn total_spent(&self) -> u32 {
        STARTING_BUDGET.saturating_sub(self.bidder_budget)
    }
}
