//! Deterministic rules for the arena's two-sided games.
//!
//! `arena-core` owns the four game variants, their move and state types, and
//! the seedable random source every resolution draws from. It performs no I/O
//! and never suspends; the runtime crate drives it. All game-state mutation
//! flows through [`GameVariant::resolve_round`] and
//! [`GameVariant::advance_round`].
pub mod config;
pub mod error;
pub mod rng;
pub mod side;
pub mod variant;

pub use config::{GameDescriptor, GameKind, MatchConfig, MatchRequest, MAX_ROUNDS, MIN_ROUNDS};
pub use error::{ConfigError, MoveMismatch};
pub use rng::GameRng;
pub use side::{Outcome, PerSide, Side};
pub use variant::{
    AnyMove, AuctionItem, AuctionKind, AuctionMove, AuctionState, BidderKind, BidderMove,
    CaptureKind, CaptureMove, CaptureState, DynamicPriceBidding, GameVariant, GpuMove, GpuSku,
    MarketRole, MarketRoundResult, MarketState, MatchQuality, NegotiationKind, NegotiationMove,
    NegotiationState, PrivateView, ProviderQuote, ResolutionDetail, Resource, ResourceCapture,
    RoundResolution, SealedBidAuction, SellerKind, SellerMove, SequentialNegotiation,
    StateSnapshot, WonItem,
};
