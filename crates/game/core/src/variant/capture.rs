//! Resource Capture: three shared pools contested by committed power.
//!
//! Each round both sides commit power to pools according to their move kind.
//! On every pool the side with strictly greater power captures
//! `min(pool, max(5, diff / 2))` units. Retreating commits nothing but grows a
//! permanent economy bonus that boosts every later move.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::{
    AnyMove, GameVariant, PrivateView, ResolutionDetail, RoundResolution, StateSnapshot,
};
use crate::config::{GameKind, MatchConfig};
use crate::error::MoveMismatch;
use crate::rng::GameRng;
use crate::side::{Outcome, PerSide, Side};

/// Units each pool starts with.
pub const STARTING_POOL: u32 = 100;
/// Largest amount a single move may commit.
pub const MAX_COMMIT: u32 = 100;
/// Smallest capture when one side out-powers the other on a pool.
pub const MIN_CAPTURE: u32 = 5;

const RETREAT_BONUS_PERCENT: u32 = 10;
const STANDARD_AMOUNTS: [u32; 5] = [20, 40, 60, 80, 100];

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Resource {
    A,
    B,
    C,
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
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptureKind {
    /// Full amount plus bonus on the target pool.
    AggressiveBid,
    /// Amount plus bonus split evenly across all pools.
    DefensiveSpread,
    /// Looks like a bid, but only a quarter of amount plus bonus counts.
    Bluff,
    /// 1.5x amount plus bonus on the target pool.
    Counter,
    /// Commits nothing; adds 10% of amount to the economy bonus.
    Retreat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureMove {
    #[serde(rename = "type")]
    pub kind: CaptureKind,
    pub target: Resource,
    pub amount: u32,
}

impl CaptureMove {
    pub const fn new(kind: CaptureKind, target: Resource, amount: u32) -> Self {
        Self {
            kind,
            target,
            amount,
        }
    }

    fn clamped(self) -> Self {
        Self {
            amount: self.amount.min(MAX_COMMIT),
            ..self
        }
    }

    /// Power this move commits to each pool given the side's economy bonus.
    fn power(&self, bonus: u32) -> BTreeMap<Resource, u32> {
        let mut power: BTreeMap<Resource, u32> = Resource::iter().map(|r| (r, 0)).collect();
        let total = self.amount + bonus;
        match self.kind {
            CaptureKind::AggressiveBid => {
                power.insert(self.target, total);
            }
            CaptureKind::DefensiveSpread => {
                for value in power.values_mut() {
                    *value = total / 3;
                }
            }
            CaptureKind::Bluff => {
                power.insert(self.target, total / 4);
            }
            CaptureKind::Counter => {
                power.insert(self.target, total * 3 / 2);
            }
            CaptureKind::Retreat => {}
        }
        power
    }
}

impl From<CaptureMove> for AnyMove {
    fn from(value: CaptureMove) -> Self {
        AnyMove::ResourceCapture(value)
    }
}

impl TryFrom<AnyMove> for CaptureMove {
    type Error = MoveMismatch;

    fn try_from(value: AnyMove) -> Result<Self, Self::Error> {
        match value {
            AnyMove::ResourceCapture(m) => Ok(m),
            other => Err(MoveMismatch {
                expected: GameKind::ResourceCapture,
                found: other.kind_name(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    #[serde(rename = "resources")]
    pub pools: BTreeMap<Resource, u32>,
    pub scores: PerSide<u32>,
    pub economy_bonus: PerSide<u32>,
    pub round: u32,
    pub total_rounds: u32,
}

impl CaptureState {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            pools: Resource::iter().map(|r| (r, STARTING_POOL)).collect(),
            scores: PerSide::default(),
            economy_bonus: PerSide::default(),
            round: 1,
            total_rounds,
        }
    }

    pub fn pool(&self, resource: Resource) -> u32 {
        self.pools.get(&resource).copied().unwrap_or(0)
    }
}

/// Resource Capture rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceCapture;

impl GameVariant for ResourceCapture {
    type State = CaptureState;
    type Move = CaptureMove;

    const KIND: GameKind = GameKind::ResourceCapture;

    fn initial_state(config: &MatchConfig, _rng: &mut GameRng) -> CaptureState {
        CaptureState::new(config.total_rounds)
    }

    fn valid_moves(_state: &CaptureState, _side: Side) -> Vec<CaptureMove> {
        CaptureKind::iter()
            .flat_map(|kind| {
                Resource::iter().flat_map(move |target| {
                    STANDARD_AMOUNTS
                        .iter()
                        .map(move |&amount| CaptureMove::new(kind, target, amount))
                })
            })
            .collect()
    }

    fn resolve_round(
        state: &mut CaptureState,
        side_a: &CaptureMove,
        side_b: &CaptureMove,
        _rng: &mut GameRng,
    ) -> RoundResolution {
        let moves = PerSide::new(side_a.clamped(), side_b.clamped());

        // Retreat bonus lands before power is computed.
        for side in Side::BOTH {
            let mv = moves[side];
            if mv.kind == CaptureKind::Retreat {
                state.economy_bonus[side] += mv.amount * RETREAT_BONUS_PERCENT / 100;
            }
        }

        let power = PerSide::from_fn(|side| moves[side].power(state.economy_bonus[side]));

        let mut captured = PerSide::new(0u32, 0u32);
        let mut resource_changes = BTreeMap::new();
        for resource in Resource::iter() {
            let pa = power.side_a[&resource];
            let pb = power.side_b[&resource];
            if pa == 0 && pb == 0 {
                continue;
            }

            let mut change = PerSide::new(0, 0);
            if pa != pb {
                let (winner, diff) = if pa > pb {
                    (Side::SideA, pa - pb)
                } else {
                    (Side::SideB, pb - pa)
                };
                let pool = state.pools.entry(resource).or_insert(0);
                let capture = (*pool).min(MIN_CAPTURE.max(diff / 2));
                *pool -= capture;
                change[winner] = capture;
                captured[winner] += capture;
            }
            resource_changes.insert(resource, change);
        }

        for side in Side::BOTH {
            state.scores[side] += captured[side];
        }

        let round_winner = Outcome::from_scores(captured.side_a, captured.side_b).side();
        let verdict = match round_winner {
            Some(side) => format!("{} wins the round.", side.label()),
            None => "Round is a draw.".to_string(),
        };
        let description = format!(
            "Side A played {} on {} ({}), Side B played {} on {} ({}). {}",
            <&str>::from(moves.side_a.kind),
            moves.side_a.target,
            moves.side_a.amount,
            <&str>::from(moves.side_b.kind),
            moves.side_b.target,
            moves.side_b.amount,
            verdict
        );

        RoundResolution {
            round: state.round,
            round_winner,
            description,
            detail: ResolutionDetail::ResourceCapture { resource_changes },
        }
    }

    fn is_terminal(state: &CaptureState) -> bool {
        state.round > state.total_rounds || state.pools.values().all(|&units| units == 0)
    }

    fn winner(state: &CaptureState) -> Outcome {
        Outcome::from_scores(state.scores.side_a, state.scores.side_b)
    }

    fn default_move(_state: &CaptureState, _side: Side) -> CaptureMove {
        CaptureMove::new(CaptureKind::DefensiveSpread, Resource::A, 60)
    }

    fn round(state: &CaptureState) -> u32 {
        state.round
    }

    fn advance_round(state: &mut CaptureState) {
        state.round += 1;
    }

    fn scores(state: &CaptureState) -> PerSide<i64> {
        state.scores.map(i64::from)
    }

    fn snapshot(state: &CaptureState) -> StateSnapshot {
        StateSnapshot::ResourceCapture(state.clone())
    }

    fn private_view(state: &CaptureState, side: Side) -> PrivateView {
        PrivateView::ResourceCapture {
            economy_bonus: state.economy_bonus[side],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolve(state: &mut CaptureState, a: CaptureMove, b: CaptureMove) -> RoundResolution {
        ResourceCapture::resolve_round(state, &a, &b, &mut GameRng::new(0))
    }

    fn changes(resolution: &RoundResolution) -> &BTreeMap<Resource, PerSide<u32>> {
        match &resolution.detail {
            ResolutionDetail::ResourceCapture { resource_changes } => resource_changes,
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn aggressive_bid_beats_spread_defense() {
        let mut state = CaptureState::new(10);
        let resolution = resolve(
            &mut state,
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::A, 80),
            CaptureMove::new(CaptureKind::DefensiveSpread, Resource::A, 60),
        );

        // A: 80 vs 20 -> diff 60 -> capture 30. B and C: 0 vs 20 -> capture 10.
        assert_eq!(state.pool(Resource::A), 70);
        assert_eq!(state.pool(Resource::B), 90);
        assert_eq!(state.pool(Resource::C), 90);
        assert_eq!(state.scores, PerSide::new(30, 20));
        assert_eq!(resolution.round_winner, Some(Side::SideA));
        assert_eq!(changes(&resolution)[&Resource::A], PerSide::new(30, 0));
    }

    #[test]
    fn equal_power_holds_the_pool() {
        let mut state = CaptureState::new(10);
        let resolution = resolve(
            &mut state,
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::B, 40),
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::B, 40),
        );
        assert_eq!(state.pool(Resource::B), STARTING_POOL);
        assert_eq!(resolution.round_winner, None);
        assert_eq!(changes(&resolution)[&Resource::B], PerSide::new(0, 0));
        assert!(!changes(&resolution).contains_key(&Resource::A));
    }

    #[test]
    fn small_margins_still_capture_the_minimum() {
        let mut state = CaptureState::new(10);
        resolve(
            &mut state,
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::C, 42),
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::C, 40),
        );
        assert_eq!(state.pool(Resource::C), STARTING_POOL - MIN_CAPTURE);
    }

    #[test]
    fn retreat_compounds_into_later_power() {
        let mut state = CaptureState::new(10);
        let retreat = CaptureMove::new(CaptureKind::Retreat, Resource::A, 100);
        let idle = CaptureMove::new(CaptureKind::Retreat, Resource::A, 0);
        resolve(&mut state, retreat, idle);
        resolve(&mut state, retreat, idle);
        assert_eq!(state.economy_bonus, PerSide::new(20, 0));
        assert_eq!(state.scores, PerSide::new(0, 0));

        // 60 + 20 bonus = 80 vs 0 -> capture 40.
        resolve(
            &mut state,
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::A, 60),
            idle,
        );
        assert_eq!(state.scores.side_a, 40);
    }

    #[test]
    fn bluff_and_counter_scale_power() {
        let bluff = CaptureMove::new(CaptureKind::Bluff, Resource::B, 80).power(20);
        assert_eq!(bluff[&Resource::B], 25);
        let counter = CaptureMove::new(CaptureKind::Counter, Resource::B, 50).power(1);
        assert_eq!(counter[&Resource::B], 76);
    }

    #[test]
    fn oversized_amounts_are_clamped() {
        let mut state = CaptureState::new(10);
        resolve(
            &mut state,
            CaptureMove::new(CaptureKind::AggressiveBid, Resource::A, 10_000),
            CaptureMove::new(CaptureKind::Retreat, Resource::A, 0),
        );
        assert_eq!(state.pool(Resource::A), 50);
    }

    #[test]
    fn terminal_after_last_round_or_empty_pools() {
        let mut state = CaptureState::new(2);
        assert!(!ResourceCapture::is_terminal(&state));
        ResourceCapture::advance_round(&mut state);
        ResourceCapture::advance_round(&mut state);
        assert!(ResourceCapture::is_terminal(&state));

        let mut drained = CaptureState::new(10);
        drained.pools.values_mut().for_each(|units| *units = 0);
        assert!(ResourceCapture::is_terminal(&drained));
    }

    #[test]
    fn valid_moves_cover_every_combination() {
        let state = CaptureState::new(10);
        assert_eq!(ResourceCapture::valid_moves(&state, Side::SideA).len(), 5 * 3 * 5);
    }

    fn any_move() -> impl Strategy<Value = CaptureMove> {
        (0usize..5, 0usize..3, 0u32..=150).prop_map(|(kind, target, amount)| {
            let kind = CaptureKind::iter().nth(kind).unwrap();
            let target = Resource::iter().nth(target).unwrap();
            CaptureMove::new(kind, target, amount)
        })
    }

    proptest! {
        #[test]
        fn captures_never_exceed_pool(
            a in any_move(),
            b in any_move(),
            pools in proptest::collection::vec(0u32..=100, 3),
        ) {
            let mut state = CaptureState::new(10);
            for (resource, units) in Resource::iter().zip(pools) {
                state.pools.insert(resource, units);
            }
            let before = state.clone();
            let resolution = resolve(&mut state, a, b);
            for (resource, change) in changes(&resolution) {
                prop_assert!(change.side_a + change.side_b <= before.pool(*resource));
                prop_assert_eq!(
                    before.pool(*resource) - state.pool(*resource),
                    change.side_a + change.side_b
                );
            }
        }
    }
}
