//! Match metrics: guess accuracy, round latency and outcomes.
//!
//! The orchestrator reports through [`MetricsSink`]; [`NoopMetrics`] is the
//! default and [`ArenaMetrics`] keeps lock-free counters in memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arena_core::{GameKind, MatchQuality, Outcome, PerSide, Side};
use serde::Serialize;

pub trait MetricsSink: Send + Sync {
    fn record_guess(&self, side: Side, quality: MatchQuality);

    /// A decision that was replaced by the variant's default move.
    fn record_fallback(&self, side: Side);

    fn record_round(&self, game: GameKind, latency: Duration);

    fn record_match(&self, game: GameKind, outcome: Outcome);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_guess(&self, _side: Side, _quality: MatchQuality) {}
    fn record_fallback(&self, _side: Side) {}
    fn record_round(&self, _game: GameKind, _latency: Duration) {}
    fn record_match(&self, _game: GameKind, _outcome: Outcome) {}
}

/// In-memory counters shared across matches.
///
/// Individual fields are read atomically, a [`snapshot`](Self::snapshot) as a
/// whole is not.
#[derive(Debug, Default)]
pub struct ArenaMetrics {
    guesses: PerSide<AtomicU64>,
    correct: PerSide<AtomicU64>,
    partial: PerSide<AtomicU64>,
    fallbacks: PerSide<AtomicU64>,
    rounds: AtomicU64,
    total_round_nanos: AtomicU64,
    peak_round_nanos: AtomicU64,
    matches: AtomicU64,
    wins: PerSide<AtomicU64>,
    draws: AtomicU64,
}

impl ArenaMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    pub fn avg_round_latency(&self) -> Duration {
        let rounds = self.rounds();
        if rounds == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_round_nanos.load(Ordering::Relaxed) / rounds)
        }
    }

    /// Share of exact guesses for `side`, 0 when it has not guessed.
    pub fn accuracy(&self, side: Side) -> f64 {
        let total = self.guesses[side].load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.correct[side].load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counters: &PerSide<AtomicU64>| {
            PerSide::from_fn(|side| counters[side].load(Ordering::Relaxed))
        };
        MetricsSnapshot {
            guesses: load(&self.guesses),
            correct: load(&self.correct),
            partial: load(&self.partial),
            fallbacks: load(&self.fallbacks),
            accuracy: PerSide::from_fn(|side| self.accuracy(side)),
            rounds: self.rounds(),
            avg_round_latency_ms: self.avg_round_latency().as_secs_f64() * 1000.0,
            peak_round_latency_ms: Duration::from_nanos(
                self.peak_round_nanos.load(Ordering::Relaxed),
            )
            .as_secs_f64()
                * 1000.0,
            matches: self.matches(),
            wins: load(&self.wins),
            draws: self.draws.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for ArenaMetrics {
    fn record_guess(&self, side: Side, quality: MatchQuality) {
        self.guesses[side].fetch_add(1, Ordering::Relaxed);
        match quality {
            MatchQuality::Exact => self.correct[side].fetch_add(1, Ordering::Relaxed),
            MatchQuality::Partial => self.partial[side].fetch_add(1, Ordering::Relaxed),
            MatchQuality::Miss => 0,
        };
    }

    fn record_fallback(&self, side: Side) {
        self.fallbacks[side].fetch_add(1, Ordering::Relaxed);
    }

    fn record_round(&self, game: GameKind, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.rounds.fetch_add(1, Ordering::Relaxed);
        self.total_round_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.peak_round_nanos.fetch_max(nanos, Ordering::Relaxed);
        tracing::trace!(%game, latency_ms = latency.as_millis() as u64, "round recorded");
    }

    fn record_match(&self, game: GameKind, outcome: Outcome) {
        self.matches.fetch_add(1, Ordering::Relaxed);
        match outcome.side() {
            Some(side) => self.wins[side].fetch_add(1, Ordering::Relaxed),
            None => self.draws.fetch_add(1, Ordering::Relaxed),
        };
        tracing::debug!(%game, %outcome, "match recorded");
    }
}

/// Point-in-time copy of [`ArenaMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub guesses: PerSide<u64>,
    pub correct: PerSide<u64>,
    pub partial: PerSide<u64>,
    pub fallbacks: PerSide<u64>,
    pub accuracy: PerSide<f64>,
    pub rounds: u64,
    pub avg_round_latency_ms: f64,
    pub peak_round_latency_ms: f64,
    pub matches: u64,
    pub wins: PerSide<u64>,
    pub draws: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_guesses_per_side() {
        let metrics = ArenaMetrics::new();
        metrics.record_guess(Side::SideA, MatchQuality::Exact);
        metrics.record_guess(Side::SideA, MatchQuality::Partial);
        metrics.record_guess(Side::SideA, MatchQuality::Miss);
        metrics.record_guess(Side::SideB, MatchQuality::Miss);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.guesses, PerSide::new(3, 1));
        assert_eq!(snapshot.correct, PerSide::new(1, 0));
        assert_eq!(snapshot.partial, PerSide::new(1, 0));
        assert!((snapshot.accuracy.side_a - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.accuracy.side_b, 0.0);
    }

    #[test]
    fn tracks_round_latency() {
        let metrics = ArenaMetrics::new();
        assert_eq!(metrics.avg_round_latency(), Duration::ZERO);

        metrics.record_round(GameKind::Auction, Duration::from_millis(10));
        metrics.record_round(GameKind::Auction, Duration::from_millis(30));
        assert_eq!(metrics.rounds(), 2);
        assert_eq!(metrics.avg_round_latency(), Duration::from_millis(20));
        assert_eq!(metrics.snapshot().peak_round_latency_ms, 30.0);
    }

    #[test]
    fn tallies_outcomes() {
        let metrics = ArenaMetrics::new();
        metrics.record_match(GameKind::Negotiation, Outcome::SideB);
        metrics.record_match(GameKind::Negotiation, Outcome::Draw);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.matches, 2);
        assert_eq!(snapshot.wins, PerSide::new(0, 1));
        assert_eq!(snapshot.draws, 1);
    }
}
