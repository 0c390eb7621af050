//! Round loop of a single match.
//!
//! [`Match`] owns the authoritative variant state and drives it to completion:
//! it asks both decision sources concurrently each round, substitutes the
//! variant's default move for any side whose decision fails, resolves the round
//! and grades each side's guesses against what the opponent actually played.
//!
//! Every observable step goes through an [`EventSink`] in a fixed order. A
//! failed delivery ends the match as `disconnected`; the in-flight decision
//! tasks live in a [`JoinSet`] and are aborted with it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arena_core::{
    AnyMove, GameRng, GameVariant, MatchConfig, MatchQuality, Outcome, PerSide, Side,
    StateSnapshot,
};
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::{
    DecisionError, DecisionRequest, DecisionSource, MAX_PREDICTIONS, Prediction, PredictionResult,
    SinkError, TransportError,
};
use crate::events::{AgentInfo, AnnotatedPrediction, Event, EventSink};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::repository::{ArchiveSink, MatchStatus, MatchSummary, NoopArchive, RoundRecord};

/// Default bound on a single decision call.
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(20);

/// Exact guesses over total guesses for one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuessTally {
    pub correct: u32,
    pub total: u32,
}

impl GuessTally {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            round2(f64::from(self.correct) / f64::from(self.total))
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// How a match ended.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub match_id: String,
    pub status: MatchStatus,
    /// `None` when the match did not complete.
    pub winner: Option<Outcome>,
    pub final_scores: PerSide<i64>,
    pub accuracy: PerSide<f64>,
    pub rounds_played: u32,
}

/// A side's settled decision for one round.
struct Decision<M> {
    mv: M,
    predictions: Vec<Prediction>,
    rationale: String,
    fallback: bool,
}

pub struct Match<V: GameVariant> {
    config: MatchConfig,
    state: V::State,
    rng: GameRng,
    sources: PerSide<Arc<dyn DecisionSource>>,
    history: PerSide<Vec<AnyMove>>,
    tally: PerSide<GuessTally>,
    rounds_played: u32,
    decision_timeout: Duration,
    archive: Arc<dyn ArchiveSink>,
    metrics: Arc<dyn MetricsSink>,
    _variant: PhantomData<V>,
}

impl<V: GameVariant> Match<V> {
    /// Builds the initial state from `config.seed`; the same seed and the same
    /// decisions replay the same match.
    pub fn new(config: MatchConfig, sources: PerSide<Arc<dyn DecisionSource>>) -> Self {
        let mut rng = GameRng::new(config.seed);
        let state = V::initial_state(&config, &mut rng);
        Self {
            config,
            state,
            rng,
            sources,
            history: PerSide::default(),
            tally: PerSide::default(),
            rounds_played: 0,
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            archive: Arc::new(NoopArchive),
            metrics: Arc::new(NoopMetrics),
            _variant: PhantomData,
        }
    }

    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchiveSink>) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn state(&self) -> &V::State {
        &self.state
    }

    /// Plays the match to the end or until `sink` fails.
    pub async fn run<S>(mut self, sink: &mut S) -> MatchReport
    where
        S: EventSink + ?Sized,
    {
        let match_id = self.config.match_id.clone();
        info!(
            %match_id,
            game = %self.config.game,
            rounds = self.config.total_rounds,
            seed = self.config.seed,
            "match started"
        );

        match self.play(sink).await {
            Ok(winner) => {
                info!(%match_id, %winner, rounds = self.rounds_played, "match completed");
                self.report(MatchStatus::Completed, Some(winner))
            }
            Err(err) => {
                warn!(%match_id, error = %err, round = self.rounds_played, "match disconnected");
                self.report(MatchStatus::Disconnected, None)
            }
        }
    }

    fn report(&self, status: MatchStatus, winner: Option<Outcome>) -> MatchReport {
        MatchReport {
            match_id: self.config.match_id.clone(),
            status,
            winner,
            final_scores: V::scores(&self.state),
            accuracy: self.tally.map(|tally| tally.accuracy()),
            rounds_played: self.rounds_played,
        }
    }

    async fn play<S>(&mut self, sink: &mut S) -> Result<Outcome, TransportError>
    where
        S: EventSink + ?Sized,
    {
        let opening = V::snapshot(&self.state);
        sink.emit(Event::MatchStart {
            match_id: self.config.match_id.clone(),
            game_type: self.config.game,
            agents: self.config.personalities.clone().map(|personality| AgentInfo { personality }),
            total_rounds: opening.total_rounds(),
            seed: self.config.seed,
        })
        .await?;
        let config = self.config.clone();
        self.archive_write("match start", move |archive| archive.record_match_start(&config))
            .await;

        while !V::is_terminal(&self.state) {
            self.play_round(sink).await?;
            self.rounds_played += 1;

            let delay = self.config.inter_round_delay();
            if !V::is_terminal(&self.state) && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let winner = V::winner(&self.state);
        let final_scores = V::scores(&self.state);
        let prediction_accuracy = self.tally.map(|tally| tally.accuracy());
        sink.emit(Event::MatchEnd {
            winner,
            final_scores,
            total_guesses_examined: self.tally.side_a.total + self.tally.side_b.total,
            prediction_accuracy,
        })
        .await?;

        self.metrics.record_match(self.config.game, winner);
        let mut summary = MatchSummary::pending(&self.config, MatchStatus::Completed, Utc::now());
        summary.winner = Some(winner);
        summary.final_scores = Some(final_scores);
        summary.accuracy = Some(prediction_accuracy);
        self.archive_write("match summary", move |archive| archive.record_match_end(&summary))
            .await;

        Ok(winner)
    }

    async fn play_round<S>(&mut self, sink: &mut S) -> Result<(), TransportError>
    where
        S: EventSink + ?Sized,
    {
        let started = Instant::now();
        let round = V::round(&self.state);
        let snapshot = V::snapshot(&self.state);
        let state_hash = snapshot.state_hash();
        debug!(match_id = %self.config.match_id, round, %state_hash, "round started");

        sink.emit(Event::RoundStart {
            round,
            state: snapshot.clone(),
        })
        .await?;

        // Dropping the set on an early return aborts whatever is still thinking.
        let mut tasks = JoinSet::new();
        for side in Side::BOTH {
            sink.emit(Event::ThinkingStart { side }).await?;
            let request = self.request(side, round, snapshot.clone());
            let source = Arc::clone(&self.sources[side]);
            let timeout = self.decision_timeout;
            tasks.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, source.decide(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(DecisionError::Timeout(timeout)),
                };
                (side, outcome)
            });
        }

        let mut settled: PerSide<Option<Decision<V::Move>>> = PerSide::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((side, outcome)) => {
                    let decision = self.settle(side, round, outcome);
                    emit_thinking(sink, side, &decision).await?;
                    settled[side] = Some(decision);
                }
                Err(err) => {
                    warn!(match_id = %self.config.match_id, round, error = %err, "decision task failed");
                }
            }
        }

        let side_a = self.finish(sink, Side::SideA, round, settled.side_a).await?;
        let side_b = self.finish(sink, Side::SideB, round, settled.side_b).await?;

        // Resolve on a copy; nothing is committed until the round is reported.
        let mut next = self.state.clone();
        let mut rng = self.rng.clone();
        let resolution = V::resolve_round(&mut next, &side_a.mv, &side_b.mv, &mut rng);
        let played: PerSide<AnyMove> = PerSide::new(side_a.mv.into(), side_b.mv.into());

        let (side_a_predictions, side_a_round) = grade(side_a.predictions, &played.side_b);
        let (side_b_predictions, side_b_round) = grade(side_b.predictions, &played.side_a);
        let accuracy = PerSide::new(side_a_round.tally.accuracy(), side_b_round.tally.accuracy());
        let scores = V::scores(&next);

        debug!(
            match_id = %self.config.match_id,
            round,
            winner = ?resolution.round_winner,
            "{}",
            resolution.description
        );
        sink.emit(Event::Collapse {
            side_a_predictions,
            side_b_predictions,
            resolution: resolution.clone(),
        })
        .await?;
        sink.emit(Event::RoundEnd {
            round,
            scores,
            accuracy,
            state: V::snapshot(&next),
        })
        .await?;

        self.state = next;
        self.rng = rng;
        self.commit_grades(Side::SideA, &side_a_round);
        self.commit_grades(Side::SideB, &side_b_round);

        let record = RoundRecord {
            match_id: self.config.match_id.clone(),
            round,
            state_hash,
            moves: played.clone(),
            fallback: PerSide::new(side_a.fallback, side_b.fallback),
            resolution,
            scores,
            accuracy,
            recorded_at: Utc::now(),
        };
        self.archive_write("round", move |archive| archive.record_round(&record)).await;
        self.metrics.record_round(self.config.game, started.elapsed());

        for side in Side::BOTH {
            self.history[side].push(played[side].clone());
        }
        V::advance_round(&mut self.state);
        Ok(())
    }

    /// Runs an archive write on the blocking pool. Writes are awaited one at a
    /// time so the archive sees them in order; failures are logged only.
    async fn archive_write<F>(&self, what: &'static str, write: F)
    where
        F: FnOnce(&dyn ArchiveSink) -> Result<(), SinkError> + Send + 'static,
    {
        let archive = Arc::clone(&self.archive);
        match tokio::task::spawn_blocking(move || write(archive.as_ref())).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(match_id = %self.config.match_id, error = %err, "archive rejected {what}");
            }
            Err(err) => {
                warn!(match_id = %self.config.match_id, error = %err, "archive write of {what} failed");
            }
        }
    }

    fn request(&self, side: Side, round: u32, snapshot: StateSnapshot) -> DecisionRequest {
        let legal = |side: Side| -> Vec<AnyMove> {
            V::valid_moves(&self.state, side)
                .into_iter()
                .map(Into::into)
                .collect()
        };
        DecisionRequest {
            match_id: self.config.match_id.clone(),
            side,
            personality: self.config.personality(side).to_string(),
            game: V::KIND,
            round,
            total_rounds: snapshot.total_rounds(),
            snapshot,
            private: V::private_view(&self.state, side),
            legal_moves: legal(side),
            opponent_moves: legal(side.opponent()),
            own_history: self.history[side].clone(),
            opponent_history: self.history[side.opponent()].clone(),
        }
    }

    /// Turns a decision outcome into a playable move, falling back to the
    /// variant default when the source failed or picked an unusable move.
    fn settle(
        &self,
        side: Side,
        round: u32,
        outcome: Result<PredictionResult, DecisionError>,
    ) -> Decision<V::Move> {
        let (mut predictions, rationale, picked) = match outcome {
            Ok(result) => {
                let picked = result
                    .chosen_move
                    .ok_or(DecisionError::NoMove)
                    .and_then(|mv| V::accept_move(side, mv).map_err(DecisionError::from));
                (result.predictions, result.rationale, picked)
            }
            Err(err) => (Vec::new(), String::new(), Err(err)),
        };
        predictions.truncate(MAX_PREDICTIONS);

        match picked {
            Ok(mv) => Decision {
                mv,
                predictions,
                rationale,
                fallback: false,
            },
            Err(err) => {
                warn!(
                    match_id = %self.config.match_id,
                    %side,
                    round,
                    error = %err,
                    "decision failed, playing default move"
                );
                self.metrics.record_fallback(side);
                Decision {
                    mv: V::default_move(&self.state, side),
                    predictions,
                    rationale: format!("Default move played: {err}"),
                    fallback: true,
                }
            }
        }
    }

    /// Returns the settled decision, substituting a default for a side whose
    /// task never reported back.
    async fn finish<S>(
        &self,
        sink: &mut S,
        side: Side,
        round: u32,
        settled: Option<Decision<V::Move>>,
    ) -> Result<Decision<V::Move>, TransportError>
    where
        S: EventSink + ?Sized,
    {
        match settled {
            Some(decision) => Ok(decision),
            None => {
                let decision = self.settle(side, round, Err(DecisionError::TaskLost));
                emit_thinking(sink, side, &decision).await?;
                Ok(decision)
            }
        }
    }

    fn commit_grades(&mut self, side: Side, graded: &GradedRound) {
        for quality in &graded.qualities {
            self.metrics.record_guess(side, *quality);
        }
        self.tally[side].correct += graded.tally.correct;
        self.tally[side].total += graded.tally.total;
    }
}

/// One side's guesses for a round, graded but not yet counted.
struct GradedRound {
    tally: GuessTally,
    qualities: Vec<MatchQuality>,
}

/// Annotates guesses against the opponent's actual move.
fn grade(
    predictions: Vec<Prediction>,
    actual: &AnyMove,
) -> (Vec<AnnotatedPrediction>, GradedRound) {
    let mut graded = GradedRound {
        tally: GuessTally::default(),
        qualities: Vec::with_capacity(predictions.len()),
    };
    let annotated = predictions
        .into_iter()
        .map(|prediction| {
            let quality = prediction.opponent_move.grade(actual);
            graded.qualities.push(quality);
            graded.tally.total += 1;
            if quality == MatchQuality::Exact {
                graded.tally.correct += 1;
            }
            AnnotatedPrediction {
                prediction,
                was_correct: quality == MatchQuality::Exact,
                partial_match: quality == MatchQuality::Partial,
            }
        })
        .collect();
    (annotated, graded)
}

async fn emit_thinking<S, M>(
    sink: &mut S,
    side: Side,
    decision: &Decision<M>,
) -> Result<(), TransportError>
where
    S: EventSink + ?Sized,
    M: Clone + Into<AnyMove>,
{
    for (branch_index, prediction) in decision.predictions.iter().enumerate() {
        sink.emit(Event::Prediction {
            side,
            branch_index,
            prediction: prediction.clone(),
        })
        .await?;
    }
    sink.emit(Event::ThinkingEnd {
        side,
        predictions: decision.predictions.clone(),
        chosen_move: decision.mv.clone().into(),
        rationale: decision.rationale.clone(),
        fallback: decision.fallback,
    })
    .await
}

#[cfg(test)]
mod tests {
    use arena_core::{
        CaptureKind, CaptureMove, GameKind, MatchRequest, Resource, ResourceCapture,
    };
    use async_trait::async_trait;

    use super::*;

    struct Fixed(AnyMove);

    #[async_trait]
    impl DecisionSource for Fixed {
        async fn decide(&self, _request: DecisionRequest) -> Result<PredictionResult, DecisionError> {
            Ok(PredictionResult {
                predictions: vec![Prediction::new(self.0.clone(), 0.9)],
                chosen_move: Some(self.0.clone()),
                rationale: "fixed".into(),
            })
        }
    }

    fn config(rounds: u32) -> MatchConfig {
        MatchRequest::new(GameKind::ResourceCapture, "a", "b", rounds)
            .into_config("match_unit", Duration::ZERO, Some(3))
            .unwrap()
    }

    #[test]
    fn tally_accuracy_rounds_to_two_places() {
        let tally = GuessTally {
            correct: 1,
            total: 3,
        };
        assert_eq!(tally.accuracy(), 0.33);
        assert_eq!(GuessTally::default().accuracy(), 0.0);
    }

    #[tokio::test]
    async fn identical_guesses_are_graded_exact() {
        let mv: AnyMove = CaptureMove::new(CaptureKind::DefensiveSpread, Resource::B, 30).into();
        let sources: PerSide<Arc<dyn DecisionSource>> = PerSide::new(
            Arc::new(Fixed(mv.clone())) as Arc<dyn DecisionSource>,
            Arc::new(Fixed(mv)) as Arc<dyn DecisionSource>,
        );
        let mut events: Vec<Event> = Vec::new();
        let report = Match::<ResourceCapture>::new(config(2), sources)
            .run(&mut events)
            .await;

        assert_eq!(report.status, MatchStatus::Completed);
        assert_eq!(report.rounds_played, 2);
        assert_eq!(report.accuracy, PerSide::new(1.0, 1.0));
        let Some(Event::MatchEnd {
            total_guesses_examined,
            ..
        }) = events.last()
        else {
            panic!("last event should be match_end");
        };
        assert_eq!(*total_guesses_examined, 4);
    }
}
