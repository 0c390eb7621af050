//! High-level runtime orchestrator.
//!
//! The runtime owns the match registry and the optional archive and metrics
//! collaborators, builds decision sources for each new match and dispatches
//! the match to the rule set named by its [`GameKind`]. [`Runtime`] is cheap to
//! clone and is shared by every transport session.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arena_core::{
    DynamicPriceBidding, GameKind, GameVariant, MatchConfig, MatchRequest, PerSide,
    ResourceCapture, SealedBidAuction, SequentialNegotiation,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{DecisionSource, DecisionSourceFactory, Result};
use crate::events::{ChannelSink, Event, EventSink, RecordingSink};
use crate::metrics::{ArenaMetrics, MetricsSink, NoopMetrics};
use crate::orchestrator::{Match, MatchReport};
use crate::providers::HeuristicFactory;
use crate::repository::{
    ArchiveSink, DEFAULT_CAPACITY, FileArchive, MatchRegistry, MatchStatus, NoopArchive,
};

/// Runtime configuration shared by the registry, orchestrator and sessions.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Registry capacity before the oldest match is evicted.
    pub max_matches: usize,
    pub round_delay: Duration,
    pub decision_timeout: Duration,
    /// How long a session waits for its `start_match` message.
    pub start_timeout: Duration,
    pub event_buffer: usize,
    /// Enables the JSON-lines archive when set.
    pub archive_dir: Option<PathBuf>,
    pub metrics_enabled: bool,
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_matches: DEFAULT_CAPACITY,
            round_delay: Duration::from_millis(500),
            decision_timeout: Duration::from_millis(20_000),
            start_timeout: Duration::from_secs(30),
            event_buffer: 256,
            archive_dir: None,
            metrics_enabled: false,
            bind_addr: "127.0.0.1:8765".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Construct runtime configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ARENA_MAX_MATCHES` - registry capacity (default: 100)
    /// - `ARENA_ROUND_DELAY_MS` - pause between rounds (default: 500)
    /// - `ARENA_DECISION_TIMEOUT_MS` - bound on one decision call (default: 20000)
    /// - `ARENA_START_TIMEOUT_SECS` - wait for `start_match` (default: 30)
    /// - `ARENA_EVENT_BUFFER` - per-match event channel size (default: 256)
    /// - `ARENA_ARCHIVE_DIR` - directory of the match archive (default: unset)
    /// - `ARENA_METRICS` - keep in-memory metrics (default: false)
    /// - `ARENA_BIND_ADDR` - listener address (default: 127.0.0.1:8765)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(max) = read_env::<usize>("ARENA_MAX_MATCHES") {
            config.max_matches = max.max(1);
        }
        if let Some(ms) = read_env::<u64>("ARENA_ROUND_DELAY_MS") {
            config.round_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>("ARENA_DECISION_TIMEOUT_MS") {
            config.decision_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = read_env::<u64>("ARENA_START_TIMEOUT_SECS") {
            config.start_timeout = Duration::from_secs(secs);
        }
        if let Some(buffer) = read_env::<usize>("ARENA_EVENT_BUFFER") {
            config.event_buffer = buffer.max(1);
        }
        if let Some(dir) = read_env::<PathBuf>("ARENA_ARCHIVE_DIR") {
            config.archive_dir = Some(dir);
        }
        if let Some(enabled) = read_env_bool("ARENA_METRICS") {
            config.metrics_enabled = enabled;
        }
        if let Ok(addr) = env::var("ARENA_BIND_ADDR") {
            config.bind_addr = addr;
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

fn read_env_bool(key: &str) -> Option<bool> {
    match env::var(key).ok()?.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Shared entry point for creating and running matches.
#[derive(Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    registry: MatchRegistry,
    decisions: Arc<dyn DecisionSourceFactory>,
    archive: Arc<dyn ArchiveSink>,
    metrics: Arc<dyn MetricsSink>,
    arena_metrics: Option<Arc<ArenaMetrics>>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// In-memory metrics, when enabled.
    pub fn metrics(&self) -> Option<&ArenaMetrics> {
        self.arena_metrics.as_deref()
    }

    /// Validates `request` and registers a new match. `seed` of `None` draws one.
    pub fn create_match(&self, request: MatchRequest, seed: Option<u64>) -> Result<MatchConfig> {
        self.registry.create_config(request, seed)
    }

    /// Runs a registered match to completion, delivering every event to `sink`
    /// and to the registry log.
    pub async fn run_match<S>(&self, config: MatchConfig, sink: S) -> MatchReport
    where
        S: EventSink,
    {
        let match_id = config.match_id.clone();
        if let Err(err) = self.registry.set_status(&match_id, MatchStatus::Running) {
            tracing::warn!(%match_id, error = %err, "match is not registered, re-registering");
            if let Err(err) = self
                .registry
                .register(config.clone())
                .and_then(|_| self.registry.set_status(&match_id, MatchStatus::Running))
            {
                tracing::error!(%match_id, error = %err, "failed to register match");
            }
        }

        let mut sink = RecordingSink::new(sink, self.registry.clone(), match_id.clone());
        let report = match config.game {
            GameKind::ResourceCapture => self.play::<ResourceCapture, _>(config, &mut sink).await,
            GameKind::Negotiation => self.play::<SequentialNegotiation, _>(config, &mut sink).await,
            GameKind::Auction => self.play::<SealedBidAuction, _>(config, &mut sink).await,
            GameKind::GpuBidding => self.play::<DynamicPriceBidding, _>(config, &mut sink).await,
        };

        if let Err(err) = self.registry.set_status(&match_id, report.status) {
            tracing::warn!(%match_id, error = %err, "failed to record final status");
        }
        report
    }

    /// Spawns a registered match on the tokio runtime. Events arrive on the
    /// returned receiver; dropping it disconnects the match.
    pub fn spawn_match(
        &self,
        config: MatchConfig,
    ) -> (JoinHandle<MatchReport>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        let runtime = self.clone();
        let handle =
            tokio::spawn(async move { runtime.run_match(config, ChannelSink::new(tx)).await });
        (handle, rx)
    }

    async fn play<V, S>(&self, config: MatchConfig, sink: &mut S) -> MatchReport
    where
        V: GameVariant,
        S: EventSink,
    {
        let sources: PerSide<Arc<dyn DecisionSource>> =
            PerSide::from_fn(|side| self.decisions.create(&config, side));
        Match::<V>::new(config, sources)
            .with_decision_timeout(self.config.decision_timeout)
            .with_archive(Arc::clone(&self.archive))
            .with_metrics(Arc::clone(&self.metrics))
            .run(sink)
            .await
    }
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    decisions: Option<Arc<dyn DecisionSourceFactory>>,
    archive: Option<Arc<dyn ArchiveSink>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            decisions: None,
            archive: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Decision sources for new matches; defaults to [`HeuristicFactory`].
    pub fn decisions(mut self, factory: impl DecisionSourceFactory + 'static) -> Self {
        self.decisions = Some(Arc::new(factory));
        self
    }

    /// Archive to use instead of the one implied by `archive_dir`.
    pub fn archive(mut self, archive: Arc<dyn ArchiveSink>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn round_delay(mut self, delay: Duration) -> Self {
        self.config.round_delay = delay;
        self
    }

    pub fn decision_timeout(mut self, timeout: Duration) -> Self {
        self.config.decision_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Runtime> {
        let archive: Arc<dyn ArchiveSink> = match (self.archive, &self.config.archive_dir) {
            (Some(archive), _) => archive,
            (None, Some(dir)) => Arc::new(FileArchive::open(dir)?),
            (None, None) => Arc::new(NoopArchive),
        };

        let arena_metrics = self
            .config
            .metrics_enabled
            .then(|| Arc::new(ArenaMetrics::new()));
        let metrics: Arc<dyn MetricsSink> = match &arena_metrics {
            Some(metrics) => Arc::clone(metrics) as Arc<dyn MetricsSink>,
            None => Arc::new(NoopMetrics),
        };

        let registry = MatchRegistry::new(self.config.max_matches)
            .with_round_delay(self.config.round_delay)
            .with_archive(Arc::clone(&archive));

        tracing::info!(
            max_matches = self.config.max_matches,
            round_delay_ms = self.config.round_delay.as_millis() as u64,
            decision_timeout_ms = self.config.decision_timeout.as_millis() as u64,
            archive = self.config.archive_dir.is_some(),
            metrics = self.config.metrics_enabled,
            "runtime initialized"
        );

        Ok(Runtime {
            decisions: self
                .decisions
                .unwrap_or_else(|| Arc::new(HeuristicFactory)),
            config: self.config,
            registry,
            archive,
            metrics,
            arena_metrics,
        })
    }
}
