//! Runtime orchestration for two-sided arena matches.
//!
//! This crate wires decision sources, the per-match round loop, the event
//! stream and the match registry into a runtime API. Consumers embed
//! [`Runtime`] and either run matches directly or hand connections to a
//! [`transport`] session.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the shared runtime, its builder and configuration
//! - [`orchestrator`] drives a single match round by round
//! - [`api`] exposes the decision-source contract and error types
//! - [`events`] defines the wire events and where they are delivered
//! - [`repository`] keeps live matches and the optional archive
//! - [`transport`] runs client sessions over channels or TCP
pub mod api;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod repository;
pub mod runtime;
pub mod transport;

pub use api::{
    DecisionError, DecisionRequest, DecisionSource, DecisionSourceFactory, Prediction,
    PredictionResult, Result, RuntimeError, SinkError, TransportError,
};
pub use events::{AnnotatedPrediction, ChannelSink, ClientMessage, Event, EventSink};
pub use metrics::{ArenaMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use orchestrator::{GuessTally, Match, MatchReport};
pub use providers::{HeuristicDecisionSource, HeuristicFactory, Personality};
pub use repository::{
    ArchiveSink, FileArchive, MatchRegistry, MatchStatus, MatchSummary, MatchView, NoopArchive,
    RoundRecord,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use transport::{ControlReader, EventWriter, channel_transport, run_session};
