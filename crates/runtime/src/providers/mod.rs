//! Built-in decision source implementations.

pub mod heuristic;

pub use heuristic::{HeuristicDecisionSource, HeuristicFactory, Personality};
