//! Bounded in-memory registry of live matches.
//!
//! Entries are kept in insertion order; once the registry is full the oldest
//! match is evicted. Older matches remain reachable through the archive.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use arena_core::{MatchConfig, MatchRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::archive::{ArchiveSink, NoopArchive};
use super::types::{MatchStatus, MatchSummary};
use crate::api::{Result, RuntimeError};
use crate::events::Event;

pub const DEFAULT_CAPACITY: usize = 100;

struct MatchEntry {
    config: MatchConfig,
    status: MatchStatus,
    events: Vec<Event>,
    created_at: DateTime<Utc>,
}

impl MatchEntry {
    /// Last `round_end` or `match_end`, the events that carry standings.
    fn last_standing(&self) -> Option<&Event> {
        self.events
            .iter()
            .rev()
            .find(|event| matches!(event, Event::RoundEnd { .. } | Event::MatchEnd { .. }))
    }

    fn summary(&self) -> MatchSummary {
        let mut summary = MatchSummary::pending(&self.config, self.status, self.created_at);
        summary.event_count = self.events.len();
        match self.last_standing() {
            Some(Event::MatchEnd {
                winner,
                final_scores,
                prediction_accuracy,
                ..
            }) => {
                summary.winner = Some(*winner);
                summary.final_scores = Some(*final_scores);
                summary.accuracy = Some(*prediction_accuracy);
            }
            Some(Event::RoundEnd { scores, .. }) => {
                summary.final_scores = Some(*scores);
            }
            _ => {}
        }
        summary
    }
}

#[derive(Default)]
struct Inner {
    order: VecDeque<String>,
    entries: HashMap<String, MatchEntry>,
}

/// Detailed view of one live match.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub config: MatchConfig,
    pub status: MatchStatus,
    pub last_event: Option<Event>,
    pub event_count: usize,
}

/// Shared handle to the registry; clones see the same matches.
#[derive(Clone)]
pub struct MatchRegistry {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
    round_delay: Duration,
    archive: Arc<dyn ArchiveSink>,
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MatchRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity: capacity.max(1),
            round_delay: Duration::ZERO,
            archive: Arc::new(NoopArchive),
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchiveSink>) -> Self {
        self.archive = archive;
        self
    }

    /// Inter-round delay stamped into configs built by [`create`](Self::create).
    pub fn with_round_delay(mut self, round_delay: Duration) -> Self {
        self.round_delay = round_delay;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates `request`, assigns a fresh id and registers the match.
    pub fn create(&self, request: MatchRequest) -> Result<String> {
        Ok(self.create_config(request, None)?.match_id)
    }

    /// Like [`create`](Self::create) but returns the frozen config. `seed` of
    /// `None` draws a random one.
    pub fn create_config(&self, request: MatchRequest, seed: Option<u64>) -> Result<MatchConfig> {
        let match_id = self.fresh_id()?;
        let config = request.into_config(match_id, self.round_delay, seed)?;
        self.register(config.clone())?;
        Ok(config)
    }

    /// Inserts `config` as a `created` match, replacing any entry with the same
    /// id and evicting the oldest entries beyond capacity.
    pub fn register(&self, config: MatchConfig) -> Result<()> {
        let mut inner = self.write()?;
        let match_id = config.match_id.clone();

        if inner.entries.remove(&match_id).is_some() {
            inner.order.retain(|id| id != &match_id);
        }
        inner.order.push_back(match_id.clone());
        inner.entries.insert(
            match_id.clone(),
            MatchEntry {
                config,
                status: MatchStatus::Created,
                events: Vec::new(),
                created_at: Utc::now(),
            },
        );

        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
                tracing::debug!(match_id = %evicted, "evicted match from registry");
            }
        }
        tracing::debug!(%match_id, "registered match");
        Ok(())
    }

    pub fn status(&self, match_id: &str) -> Result<MatchStatus> {
        let inner = self.read()?;
        inner
            .entries
            .get(match_id)
            .map(|entry| entry.status)
            .ok_or_else(|| RuntimeError::MatchNotFound(match_id.to_string()))
    }

    pub fn set_status(&self, match_id: &str, status: MatchStatus) -> Result<()> {
        let mut inner = self.write()?;
        let entry = inner
            .entries
            .get_mut(match_id)
            .ok_or_else(|| RuntimeError::MatchNotFound(match_id.to_string()))?;
        if entry.status != status {
            tracing::debug!(%match_id, from = %entry.status, to = %status, "match status changed");
            entry.status = status;
        }
        Ok(())
    }

    /// Hands a created match to exactly one runner: moves it to `Running` and
    /// returns its config. Fails once another caller has claimed it.
    pub fn claim(&self, match_id: &str) -> Result<MatchConfig> {
        let mut inner = self.write()?;
        let entry = inner
            .entries
            .get_mut(match_id)
            .ok_or_else(|| RuntimeError::MatchNotFound(match_id.to_string()))?;
        if entry.status != MatchStatus::Created {
            return Err(RuntimeError::MatchStarted {
                match_id: match_id.to_string(),
                status: entry.status,
            });
        }
        entry.status = MatchStatus::Running;
        tracing::debug!(%match_id, "match claimed");
        Ok(entry.config.clone())
    }

    pub fn append_event(&self, match_id: &str, event: Event) -> Result<()> {
        let mut inner = self.write()?;
        let entry = inner
            .entries
            .get_mut(match_id)
            .ok_or_else(|| RuntimeError::MatchNotFound(match_id.to_string()))?;
        entry.events.push(event);
        Ok(())
    }

    pub fn state(&self, match_id: &str) -> Result<MatchView> {
        let inner = self.read()?;
        let entry = inner
            .entries
            .get(match_id)
            .ok_or_else(|| RuntimeError::MatchNotFound(match_id.to_string()))?;
        Ok(MatchView {
            config: entry.config.clone(),
            status: entry.status,
            last_event: entry.last_standing().cloned(),
            event_count: entry.events.len(),
        })
    }

    /// Summaries of live matches in insertion order.
    pub fn list(&self) -> Result<Vec<MatchSummary>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .map(MatchEntry::summary)
            .collect())
    }

    /// Newest matches first: live entries, then archived ones not already
    /// listed. Archive failures only shorten the result.
    pub fn recent(&self, limit: usize) -> Vec<MatchSummary> {
        let mut summaries: Vec<MatchSummary> = match self.list() {
            Ok(live) => live.into_iter().rev().take(limit).collect(),
            Err(err) => {
                tracing::warn!(error = %err, "registry unavailable for recent matches");
                Vec::new()
            }
        };

        if summaries.len() < limit {
            match self.archive.recent(limit) {
                Ok(archived) => {
                    for summary in archived {
                        if summaries.len() >= limit {
                            break;
                        }
                        if !summaries.iter().any(|s| s.match_id == summary.match_id) {
                            summaries.push(summary);
                        }
                    }
                }
                Err(err) => tracing::warn!(error = %err, "archive unavailable for recent matches"),
            }
        }
        summaries
    }

    /// Event log of a match: live events if it is still registered, otherwise
    /// the archived entries.
    pub fn replay(&self, match_id: &str) -> Result<Vec<Value>> {
        {
            let inner = self.read()?;
            if let Some(entry) = inner.entries.get(match_id) {
                return entry
                    .events
                    .iter()
                    .map(|event| serde_json::to_value(event).map_err(crate::api::SinkError::from))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(RuntimeError::from);
            }
        }

        self.archive
            .replay(match_id)?
            .ok_or_else(|| RuntimeError::MatchNotFound(match_id.to_string()))
    }

    fn fresh_id(&self) -> Result<String> {
        let inner = self.read()?;
        loop {
            let id = format!("match_{}", hex::encode(rand::random::<[u8; 4]>()));
            if !inner.entries.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| RuntimeError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| RuntimeError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use arena_core::{GameKind, Outcome, PerSide};

    use super::*;

    fn request() -> MatchRequest {
        MatchRequest::new(GameKind::ResourceCapture, "aggressive", "defensive", 3)
    }

    #[test]
    fn ids_have_prefix_and_eight_hex_chars() {
        let registry = MatchRegistry::default();
        let id = registry.create(request()).unwrap();
        let suffix = id.strip_prefix("match_").expect("prefix");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(registry.status(&id).unwrap(), MatchStatus::Created);
    }

    #[test]
    fn invalid_requests_are_not_registered() {
        let registry = MatchRegistry::default();
        let result = registry.create(MatchRequest {
            game_type: "chess".into(),
            ..request()
        });
        assert!(matches!(result, Err(RuntimeError::Config(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn evicts_oldest_first() {
        let registry = MatchRegistry::new(2);
        let first = registry.create(request()).unwrap();
        let second = registry.create(request()).unwrap();
        let third = registry.create(request()).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(matches!(
            registry.status(&first),
            Err(RuntimeError::MatchNotFound(_))
        ));
        let ids: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.match_id)
            .collect();
        assert_eq!(ids, vec![second, third]);
    }

    #[test]
    fn state_reports_last_standing_event() {
        let registry = MatchRegistry::default();
        let id = registry.create(request()).unwrap();
        registry.set_status(&id, MatchStatus::Running).unwrap();
        registry
            .append_event(&id, Event::error("ignored by standings"))
            .unwrap();
        let end = Event::MatchEnd {
            winner: Outcome::SideB,
            final_scores: PerSide::new(10, 40),
            total_guesses_examined: 6,
            prediction_accuracy: PerSide::new(0.33, 0.67),
        };
        registry.append_event(&id, end.clone()).unwrap();

        let view = registry.state(&id).unwrap();
        assert_eq!(view.status, MatchStatus::Running);
        assert_eq!(view.event_count, 2);
        assert_eq!(view.last_event, Some(end));

        let summary = &registry.list().unwrap()[0];
        assert_eq!(summary.winner, Some(Outcome::SideB));
        assert_eq!(summary.final_scores, Some(PerSide::new(10, 40)));
    }

    #[test]
    fn register_replaces_existing_id() {
        let registry = MatchRegistry::default();
        let config = registry.create_config(request(), Some(1)).unwrap();
        registry
            .append_event(&config.match_id, Event::error("x"))
            .unwrap();
        registry.register(config.clone()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(&config.match_id).unwrap().event_count, 0);
    }

    #[test]
    fn replay_prefers_live_events() {
        let registry = MatchRegistry::default();
        let id = registry.create(request()).unwrap();
        registry.append_event(&id, Event::error("boom")).unwrap();

        let events = registry.replay(&id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "error");
        assert!(matches!(
            registry.replay("match_missing"),
            Err(RuntimeError::MatchNotFound(_))
        ));
    }

    #[test]
    fn recent_lists_newest_live_first() {
        let registry = MatchRegistry::default();
        let older = registry.create(request()).unwrap();
        let newer = registry.create(request()).unwrap();
        let recent = registry.recent(5);
        assert_eq!(recent[0].match_id, newer);
        assert_eq!(recent[1].match_id, older);
        assert_eq!(registry.recent(1).len(), 1);
    }

    #[test]
    fn created_match_is_claimed_once() {
        let registry = MatchRegistry::default();
        let id = registry.create(request()).unwrap();

        let config = registry.claim(&id).unwrap();
        assert_eq!(config.match_id, id);
        assert_eq!(registry.status(&id).unwrap(), MatchStatus::Running);
        assert!(matches!(
            registry.claim(&id),
            Err(RuntimeError::MatchStarted {
                status: MatchStatus::Running,
                ..
            })
        ));
        assert!(matches!(
            registry.claim("match_missing"),
            Err(RuntimeError::MatchNotFound(_))
        ));
    }
}
