//! Destinations for the ordered event stream.
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Event;
use crate::api::TransportError;
use crate::repository::MatchRegistry;

/// Receives events in emission order.
///
/// An error means the consumer is gone and the match should stop at the
/// current suspension point.
#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError>;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for &mut S {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError> {
        (**self).emit(event).await
    }
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Box<S> {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError> {
        (**self).emit(event).await
    }
}

/// Collects events in memory; never fails.
#[async_trait]
impl EventSink for Vec<Event> {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError> {
        self.push(event);
        Ok(())
    }
}

/// Forwards events over a bounded channel. Backpressure suspends the match;
/// a dropped receiver disconnects it.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TransportError::Disconnected)
    }
}

/// Passes each event on and appends it to the registry log once delivered.
pub struct RecordingSink<S> {
    inner: S,
    registry: MatchRegistry,
    match_id: String,
}

impl<S> RecordingSink<S> {
    pub fn new(inner: S, registry: MatchRegistry, match_id: impl Into<String>) -> Self {
        Self {
            inner,
            registry,
            match_id: match_id.into(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: EventSink> EventSink for RecordingSink<S> {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError> {
        self.inner.emit(event.clone()).await?;
        if let Err(err) = self.registry.append_event(&self.match_id, event) {
            tracing::warn!(match_id = %self.match_id, error = %err, "failed to log event");
        }
        Ok(())
    }
}
