//! In-process transport over a pair of tokio channels.
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ControlReader, EventWriter};
use crate::api::TransportError;
use crate::events::{ClientMessage, Event};

/// Server-side outbound half.
pub struct ChannelWriter {
    tx: Option<mpsc::Sender<Event>>,
}

#[async_trait]
impl EventWriter for ChannelWriter {
    async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(event.clone())
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// Server-side inbound half.
pub struct ChannelReader {
    rx: mpsc::Receiver<String>,
}

#[async_trait]
impl ControlReader for ChannelReader {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

/// Client end of an in-process connection.
pub struct ChannelClient {
    control: Option<mpsc::Sender<String>>,
    events: mpsc::Receiver<Event>,
}

impl ChannelClient {
    /// Sends a raw control message.
    pub async fn send_raw(&self, message: impl Into<String>) -> Result<(), TransportError> {
        let control = self.control.as_ref().ok_or(TransportError::Disconnected)?;
        control
            .send(message.into())
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    pub async fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        self.send_raw(serde_json::to_string(message)?).await
    }

    /// Next event, `None` once the server closed its half.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Closes the control half, which the server reads as a disconnect.
    pub fn hang_up(&mut self) {
        self.control = None;
    }
}

/// Builds a connected in-process transport with `buffer` slots per direction.
pub fn channel_transport(buffer: usize) -> (ChannelWriter, ChannelReader, ChannelClient) {
    let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
    let (control_tx, control_rx) = mpsc::channel(buffer.max(1));
    (
        ChannelWriter { tx: Some(event_tx) },
        ChannelReader { rx: control_rx },
        ChannelClient {
            control: Some(control_tx),
            events: event_rx,
        },
    )
}
