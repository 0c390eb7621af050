//! Streaming transport sessions.
//!
//! A session owns one connection split into an [`EventWriter`] and a
//! [`ControlReader`]. Before a match runs the client may send control queries
//! (`create_match`, `get_state`, `list_matches`, `replay`, `game_types`), each
//! answered with one event. `start_match` then runs a new match, or a created
//! one named by `matchId`, and streams its events until `match_end`. Any
//! client message while the match runs is a protocol error, and end-of-stream
//! on the reader cancels the match.

mod channel;
pub mod tcp;

use arena_core::GameKind;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use channel::{ChannelClient, ChannelReader, ChannelWriter, channel_transport};

use crate::api::{RuntimeError, TransportError};
use crate::events::{ClientMessage, Event};
use crate::orchestrator::MatchReport;
use crate::repository::MatchStatus;
use crate::runtime::Runtime;

const EXPECTED_START: &str = "Expected start_match message";
const DEFAULT_LIST_LIMIT: usize = 20;

/// Outbound half of a connection.
#[async_trait]
pub trait EventWriter: Send {
    async fn send(&mut self, event: &Event) -> Result<(), TransportError>;

    /// Closes the outbound half; later sends fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait ControlReader: Send {
    /// Next raw client message, `None` once the peer has closed the stream.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

/// Drives one connection from `start_match` to `match_end`.
///
/// Control queries before `start_match` are answered in place; each message
/// restarts the start timeout.
pub async fn run_session<W, R>(
    runtime: &Runtime,
    writer: &mut W,
    reader: &mut R,
) -> Result<MatchReport, TransportError>
where
    W: EventWriter + ?Sized,
    R: ControlReader + ?Sized,
{
    let start_timeout = runtime.config().start_timeout;
    let (requested_id, request) = loop {
        let text = match tokio::time::timeout(start_timeout, reader.recv()).await {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => return Err(TransportError::Disconnected),
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                reject(writer, "Timed out waiting for start_match message").await;
                return Err(TransportError::StartTimeout(start_timeout));
            }
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::StartMatch { match_id, request }) => break (match_id, request),
            Ok(query) => answer(runtime, writer, query).await?,
            Err(err) => {
                debug!(error = %err, "rejecting control message");
                reject(writer, EXPECTED_START).await;
                return Err(TransportError::Protocol(EXPECTED_START.to_string()));
            }
        }
    };

    let config = match requested_id {
        Some(match_id) => match runtime.registry().claim(&match_id) {
            Ok(config) => config,
            Err(RuntimeError::MatchNotFound(_)) => {
                reject(writer, &format!("Unknown match: {match_id}")).await;
                return Err(TransportError::UnknownMatch(match_id));
            }
            Err(err) => {
                reject(writer, &err.to_string()).await;
                return Err(TransportError::Protocol(err.to_string()));
            }
        },
        None => match runtime.create_match(request, None) {
            Ok(config) => config,
            Err(RuntimeError::Config(err)) => {
                reject(writer, &err.to_string()).await;
                return Err(TransportError::InvalidConfig(err));
            }
            Err(err) => {
                reject(writer, &err.to_string()).await;
                return Err(TransportError::Protocol(err.to_string()));
            }
        },
    };

    let match_id = config.match_id.clone();
    info!(%match_id, game = %config.game, rounds = config.total_rounds, "session started match");
    let (handle, mut events) = runtime.spawn_match(config);

    let streamed = stream(writer, reader, &mut events).await;
    match streamed {
        Ok(()) => {
            let report = handle
                .await
                .map_err(|err| TransportError::Protocol(format!("match task failed: {err}")))?;
            writer.close().await?;
            Ok(report)
        }
        Err(err) => {
            handle.abort();
            drop(events);
            // Wait for the aborted task so its status write lands before ours.
            let _ = handle.await;
            if let Err(status_err) = runtime
                .registry()
                .set_status(&match_id, MatchStatus::Disconnected)
            {
                warn!(%match_id, error = %status_err, "failed to mark match disconnected");
            }
            let _ = writer.close().await;
            warn!(%match_id, error = %err, "session ended early");
            Err(err)
        }
    }
}

/// Forwards events up to `match_end`, failing on the first client message or
/// disconnect.
async fn stream<W, R>(
    writer: &mut W,
    reader: &mut R,
    events: &mut mpsc::Receiver<Event>,
) -> Result<(), TransportError>
where
    W: EventWriter + ?Sized,
    R: ControlReader + ?Sized,
{
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    writer.send(&event).await?;
                    if event.is_terminal() {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            },
            message = reader.recv() => match message? {
                Some(_) => {
                    let reason = "Unexpected message while match is running";
                    if let Err(err) = writer.send(&Event::error(reason)).await {
                        debug!(error = %err, "could not report protocol error");
                    }
                    return Err(TransportError::Protocol(reason.to_string()));
                }
                None => return Err(TransportError::Disconnected),
            },
        }
    }
}

/// Replies to a message other than `start_match`. Failed lookups are reported
/// to the client and do not end the session.
async fn answer<W>(
    runtime: &Runtime,
    writer: &mut W,
    query: ClientMessage,
) -> Result<(), TransportError>
where
    W: EventWriter + ?Sized,
{
    let registry = runtime.registry().clone();
    let reply = match query {
        ClientMessage::CreateMatch(request) => match runtime.create_match(request, None) {
            Ok(config) => {
                info!(match_id = %config.match_id, game = %config.game, "session created match");
                Event::MatchCreated {
                    match_id: config.match_id.clone(),
                    config,
                }
            }
            Err(err) => Event::error(err.to_string()),
        },
        ClientMessage::GetState { match_id } => match registry.state(&match_id) {
            Ok(view) => Event::MatchState(Box::new(view)),
            Err(err) => Event::error(err.to_string()),
        },
        ClientMessage::ListMatches { limit } => {
            let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
            // The archive reads files.
            match tokio::task::spawn_blocking(move || registry.recent(limit)).await {
                Ok(matches) => Event::Matches { matches },
                Err(err) => Event::error(format!("listing failed: {err}")),
            }
        }
        ClientMessage::Replay { match_id } => {
            let id = match_id.clone();
            match tokio::task::spawn_blocking(move || registry.replay(&id)).await {
                Ok(Ok(events)) => Event::Replay { match_id, events },
                Ok(Err(err)) => Event::error(err.to_string()),
                Err(err) => Event::error(format!("replay failed: {err}")),
            }
        }
        ClientMessage::GameTypes => Event::GameTypes {
            games: GameKind::catalogue(),
        },
        ClientMessage::StartMatch { .. } => {
            return Err(TransportError::Protocol(
                "start_match is not a query".to_string(),
            ));
        }
    };
    debug!(reply = reply.kind(), "answered control message");
    writer.send(&reply).await
}

async fn reject<W>(writer: &mut W, message: &str)
where
    W: EventWriter + ?Sized,
{
    if let Err(err) = writer.send(&Event::error(message)).await {
        debug!(error = %err, "could not deliver rejection");
    }
    if let Err(err) = writer.close().await {
        debug!(error = %err, "could not close rejected connection");
    }
}
