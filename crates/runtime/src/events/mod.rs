//! Match event stream.
//!
//! [`Event`] is the wire format streamed to clients; [`EventSink`] is where the
//! orchestrator delivers it. A failed delivery means the consumer went away.

mod sink;
mod types;

pub use sink::{ChannelSink, EventSink, RecordingSink};
pub use types::{AgentInfo, AnnotatedPrediction, ClientMessage, Event};
