//! Repository layer for match data.
//!
//! - [`MatchRegistry`] holds live matches in memory, bounded and
//!   insertion-ordered.
//! - [`ArchiveSink`] is the optional persistence layer behind it, receiving
//!   match starts, round records and final summaries.

mod archive;
mod registry;
mod types;

pub use archive::{ArchiveSink, FileArchive, NoopArchive};
pub use registry::{DEFAULT_CAPACITY, MatchRegistry, MatchView};
pub use types::{MatchStatus, MatchSummary, RoundRecord};
