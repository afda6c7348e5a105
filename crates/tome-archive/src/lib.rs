//! Archive sink and media collection for the Tome campaign exporter.
//!
//! The export run writes everything into a single [`ArchiveSink`]: Markdown
//! notes are stored immediately, while referenced media files are registered
//! as *pending fetch tasks* keyed by a normalized, deduplicated name. The
//! archive builder drains those tasks through a [`MediaSource`] when
//! [`ArchiveSink::finish`] runs — a failed fetch degrades to an empty
//! placeholder entry, never an aborted export.
//!
//! The actual container format (zip or otherwise) is the host's concern;
//! `finish` hands back named byte buffers in insertion order.

mod fetch;
mod marker;
mod sink;

pub use fetch::{DirectoryMediaSource, FetchError, HttpMediaSource, MediaSource};
pub use marker::format_link;
pub use sink::{ArchiveEntry, ArchiveSink};
