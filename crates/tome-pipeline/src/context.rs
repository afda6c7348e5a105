//! Per-export pipeline state.

use std::cell::RefCell;

use tome_archive::ArchiveSink;
use tome_config::{IconStyle, IdentifierNaming};
use tome_graph::{DocumentGraph, Localizer};

/// Everything an export run threads through the rewrite passes.
///
/// Constructed once per export and passed by reference; the sink uses
/// interior mutability because the whole pipeline is single-threaded by
/// construction (media fetches are deferred to archive build time, not
/// run concurrently).
pub struct PipelineContext<'a> {
    /// The host's document graph.
    pub graph: &'a dyn DocumentGraph,
    /// Localization lookup for `@Localize` tags.
    pub localizer: &'a dyn Localizer,
    /// Shared archive sink collecting notes and media.
    pub sink: &'a RefCell<ArchiveSink>,
    /// Naming convention for link targets and note filenames.
    pub naming: IdentifierNaming,
    /// Action-cost icon rendering.
    pub icons: IconStyle,
}

impl<'a> PipelineContext<'a> {
    /// Create a context over the given collaborators and settings.
    #[must_use]
    pub fn new(
        graph: &'a dyn DocumentGraph,
        localizer: &'a dyn Localizer,
        sink: &'a RefCell<ArchiveSink>,
        naming: IdentifierNaming,
        icons: IconStyle,
    ) -> Self {
        Self {
            graph,
            localizer,
            sink,
            naming,
            icons,
        }
    }

    /// Collect a referenced media file into the archive.
    ///
    /// See [`ArchiveSink::collect_file`]; returns the link marker for the
    /// collected asset, or `None` for paths that are not fetchable files.
    pub fn collect_file(&self, path: &str, label: Option<&str>, inline: bool) -> Option<String> {
        self.sink.borrow_mut().collect_file(path, label, inline)
    }
}
