//! Document-graph contracts for the Tome campaign exporter.
//!
//! The exporter reads documents out of a host-owned document store (a
//! virtual-tabletop campaign database). This crate defines the minimal
//! shape the rest of the workspace needs from that store:
//!
//! - [`DocumentNode`] and its per-kind body payloads — the fully-populated
//!   internal record a host adapter builds from its own schema
//! - [`DocumentGraph`] — identifier lookup, plus the one call that may
//!   perform I/O ([`DocumentGraph::load_description`], used only for embed
//!   expansion)
//! - [`Localizer`] — localization-key lookup for `@Localize` tags
//!
//! With the `mock` feature enabled, [`mock::MemoryGraph`] provides an
//! in-memory implementation for tests and embedders.

mod node;

#[cfg(feature = "mock")]
pub mod mock;

pub use node::{
    DocumentBody, DocumentKind, DocumentNode, PageBody, PageContent, ParentRef, PlaylistBody,
    PlaylistTrack, RecordBody, SceneBody, SceneNote, SceneRect, SceneTile, TableBody, TableRow,
};

/// Error from a document-graph lookup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GraphError {
    /// No document exists under the given identifier.
    #[error("no document found for identifier '{identifier}'")]
    NotFound {
        /// The identifier that failed to resolve.
        identifier: String,
    },

    /// The backing store failed (I/O, deserialization, ...).
    #[error("document store error: {0}")]
    Backend(String),
}

/// Read access to the host's document graph.
///
/// [`resolve`](Self::resolve) must be non-suspending by construction: the
/// synchronous link resolver calls it from contexts (template rendering)
/// that structurally require synchronous results. Lookups that would need
/// to hit slow storage should return [`GraphError::NotFound`] instead of
/// blocking; callers degrade to a literal fallback link.
///
/// [`load_description`](Self::load_description) is the one call permitted
/// to perform I/O. It is only used to expand `@Embed` tags.
pub trait DocumentGraph {
    /// Look up a document by fully-qualified identifier.
    fn resolve(&self, identifier: &str) -> Result<DocumentNode, GraphError>;

    /// Fetch the description field of a document for embed expansion.
    ///
    /// May block on storage access.
    fn load_description(&self, identifier: &str) -> Result<String, GraphError>;
}

/// Localization-key lookup for `@Localize` tags.
pub trait Localizer {
    /// Return the localized string for `key`, or `None` if unknown.
    fn localize(&self, key: &str) -> Option<String>;
}

/// A localizer with no entries; every lookup misses.
impl Localizer for () {
    fn localize(&self, _key: &str) -> Option<String> {
        None
    }
}

impl Localizer for std::collections::HashMap<String, String> {
    fn localize(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
