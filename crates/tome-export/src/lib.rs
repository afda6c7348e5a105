//! Document emitters for the Tome campaign exporter.
//!
//! The [`Exporter`] drives the pipeline top-down: for each document it
//! assembles frontmatter, runs the document's rich text through the
//! conversion passes in `tome-pipeline`, and hands the finished Markdown
//! to the archive sink. Emission dispatches on [`DocumentKind`]
//! (journal, roll table, scene, playlist, generic record); every handler
//! produces the same thing — named archive entries.
//!
//! Per-kind layout templates are a black box behind [`TemplateEngine`];
//! when the host provides one and the configuration names a template for
//! a document's kind, the rendered output replaces the default
//! frontmatter-plus-data-dump record.
//!
//! [`DocumentKind`]: tome_graph::DocumentKind

mod emit;
mod frontmatter;
mod record;
mod scene;

pub use emit::Exporter;
pub use frontmatter::{document_icon, frontmatter};

use tome_graph::DocumentNode;

/// Renders a per-kind layout template over a document.
///
/// The engine owns template lookup and syntax; the exporter only needs
/// "render this template name with this document".
pub trait TemplateEngine {
    /// Render `template` with `doc` as its data.
    fn render(&self, template: &str, doc: &DocumentNode) -> Result<String, TemplateError>;
}

/// Error from a [`TemplateEngine`].
#[derive(Debug, thiserror::Error)]
#[error("template rendering failed: {0}")]
pub struct TemplateError(pub String);
