//! Frontmatter assembly.

use tome_graph::{DocumentKind, DocumentNode};

/// Emoji short-code shown as the note icon, per document kind.
#[must_use]
pub fn document_icon(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Actor => ":user:",
        DocumentKind::Cards => ":spade:",
        DocumentKind::Item => ":luggage:",
        DocumentKind::Folder => ":folder:",
        DocumentKind::Journal => ":book:",
        DocumentKind::JournalPage => ":sticky-note:",
        DocumentKind::Macro => ":scroll:",
        DocumentKind::Playlist | DocumentKind::PlaylistSound => ":music:",
        DocumentKind::RollTable => ":list:",
        DocumentKind::Scene => ":map:",
        DocumentKind::Other => ":file-question:",
    }
}

/// Build the frontmatter block for a document, optionally followed by a
/// top-level heading carrying its name.
#[must_use]
pub fn frontmatter(doc: &DocumentNode, show_header: bool) -> String {
    let header = if show_header {
        format!("\n# {}\n", doc.display_name)
    } else {
        String::new()
    };
    format!(
        "---\n\
         title: \"{name}\"\n\
         icon: \"{icon}\"\n\
         aliases: \"{name}\"\n\
         sourceId: {id}\n\
         tags:\n  - {tag}\n\
         ---\n\
         {header}",
        name = doc.display_name,
        icon = document_icon(doc.kind),
        id = doc.identifier,
        tag = doc.kind.link_tag(),
    )
}
