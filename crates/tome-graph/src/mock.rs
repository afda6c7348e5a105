//! In-memory document graph for tests and embedders.

use std::collections::HashMap;

use crate::{DocumentGraph, DocumentNode, GraphError, ParentRef};

/// A [`DocumentGraph`] backed by a `HashMap`.
///
/// Lookups are exact-match on the fully-qualified identifier. Relative
/// identifiers are resolved by the link resolver before they reach the
/// graph, so the mock never sees them.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: HashMap<String, DocumentNode>,
}

impl MemoryGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, keyed by its identifier.
    pub fn insert(&mut self, node: DocumentNode) {
        self.nodes.insert(node.identifier.clone(), node);
    }

    /// Insert a journal and all of its pages.
    ///
    /// Pages are additionally registered under their own identifiers with
    /// a [`ParentRef`] wired up, so page-targeted links resolve and the
    /// single-page collapse rule has the sibling count it needs.
    pub fn insert_journal(&mut self, journal: DocumentNode) {
        let parent = ParentRef {
            identifier: journal.identifier.clone(),
            display_name: journal.display_name.clone(),
            page_count: journal.pages.len(),
        };
        for page in &journal.pages {
            let mut page = page.clone();
            page.parent = Some(parent.clone());
            self.nodes.insert(page.identifier.clone(), page);
        }
        self.nodes.insert(journal.identifier.clone(), journal);
    }

    /// Number of stored nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DocumentGraph for MemoryGraph {
    fn resolve(&self, identifier: &str) -> Result<DocumentNode, GraphError> {
        self.nodes
            .get(identifier)
            .cloned()
            .ok_or_else(|| GraphError::NotFound {
                identifier: identifier.to_owned(),
            })
    }

    fn load_description(&self, identifier: &str) -> Result<String, GraphError> {
        let node = self.resolve(identifier)?;
        node.description.ok_or_else(|| GraphError::NotFound {
            identifier: identifier.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentBody, DocumentKind, PageBody, PageContent};

    fn page(id: &str, title: &str) -> DocumentNode {
        let mut node = DocumentNode::new(id, title, DocumentKind::JournalPage);
        node.body = DocumentBody::Page(PageBody {
            heading_level: 1,
            show_title: true,
            sort: 0,
            content: PageContent::Html("<p>text</p>".to_owned()),
        });
        node
    }

    #[test]
    fn resolve_miss_is_not_found() {
        let graph = MemoryGraph::new();
        let err = graph.resolve("Actor.missing").unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }));
    }

    #[test]
    fn insert_journal_registers_pages_with_parent() {
        let mut journal = DocumentNode::new("JournalEntry.j1", "Guide", DocumentKind::Journal);
        journal.pages = vec![
            page("JournalEntry.j1.JournalEntryPage.p1", "Intro"),
            page("JournalEntry.j1.JournalEntryPage.p2", "Detail"),
        ];

        let mut graph = MemoryGraph::new();
        graph.insert_journal(journal);

        let resolved = graph.resolve("JournalEntry.j1.JournalEntryPage.p2").unwrap();
        let parent = resolved.parent.expect("page should carry a parent ref");
        assert_eq!(parent.display_name, "Guide");
        assert_eq!(parent.page_count, 2);
    }

    #[test]
    fn load_description_requires_description() {
        let mut node = DocumentNode::new("Item.sword", "Sword", DocumentKind::Item);
        node.description = Some("<p>Sharp.</p>".to_owned());

        let mut graph = MemoryGraph::new();
        graph.insert(node);
        graph.insert(DocumentNode::new("Item.rock", "Rock", DocumentKind::Item));

        assert_eq!(graph.load_description("Item.sword").unwrap(), "<p>Sharp.</p>");
        assert!(graph.load_description("Item.rock").is_err());
    }
}
