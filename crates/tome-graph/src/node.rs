//! Document records and per-kind body payloads.

use std::collections::BTreeMap;

/// Kind of a document in the campaign store.
///
/// The variants mirror the document types the store links between. Link
/// tags in rich text name these kinds directly (`@JournalEntry[...]`,
/// `@RollTable[...]`); [`DocumentKind::from_link_tag`] maps tag names to
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentKind {
    /// A journal entry (one or more pages).
    Journal,
    /// A single page inside a journal entry.
    JournalPage,
    /// A rollable table.
    RollTable,
    /// A scene (map).
    Scene,
    /// A playlist of audio tracks.
    Playlist,
    /// A single sound inside a playlist.
    PlaylistSound,
    /// An actor (creature, NPC, character).
    Actor,
    /// An item (equipment, spell, feat, ...).
    Item,
    /// A macro.
    Macro,
    /// A card stack.
    Cards,
    /// A folder grouping other documents.
    Folder,
    /// Any other document kind; exported as a generic record.
    #[default]
    Other,
}

impl DocumentKind {
    /// Map a link tag name (`@JournalEntry[...]`) to a kind.
    ///
    /// Returns `None` for tags that are not document links (`@Check`,
    /// `@Damage`, `@Localize`, ...).
    #[must_use]
    pub fn from_link_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "JournalEntry" => Self::Journal,
            "JournalEntryPage" => Self::JournalPage,
            "RollTable" => Self::RollTable,
            "Scene" => Self::Scene,
            "Playlist" => Self::Playlist,
            "PlaylistSound" => Self::PlaylistSound,
            "Actor" => Self::Actor,
            "Item" => Self::Item,
            "Macro" => Self::Macro,
            "Cards" => Self::Cards,
            "Folder" => Self::Folder,
            _ => return None,
        })
    }

    /// The tag name used for this kind in link syntax and frontmatter tags.
    #[must_use]
    pub fn link_tag(self) -> &'static str {
        match self {
            Self::Journal => "JournalEntry",
            Self::JournalPage => "JournalEntryPage",
            Self::RollTable => "RollTable",
            Self::Scene => "Scene",
            Self::Playlist => "Playlist",
            Self::PlaylistSound => "PlaylistSound",
            Self::Actor => "Actor",
            Self::Item => "Item",
            Self::Macro => "Macro",
            Self::Cards => "Cards",
            Self::Folder => "Folder",
            Self::Other => "Document",
        }
    }
}

/// Reference to a document's parent, carried on child nodes.
///
/// Used to collapse single-page journals to their parent's name and to
/// build composite labels when a target resolves only via its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// Identifier of the parent document.
    pub identifier: String,
    /// Display name of the parent document.
    pub display_name: String,
    /// Number of sibling pages under the parent (including this one).
    pub page_count: usize,
}

/// A document record, fully populated by the host adapter.
///
/// Fields the host cannot provide stay at their defaults; the exporter
/// treats absent data as "nothing to emit" rather than an error.
#[derive(Debug, Clone, Default)]
pub struct DocumentNode {
    /// Opaque path-like identifier (`JournalEntry.abc.JournalEntryPage.def`).
    pub identifier: String,
    /// Human-readable name.
    pub display_name: String,
    /// Document kind; drives emitter dispatch.
    pub kind: DocumentKind,
    /// Display name of the containing folder, if any.
    pub parent_folder: Option<String>,
    /// Display name of the containing collection (compendium pack), if any.
    pub collection: Option<String>,
    /// Parent document, for pages and other nested records.
    pub parent: Option<ParentRef>,
    /// Item/spell level, consumed by formula evaluation.
    pub level: Option<i64>,
    /// Portrait or cover image path.
    pub image: Option<String>,
    /// Description field (rich text), used for embeds and record bodies.
    pub description: Option<String>,
    /// Table of contents: heading slug → human-readable heading text.
    pub toc: BTreeMap<String, String>,
    /// Ordered pages, for journals.
    pub pages: Vec<DocumentNode>,
    /// Raw record data for the data-dump section of generic records.
    pub data: Option<serde_json::Value>,
    /// Kind-specific payload.
    pub body: DocumentBody,
}

impl DocumentNode {
    /// Create a node with the given identity; everything else defaults.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        kind: DocumentKind,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            kind,
            ..Self::default()
        }
    }
}

/// Kind-specific document payload.
#[derive(Debug, Clone, Default)]
pub enum DocumentBody {
    /// No payload (link-only nodes, folders).
    #[default]
    None,
    /// A journal page.
    Page(PageBody),
    /// A rollable table.
    Table(TableBody),
    /// A scene map.
    Scene(SceneBody),
    /// A playlist.
    Playlist(PlaylistBody),
    /// A generic record (actor, item, ...).
    Record(RecordBody),
}

/// Journal page payload.
#[derive(Debug, Clone)]
pub struct PageBody {
    /// Heading level of the page title (1-based).
    pub heading_level: u8,
    /// Whether the title is rendered above the content.
    pub show_title: bool,
    /// Sort key within the journal.
    pub sort: i64,
    /// Page content.
    pub content: PageContent,
}

/// Content of a journal page.
#[derive(Debug, Clone)]
pub enum PageContent {
    /// Rich text in the store's HTML dialect.
    Html(String),
    /// Text already authored as Markdown; passed through untouched.
    Markdown(String),
    /// An image page.
    Image {
        /// Media path.
        src: String,
        /// Optional caption shown below the image.
        caption: Option<String>,
    },
    /// A PDF page.
    Pdf {
        /// Media path.
        src: String,
    },
    /// A video page.
    Video {
        /// Media path.
        src: String,
    },
    /// An empty page.
    Empty,
}

/// Rollable-table payload.
#[derive(Debug, Clone, Default)]
pub struct TableBody {
    /// Table description (rich text).
    pub description: Option<String>,
    /// Roll formula shown in the header column (e.g. `1d20`).
    pub formula: Option<String>,
    /// Result rows.
    pub rows: Vec<TableRow>,
}

/// One row of a rollable table.
#[derive(Debug, Clone)]
pub struct TableRow {
    /// Low end of the roll range.
    pub low: i64,
    /// High end of the roll range.
    pub high: i64,
    /// Result text (rich text).
    pub text: String,
}

/// Scene payload: map geometry plus placed media and notes.
#[derive(Debug, Clone, Default)]
pub struct SceneBody {
    /// The scene rectangle, in pixels.
    pub rect: SceneRect,
    /// Map units per grid square.
    pub grid_distance: f64,
    /// Pixels per grid square.
    pub grid_size: f64,
    /// Unit label (e.g. `ft`).
    pub grid_units: String,
    /// Background image path.
    pub background: Option<String>,
    /// Foreground overlay image path.
    pub foreground: Option<String>,
    /// Placed tiles.
    pub tiles: Vec<SceneTile>,
    /// Placed journal notes.
    pub notes: Vec<SceneNote>,
}

/// Scene rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneRect {
    /// Left edge.
    pub left: f64,
    /// Bottom edge.
    pub bottom: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// A tile placed on a scene.
#[derive(Debug, Clone)]
pub struct SceneTile {
    /// Tile image path.
    pub src: String,
    /// X position in pixels.
    pub x: f64,
    /// Y position in pixels.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

/// A journal note pinned to a scene.
#[derive(Debug, Clone)]
pub struct SceneNote {
    /// X position in pixels.
    pub x: f64,
    /// Y position in pixels.
    pub y: f64,
    /// Marker label.
    pub label: String,
    /// Identifier of the linked journal or page, if any.
    pub target: Option<String>,
}

/// Playlist payload.
#[derive(Debug, Clone, Default)]
pub struct PlaylistBody {
    /// Playlist description.
    pub description: Option<String>,
    /// Tracks in playback order.
    pub tracks: Vec<PlaylistTrack>,
}

/// One track of a playlist.
#[derive(Debug, Clone)]
pub struct PlaylistTrack {
    /// Track name.
    pub name: String,
    /// Optional track description.
    pub description: Option<String>,
    /// Audio file path.
    pub path: String,
}

/// Generic record payload.
#[derive(Debug, Clone, Default)]
pub struct RecordBody {
    /// Description fields extracted by the host adapter, in order.
    ///
    /// The adapter flattens whatever nesting its schema uses
    /// (`system.description.value` and friends) into this list.
    pub descriptions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_tag_round_trip() {
        for kind in [
            DocumentKind::Journal,
            DocumentKind::JournalPage,
            DocumentKind::RollTable,
            DocumentKind::Scene,
            DocumentKind::Playlist,
            DocumentKind::Actor,
            DocumentKind::Item,
            DocumentKind::Macro,
        ] {
            assert_eq!(DocumentKind::from_link_tag(kind.link_tag()), Some(kind));
        }
    }

    #[test]
    fn non_link_tags_are_rejected() {
        assert_eq!(DocumentKind::from_link_tag("Check"), None);
        assert_eq!(DocumentKind::from_link_tag("Damage"), None);
        assert_eq!(DocumentKind::from_link_tag("Localize"), None);
        // Compendium and UUID are link syntax but not document kinds.
        assert_eq!(DocumentKind::from_link_tag("Compendium"), None);
        assert_eq!(DocumentKind::from_link_tag("UUID"), None);
    }

    #[test]
    fn new_node_defaults() {
        let node = DocumentNode::new("Actor.abc", "Goblin", DocumentKind::Actor);
        assert_eq!(node.identifier, "Actor.abc");
        assert_eq!(node.display_name, "Goblin");
        assert!(node.pages.is_empty());
        assert!(matches!(node.body, DocumentBody::None));
    }
}
