//! The archive sink: notes now, media at `finish` time.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::fetch::MediaSource;
use crate::marker::format_link;

/// Longest entry path the archive container accepts.
const MAX_ENTRY_PATH: usize = 250;

/// A resolved archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry path inside the archive.
    pub name: String,
    /// Entry contents.
    pub data: Vec<u8>,
}

#[derive(Debug)]
enum Pending {
    Note(String),
    Media { source: String },
}

/// Collects every output of an export run.
///
/// Notes are added eagerly; media files are registered as pending fetches,
/// deduplicated by normalized name, and fetched only when [`finish`]
/// (Self::finish) drains the sink. There is exactly one writer per name:
/// the dedup rule, not locking, is what prevents double registration.
#[derive(Debug)]
pub struct ArchiveSink {
    entries: Vec<(String, Pending)>,
    index: HashMap<String, usize>,
    asset_dir: String,
}

impl ArchiveSink {
    /// Create a sink storing collected media under `asset_dir`.
    #[must_use]
    pub fn new(asset_dir: &str) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            asset_dir: asset_dir.trim_matches('/').to_owned(),
        }
    }

    /// Add a Markdown note under `name` (path inside the archive, without
    /// extension). An existing entry under the same name is replaced.
    pub fn add_note(&mut self, name: &str, markdown: String) {
        let path = format!("{name}.md");
        self.insert(path, Pending::Note(markdown));
    }

    /// Whether an entry is already registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sink is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect a referenced media file and return a link marker for it.
    ///
    /// Returns `None` for paths that are not fetchable files: inline data
    /// URIs and sentinel-prefixed references (`:emoji-code:`); callers
    /// leave the original text in place for those. Otherwise the path is
    /// percent-decoded, flattened into a unique archive name, and
    /// registered for fetching exactly once per normalized name.
    pub fn collect_file(&mut self, path: &str, label: Option<&str>, inline: bool) -> Option<String> {
        if path.starts_with("data:") || path.starts_with(':') {
            debug!(path, "ignoring non-file media reference");
            return None;
        }

        let decoded = match percent_decode_str(path).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => path.to_owned(),
        };

        let name = self.normalized_name(&decoded);
        let archive_path = format!("{}/{}", self.asset_dir, name);
        if !self.contains(&archive_path) {
            self.insert(archive_path, Pending::Media { source: decoded });
        }

        Some(format_link(&name, label, inline))
    }

    /// Flatten a media path into an archive-safe file name.
    ///
    /// Path separators become `-` so the same base name in different
    /// directories stays distinct; the result keeps the trailing end of
    /// the path so the extension survives truncation to the archive's
    /// path-length budget.
    fn normalized_name(&self, path: &str) -> String {
        let flat = path.replace(['/', '\\'], "-");
        let budget = MAX_ENTRY_PATH - self.asset_dir.len() - 1;
        let count = flat.chars().count();
        if count <= budget {
            flat
        } else {
            flat.chars().skip(count - budget).collect()
        }
    }

    fn insert(&mut self, path: String, entry: Pending) {
        if let Some(&slot) = self.index.get(&path) {
            self.entries[slot] = (path, entry);
        } else {
            self.index.insert(path.clone(), self.entries.len());
            self.entries.push((path, entry));
        }
    }

    /// Resolve every pending fetch and return the finished entries in
    /// insertion order.
    ///
    /// A failed fetch is logged and stored as an empty placeholder so one
    /// broken media reference never aborts the export.
    #[must_use]
    pub fn finish(self, media: &dyn MediaSource) -> Vec<ArchiveEntry> {
        self.entries
            .into_iter()
            .map(|(name, pending)| {
                let data = match pending {
                    Pending::Note(text) => text.into_bytes(),
                    Pending::Media { source } => match media.fetch(&source) {
                        Ok(data) => data,
                        Err(err) => {
                            warn!(%source, error = %err, "asset fetch failed, storing empty placeholder");
                            Vec::new()
                        }
                    },
                };
                ArchiveEntry { name, data }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use pretty_assertions::assert_eq;

    struct StaticSource(Vec<u8>);

    impl MediaSource for StaticSource {
        fn fetch(&self, _path: &str) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl MediaSource for FailingSource {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Status {
                status: 404,
                path: path.to_owned(),
            })
        }
    }

    fn sink() -> ArchiveSink {
        ArchiveSink::new("zz_asset-files")
    }

    #[test]
    fn collect_returns_inline_marker() {
        let mut sink = sink();
        let marker = sink.collect_file("worlds/art/goblin.webp", None, true);
        assert_eq!(marker.as_deref(), Some("![[worlds-art-goblin.webp]]"));
        assert!(sink.contains("zz_asset-files/worlds-art-goblin.webp"));
    }

    #[test]
    fn collect_is_idempotent_by_normalized_name() {
        let mut sink = sink();
        sink.collect_file("worlds/art/goblin.webp", None, true);
        sink.collect_file("worlds%2Fart%2Fgoblin.webp", None, true);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn same_basename_in_different_dirs_stays_distinct() {
        let mut sink = sink();
        sink.collect_file("worlds/a/token.png", None, true);
        sink.collect_file("worlds/b/token.png", None, true);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn data_uri_and_sentinel_paths_are_ignored() {
        let mut sink = sink();
        assert_eq!(sink.collect_file("data:image/png;base64,AAAA", None, true), None);
        assert_eq!(sink.collect_file(":spade:", None, true), None);
        assert!(sink.is_empty());
    }

    #[test]
    fn long_paths_keep_the_tail() {
        let mut sink = sink();
        let long = format!("{}/{}.webp", "d".repeat(300), "image");
        let marker = sink.collect_file(&long, None, true).unwrap();
        assert!(marker.ends_with("image.webp]]"));
        let (name, _) = &sink.entries[0];
        assert!(name.len() <= MAX_ENTRY_PATH);
    }

    #[test]
    fn labelled_collect_carries_label() {
        let mut sink = sink();
        let marker = sink.collect_file("maps/keep.webp", Some("Foreground"), false);
        assert_eq!(marker.as_deref(), Some("[[maps-keep.webp|Foreground]]"));
    }

    #[test]
    fn finish_resolves_notes_and_media_in_order() {
        let mut sink = sink();
        sink.add_note("Journal/Guide", "# Guide".to_owned());
        sink.collect_file("art/cover.png", None, true);

        let entries = sink.finish(&StaticSource(b"img".to_vec()));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Journal/Guide.md");
        assert_eq!(entries[0].data, b"# Guide".to_vec());
        assert_eq!(entries[1].name, "zz_asset-files/art-cover.png");
        assert_eq!(entries[1].data, b"img".to_vec());
    }

    #[test]
    fn failed_fetch_stores_empty_placeholder() {
        let mut sink = sink();
        sink.collect_file("art/missing.png", None, true);

        let entries = sink.finish(&FailingSource);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].data.is_empty());
    }

    #[test]
    fn add_note_replaces_existing_entry() {
        let mut sink = sink();
        sink.add_note("Guide", "old".to_owned());
        sink.add_note("Guide", "new".to_owned());
        assert_eq!(sink.len(), 1);

        let entries = sink.finish(&StaticSource(Vec::new()));
        assert_eq!(entries[0].data, b"new".to_vec());
    }
}
