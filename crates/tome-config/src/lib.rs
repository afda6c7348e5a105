//! Export settings for the Tome campaign exporter.
//!
//! Parses `tome.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Every field has
//! a default, so an absent or empty file yields a usable configuration.
//!
//! The settings here are supplied by the embedding host; the pipeline
//! itself only ever reads them through the per-export context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "tome.toml";

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
}

/// How note filenames and link targets are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum IdentifierNaming {
    /// Use the opaque document identifier. Collision-free.
    #[default]
    #[serde(rename = "use-uuid")]
    Uuid,
    /// Use the sanitized display name, prefixed with the containing
    /// collection's title where one exists.
    #[serde(rename = "use-display-name")]
    DisplayName,
}

/// How action-cost icons are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum IconStyle {
    /// A fixed Unicode glyph set.
    #[serde(rename = "unicode")]
    Unicode,
    /// Backticked short-codes understood by the action-icons viewer plugin.
    #[default]
    #[serde(rename = "plugin-shortcode")]
    Shortcode,
}

/// Serialization format for the data-dump section of generic records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// YAML dump.
    #[default]
    Yaml,
    /// Pretty-printed JSON dump.
    Json,
}

/// Export configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Naming convention for note filenames and link targets.
    pub naming: IdentifierNaming,
    /// Naming convention for multi-page journal folders.
    pub folder_naming: IdentifierNaming,
    /// Action-cost icon rendering.
    pub icons: IconStyle,
    /// Data-dump format for generic records.
    pub dump_format: DumpFormat,
    /// Emit scenes as interactive map code blocks; when off, scenes fall
    /// back to the generic record emitter.
    pub map_blocks: bool,
    /// Archive directory collected media is stored under.
    pub asset_dir: String,
    /// Template name per document kind tag (e.g. `Actor`, `Item.weapon`).
    pub templates: BTreeMap<String, String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            naming: IdentifierNaming::default(),
            folder_naming: IdentifierNaming::default(),
            icons: IconStyle::default(),
            dump_format: DumpFormat::default(),
            map_blocks: true,
            asset_dir: "zz_asset-files".to_owned(),
            templates: BTreeMap::new(),
        }
    }
}

impl ExportConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration, discovering `tome.toml` in `start_dir` or any
    /// of its ancestors. Falls back to defaults when no file is found.
    pub fn discover(start_dir: &Path) -> Result<Self, ConfigError> {
        match find_config_file(start_dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// The template configured for a document, most specific key first.
    ///
    /// `keys` are tried in order; the first present wins. Emitters pass
    /// `["Actor.npc", "Actor"]`-style chains.
    #[must_use]
    pub fn template_for(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.templates.get(*key))
            .map(String::as_str)
    }
}

/// Search for `tome.toml` in `start_dir` and its ancestors.
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = Some(start_dir);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}
