//! Generic record emission: frontmatter, portrait, converted description
//! fields, and a fenced data dump — or a host-rendered template when one
//! is configured for the document's kind.

use tome_config::{DumpFormat, IdentifierNaming};
use tome_graph::{DocumentBody, DocumentNode};
use tome_pipeline::{html, links};
use tracing::warn;

use crate::emit::{Exporter, join_path};
use crate::frontmatter::frontmatter;

/// Display width collected portrait images are labelled with.
const IMG_SIZE: &str = "150";

#[derive(Debug, thiserror::Error)]
enum DumpError {
    #[error("YAML serialization failed")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn emit_record(exporter: &Exporter<'_>, path: &str, doc: &DocumentNode) {
    let ctx = exporter.ctx;
    let note = join_path(path, &exporter.note_name(doc));

    // A configured template replaces the default record layout entirely;
    // the portrait is still collected so the template can reference it.
    if let Some(engine) = exporter.templates
        && let Some(template) = template_for(exporter, doc)
    {
        if let Some(image) = &doc.image {
            ctx.collect_file(image, Some(IMG_SIZE), true);
        }
        match engine.render(template, doc) {
            Ok(mut rendered) => {
                if ctx.naming == IdentifierNaming::DisplayName {
                    rendered = links::humanize_markers(ctx, &rendered);
                }
                exporter.add_note(&note, rendered);
                return;
            }
            Err(err) => {
                warn!(template, error = %err, "template rendering failed, using data dump");
            }
        }
    }

    let mut markdown = frontmatter(doc, true);

    if let Some(image) = &doc.image
        && let Some(marker) = ctx.collect_file(image, Some(IMG_SIZE), true)
    {
        markdown.push_str(&marker);
        markdown.push_str("\n\n");
    }

    let descriptions: Vec<&String> = match &doc.body {
        DocumentBody::Record(record) => record.descriptions.iter().collect(),
        _ => doc.description.iter().collect(),
    };
    for description in descriptions {
        markdown.push_str(&html::convert_document(ctx, doc, description));
        markdown.push_str("\n\n");
    }

    if let Some(data) = &doc.data {
        match dump_data(exporter.config.dump_format, data) {
            Ok(dump) => {
                // References and file paths inside the dump get the same
                // link treatment as rendered text.
                let dump = links::resolve(ctx, doc, &dump);
                let dump = links::sweep_file_references(ctx, &dump);
                markdown.push_str(&format!("```{}\n{dump}```\n", doc.kind.link_tag()));
            }
            Err(err) => warn!(identifier = %doc.identifier, error = %err, "skipping data dump"),
        }
    }

    exporter.add_note(&note, markdown);
}

/// The configured template for a document: its `Kind.subtype` key wins
/// over the plain `Kind` key.
fn template_for<'a>(exporter: &'a Exporter<'_>, doc: &DocumentNode) -> Option<&'a str> {
    let tag = doc.kind.link_tag();
    let subtype = doc
        .data
        .as_ref()
        .and_then(|data| data.get("type"))
        .and_then(serde_json::Value::as_str);
    match subtype {
        Some(subtype) => {
            let specific = format!("{tag}.{subtype}");
            exporter.config.template_for(&[specific.as_str(), tag])
        }
        None => exporter.config.template_for(&[tag]),
    }
}

fn dump_data(format: DumpFormat, data: &serde_json::Value) -> Result<String, DumpError> {
    match format {
        DumpFormat::Yaml => Ok(serde_yaml::to_string(data)?),
        DumpFormat::Json => Ok(serde_json::to_string_pretty(data)? + "\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TemplateEngine, TemplateError};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tome_archive::{ArchiveEntry, ArchiveSink, FetchError, MediaSource};
    use tome_config::{ExportConfig, IconStyle};
    use tome_graph::mock::MemoryGraph;
    use tome_graph::{DocumentKind, RecordBody};
    use tome_pipeline::PipelineContext;

    struct EmptySource;

    impl MediaSource for EmptySource {
        fn fetch(&self, _path: &str) -> Result<Vec<u8>, FetchError> {
            Ok(Vec::new())
        }
    }

    struct Setup {
        graph: MemoryGraph,
        localizer: HashMap<String, String>,
        sink: RefCell<ArchiveSink>,
        config: ExportConfig,
    }

    impl Setup {
        fn new(config: ExportConfig) -> Self {
            let mut graph = MemoryGraph::new();
            graph.insert(DocumentNode::new(
                "Actor.friend",
                "Old Friend",
                DocumentKind::Actor,
            ));
            Self {
                graph,
                localizer: HashMap::new(),
                sink: RefCell::new(ArchiveSink::new("zz_asset-files")),
                config,
            }
        }

        fn ctx(&self) -> PipelineContext<'_> {
            PipelineContext::new(
                &self.graph,
                &self.localizer,
                &self.sink,
                self.config.naming,
                IconStyle::Shortcode,
            )
        }

        fn finish(self) -> Vec<ArchiveEntry> {
            self.sink.into_inner().finish(&EmptySource)
        }
    }

    fn item() -> DocumentNode {
        let mut doc = DocumentNode::new("Item.sword", "Long Sword", DocumentKind::Item);
        doc.image = Some("icons/sword.webp".to_owned());
        doc.body = DocumentBody::Record(RecordBody {
            descriptions: vec!["<p>A trusty blade from @UUID[Actor.friend].</p>".to_owned()],
        });
        doc.data = Some(serde_json::json!({
            "type": "weapon",
            "name": "Long Sword",
            "system": { "damage": "1d8" },
        }));
        doc
    }

    fn note_text(entries: &[ArchiveEntry], name: &str) -> String {
        let entry = entries
            .iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("no entry named '{name}'"));
        String::from_utf8(entry.data.clone()).unwrap()
    }

    #[test]
    fn record_has_frontmatter_image_description_and_dump() {
        let setup = Setup::new(ExportConfig::default());
        {
            let ctx = setup.ctx();
            Exporter::new(&ctx, &setup.config).emit("items", &item());
        }
        let entries = setup.finish();
        let text = note_text(&entries, "items/Item.sword.md");

        assert!(text.starts_with("---\ntitle: \"Long Sword\"\n"));
        assert!(text.contains("![[icons-sword.webp|150]]"));
        assert!(text.contains("A trusty blade from [[Actor.friend|Old Friend]]."));
        assert!(text.contains("```Item\n"));
        assert!(text.contains("name: Long Sword"));
        assert!(entries.iter().any(|e| e.name == "zz_asset-files/icons-sword.webp"));
    }

    #[test]
    fn json_dump_format_is_respected() {
        let config = ExportConfig {
            dump_format: DumpFormat::Json,
            ..ExportConfig::default()
        };
        let setup = Setup::new(config);
        {
            let ctx = setup.ctx();
            Exporter::new(&ctx, &setup.config).emit("", &item());
        }
        let entries = setup.finish();
        let text = note_text(&entries, "Item.sword.md");
        assert!(text.contains("\"name\": \"Long Sword\""));
    }

    struct FixedTemplate;

    impl TemplateEngine for FixedTemplate {
        fn render(&self, template: &str, doc: &DocumentNode) -> Result<String, TemplateError> {
            Ok(format!(
                "rendered {template} for [[{}|{}]]",
                doc.identifier, doc.display_name
            ))
        }
    }

    struct BrokenTemplate;

    impl TemplateEngine for BrokenTemplate {
        fn render(&self, _template: &str, _doc: &DocumentNode) -> Result<String, TemplateError> {
            Err(TemplateError("missing partial".to_owned()))
        }
    }

    #[test]
    fn configured_template_replaces_record_layout() {
        let mut config = ExportConfig::default();
        config
            .templates
            .insert("Item.weapon".to_owned(), "weapon.hbs".to_owned());
        let setup = Setup::new(config);
        {
            let ctx = setup.ctx();
            let engine = FixedTemplate;
            Exporter::new(&ctx, &setup.config)
                .with_templates(&engine)
                .emit("", &item());
        }
        let entries = setup.finish();
        let text = note_text(&entries, "Item.sword.md");
        assert_eq!(text, "rendered weapon.hbs for [[Item.sword|Long Sword]]");
    }

    #[test]
    fn failed_template_falls_back_to_data_dump() {
        let mut config = ExportConfig::default();
        config
            .templates
            .insert("Item".to_owned(), "item.hbs".to_owned());
        let setup = Setup::new(config);
        {
            let ctx = setup.ctx();
            let engine = BrokenTemplate;
            Exporter::new(&ctx, &setup.config)
                .with_templates(&engine)
                .emit("", &item());
        }
        let entries = setup.finish();
        let text = note_text(&entries, "Item.sword.md");
        assert!(text.contains("```Item\n"));
    }

    #[test]
    fn display_name_mode_humanizes_template_markers() {
        let mut config = ExportConfig {
            naming: IdentifierNaming::DisplayName,
            ..ExportConfig::default()
        };
        config
            .templates
            .insert("Item".to_owned(), "item.hbs".to_owned());
        let setup = Setup::new(config);
        {
            let ctx = setup.ctx();
            let engine = FixedTemplate;
            Exporter::new(&ctx, &setup.config)
                .with_templates(&engine)
                .emit("", &item());
        }
        let entries = setup.finish();
        let text = note_text(&entries, "Long Sword.md");
        // The rendered marker for Item.sword is unresolvable in the test
        // graph (only Actor.friend is registered), so it keeps its
        // identifier; the point is that humanization ran.
        assert_eq!(text, "rendered item.hbs for [[Item.sword|Long Sword]]");
    }
}
