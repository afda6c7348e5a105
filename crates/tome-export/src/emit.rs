//! The export driver and the journal, table, and playlist emitters.

use tome_archive::format_link;
use tome_config::{ExportConfig, IdentifierNaming};
use tome_graph::{DocumentBody, DocumentKind, DocumentNode, PageBody, PageContent};
use tome_pipeline::{PipelineContext, html, links};

use crate::TemplateEngine;
use crate::frontmatter::frontmatter;
use crate::record;
use crate::scene;

/// Drives the conversion pipeline for each document and writes the
/// results into the archive sink carried by the pipeline context.
pub struct Exporter<'a> {
    pub(crate) ctx: &'a PipelineContext<'a>,
    pub(crate) config: &'a ExportConfig,
    pub(crate) templates: Option<&'a dyn TemplateEngine>,
}

impl<'a> Exporter<'a> {
    /// Create an exporter over a pipeline context and settings.
    #[must_use]
    pub fn new(ctx: &'a PipelineContext<'a>, config: &'a ExportConfig) -> Self {
        Self {
            ctx,
            config,
            templates: None,
        }
    }

    /// Attach a template engine for per-kind record layouts.
    #[must_use]
    pub fn with_templates(mut self, engine: &'a dyn TemplateEngine) -> Self {
        self.templates = Some(engine);
        self
    }

    /// Emit every `(archive path, document)` pair.
    pub fn export<I>(&self, documents: I)
    where
        I: IntoIterator<Item = (String, DocumentNode)>,
    {
        for (path, doc) in documents {
            self.emit(&path, &doc);
        }
    }

    /// Emit one document under the given archive directory.
    pub fn emit(&self, path: &str, doc: &DocumentNode) {
        match doc.kind {
            DocumentKind::Journal => self.emit_journal(path, doc),
            DocumentKind::RollTable if matches!(doc.body, DocumentBody::Table(_)) => {
                self.emit_table(path, doc);
            }
            DocumentKind::Scene
                if self.config.map_blocks && matches!(doc.body, DocumentBody::Scene(_)) =>
            {
                scene::emit_scene(self, path, doc);
            }
            DocumentKind::Playlist if matches!(doc.body, DocumentBody::Playlist(_)) => {
                self.emit_playlist(path, doc);
            }
            _ => record::emit_record(self, path, doc),
        }
    }

    pub(crate) fn add_note(&self, name: &str, markdown: String) {
        self.ctx.sink.borrow_mut().add_note(name, markdown);
    }

    pub(crate) fn note_name(&self, doc: &DocumentNode) -> String {
        links::note_filename(doc, self.ctx.naming)
    }

    /// A journal with one page collapses into a single note; more pages
    /// go into a sub-folder headed by a table-of-contents note whose
    /// filename matches the folder.
    fn emit_journal(&self, path: &str, doc: &DocumentNode) {
        let mut subpath = path.to_owned();

        if doc.pages.len() > 1 {
            let folder = match self.config.folder_naming {
                IdentifierNaming::Uuid => doc.identifier.clone(),
                IdentifierNaming::DisplayName => links::valid_filename(&doc.display_name),
            };
            subpath = join_path(path, &folder);

            let mut markdown = frontmatter(doc, true);
            markdown.push_str("\n## Table of Contents\n");
            let mut pages: Vec<&DocumentNode> = doc.pages.iter().collect();
            pages.sort_by_key(|page| page_body(page).map_or(0, |body| body.sort));
            for page in pages {
                let level = page_body(page).map_or(1, |body| usize::from(body.heading_level.max(1)));
                markdown.push_str(&format!(
                    "\n{}- {}",
                    "  ".repeat(level - 1),
                    format_link(&self.note_name(page), Some(&page.display_name), false)
                ));
            }
            self.add_note(&join_path(&subpath, &folder), markdown);
        }

        for page in &doc.pages {
            let Some(body) = page_body(page) else { continue };
            let content = match &body.content {
                PageContent::Html(text) => html::convert_document(self.ctx, page, text),
                PageContent::Markdown(text) => text.clone(),
                PageContent::Image { src, caption } => {
                    let mut out = self.ctx.collect_file(src, None, true).unwrap_or_default();
                    out.push('\n');
                    if let Some(caption) = caption {
                        out.push('\n');
                        out.push_str(caption);
                        out.push('\n');
                    }
                    out
                }
                PageContent::Pdf { src } | PageContent::Video { src } => {
                    let mut out = self.ctx.collect_file(src, None, true).unwrap_or_default();
                    out.push('\n');
                    out
                }
                PageContent::Empty => continue,
            };
            if content.trim().is_empty() {
                continue;
            }
            let markdown = frontmatter(page, body.show_title) + &content;
            self.add_note(&join_path(&subpath, &self.note_name(page)), markdown);
        }
    }

    fn emit_table(&self, path: &str, doc: &DocumentNode) {
        let DocumentBody::Table(table) = &doc.body else {
            return;
        };

        let mut markdown = frontmatter(doc, true);
        if let Some(description) = &table.description {
            markdown.push_str(&html::convert_document(self.ctx, doc, description));
            markdown.push_str("\n\n");
        }

        markdown.push_str(&format!(
            "| {} | result |\n|------|--------|\n",
            table.formula.as_deref().unwrap_or("Roll")
        ));
        for row in &table.rows {
            let range = if row.low == row.high {
                row.low.to_string()
            } else {
                format!("{}-{}", row.low, row.high)
            };
            // Result text must stay on one table line, with pipes escaped
            // so link markers don't end the cell early.
            let text = html::convert_document(self.ctx, doc, &row.text)
                .replace('\n', " ")
                .replace('|', "\\|");
            markdown.push_str(&format!("| {range} | {text} |\n"));
        }

        self.add_note(&join_path(path, &self.note_name(doc)), markdown);
    }

    fn emit_playlist(&self, path: &str, doc: &DocumentNode) {
        let DocumentBody::Playlist(playlist) = &doc.body else {
            return;
        };

        let mut markdown = frontmatter(doc, true);
        if let Some(description) = &playlist.description {
            markdown.push_str(description);
            markdown.push_str("\n\n");
        }
        for track in &playlist.tracks {
            markdown.push_str(&format!("#### {}\n", track.name));
            if let Some(description) = &track.description {
                markdown.push_str(description);
                markdown.push('\n');
            }
            if let Some(marker) = self.ctx.collect_file(&track.path, None, true) {
                markdown.push_str(&marker);
                markdown.push('\n');
            }
        }

        self.add_note(&join_path(path, &self.note_name(doc)), markdown);
    }
}

pub(crate) fn page_body(page: &DocumentNode) -> Option<&PageBody> {
    match &page.body {
        DocumentBody::Page(body) => Some(body),
        _ => None,
    }
}

pub(crate) fn join_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_owned()
    } else {
        format!("{dir}/{file}")
    }
}
