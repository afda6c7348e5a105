//! HTML→Markdown conversion.
//!
//! [`convert_document`] runs the full pipeline over a document's rich-text
//! HTML: inline tag rewriting, link resolution, structural conversion to
//! Markdown, escape cleanup, and the residual media sweeps.
//!
//! The structural conversion parses with html5ever (which recovers from
//! malformed input) and walks the DOM directly: ATX headings, fenced code
//! blocks, GFM tables and strikethrough, and the action-glyph span rule.
//! The serializer escapes Markdown specials in text, which also escapes
//! the `[[...]]` link markers produced by earlier passes; the cleanup step
//! afterwards un-escapes exactly those marker brackets (and incidental
//! underscore escapes). The two phases are a deliberate contract — the
//! intermediate output is escape-tolerant, the final pass restores link
//! syntax — so neither side needs to know which brackets are markers.

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::rc::Rc;
use tome_config::IconStyle;
use tome_graph::DocumentNode;
use tracing::warn;

use crate::glyphs::ActionCost;
use crate::{PipelineContext, inline, links};

/// Convert a document's rich-text HTML to Markdown, expanding `@Embed`
/// tags by fetching their content.
#[must_use]
pub fn convert_document(ctx: &PipelineContext<'_>, doc: &DocumentNode, html: &str) -> String {
    convert(ctx, doc, html, true)
}

/// Synchronous counterpart of [`convert_document`]: embeds degrade to
/// links instead of being fetched and inlined.
#[must_use]
pub fn convert_document_sync(ctx: &PipelineContext<'_>, doc: &DocumentNode, html: &str) -> String {
    convert(ctx, doc, html, false)
}

fn convert(ctx: &PipelineContext<'_>, doc: &DocumentNode, html: &str, embeds: bool) -> String {
    let text = inline::rewrite(ctx, doc, html);
    // Adjacent tables misparse in some Markdown renderers unless a break
    // precedes the table element.
    let text = text.replace("<table", "\n<table");
    let text = if embeds {
        links::resolve_expanding_embeds(ctx, doc, &text)
    } else {
        links::resolve(ctx, doc, &text)
    };

    let mut markdown = to_markdown(&text, ctx.icons);
    markdown = markdown
        .replace("\\[\\[", "[[")
        .replace("\\]\\]", "]]")
        .replace("\\_", "_");

    let markdown = links::sweep_file_references(ctx, &markdown);
    links::sweep_sized_images(ctx, &markdown)
}

/// Structural HTML→Markdown conversion, no tag or link handling.
#[must_use]
pub fn to_markdown(html: &str, icons: IconStyle) -> String {
    let Ok(dom) = parse_document(RcDom::default(), ParseOpts::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
    else {
        warn!("failed to parse HTML input, passing text through");
        return html.to_owned();
    };

    // `dom` owns the whole tree; its `Node::Drop` recursively detaches
    // children, so the fallback must borrow `dom.document` rather than
    // move it out (moving it would drop the tree before the walk).
    let found = find_body(&dom.document);
    let root = found.as_ref().unwrap_or(&dom.document);
    let children = root.children.borrow();
    render_blocks(&children, icons).join("\n\n")
}

fn find_body(handle: &Handle) -> Option<Handle> {
    if element_name(handle) == Some("body") {
        return Some(Rc::clone(handle));
    }
    for child in handle.children.borrow().iter() {
        if let Some(found) = find_body(child) {
            return Some(found);
        }
    }
    None
}

fn element_name(handle: &Handle) -> Option<&str> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

fn attr_value(handle: &Handle, attr: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

const BLOCK_TAGS: [&str; 19] = [
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "pre",
    "table",
    "blockquote",
    "hr",
    "div",
    "section",
    "article",
    "aside",
    "figure",
    "figcaption",
];

fn is_block(handle: &Handle) -> bool {
    element_name(handle).is_some_and(|name| BLOCK_TAGS.contains(&name))
}

/// Render a sibling run of nodes into Markdown blocks. Inline content
/// between block elements accumulates into its own paragraph block.
fn render_blocks(children: &[Handle], icons: IconStyle) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pending = String::new();

    for child in children {
        if is_block(child) {
            flush_pending(&mut pending, &mut blocks);
            blocks.extend(render_block(child, icons));
        } else {
            render_inline_node(child, icons, &mut pending);
        }
    }
    flush_pending(&mut pending, &mut blocks);

    blocks.retain(|block| !block.is_empty());
    blocks
}

fn flush_pending(pending: &mut String, blocks: &mut Vec<String>) {
    let text = pending.trim().to_owned();
    if !text.is_empty() {
        blocks.push(text);
    }
    pending.clear();
}

fn render_block(handle: &Handle, icons: IconStyle) -> Vec<String> {
    let name = element_name(handle).unwrap_or_default();
    match name {
        "p" => vec![render_inline_children(handle, icons).trim().to_owned()],
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let text = render_inline_children(handle, icons);
            vec![format!("{} {}", "#".repeat(level), text.trim())]
        }
        "ul" => vec![render_list(handle, false, 0, icons)],
        "ol" => vec![render_list(handle, true, 0, icons)],
        "pre" => vec![render_code_block(handle)],
        "table" => vec![render_table(handle, icons)],
        "blockquote" => {
            let children = handle.children.borrow();
            let inner = render_blocks(&children, icons).join("\n\n");
            vec![
                inner
                    .lines()
                    .map(|line| format!("> {line}").trim_end().to_owned())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ]
        }
        "hr" => vec!["---".to_owned()],
        // Transparent containers (div, section, figure, ...).
        _ => {
            let children = handle.children.borrow();
            render_blocks(&children, icons)
        }
    }
}

fn render_list(handle: &Handle, ordered: bool, depth: usize, icons: IconStyle) -> String {
    let mut lines = Vec::new();
    let mut index = 0usize;

    for child in handle.children.borrow().iter() {
        if element_name(child) != Some("li") {
            continue;
        }
        index += 1;
        let marker = if ordered {
            format!("{index}. ")
        } else {
            "- ".to_owned()
        };

        let mut text = String::new();
        let mut nested = Vec::new();
        for li_child in child.children.borrow().iter() {
            match element_name(li_child) {
                Some("ul") => nested.push(render_list(li_child, false, depth + 1, icons)),
                Some("ol") => nested.push(render_list(li_child, true, depth + 1, icons)),
                Some("p") => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(render_inline_children(li_child, icons).trim());
                }
                _ => render_inline_node(li_child, icons, &mut text),
            }
        }

        lines.push(format!(
            "{}{marker}{}",
            "    ".repeat(depth),
            text.trim()
        ));
        lines.extend(nested);
    }

    lines.join("\n")
}

fn render_code_block(handle: &Handle) -> String {
    // Language comes from the conventional `language-*` class on the
    // inner code element.
    let code = handle
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child) == Some("code"))
        .map(Rc::clone);

    let language = code
        .as_ref()
        .and_then(|code| attr_value(code, "class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|part| part.strip_prefix("language-").map(str::to_owned))
        })
        .unwrap_or_default();

    let text = raw_text(code.as_ref().unwrap_or(handle));
    format!("```{language}\n{}\n```", text.trim_end_matches('\n'))
}

fn render_table(handle: &Handle, icons: IconStyle) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    collect_table_rows(handle, icons, &mut rows);

    let Some(header) = rows.first() else {
        return String::new();
    };
    let columns = header.len().max(1);

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let mut cells = row.clone();
        cells.resize(columns, String::new());
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    lines.join("\n")
}

fn collect_table_rows(handle: &Handle, icons: IconStyle, rows: &mut Vec<Vec<String>>) {
    for child in handle.children.borrow().iter() {
        match element_name(child) {
            Some("tr") => {
                let mut cells = Vec::new();
                for cell in child.children.borrow().iter() {
                    if matches!(element_name(cell), Some("td" | "th")) {
                        let text = render_inline_children(cell, icons);
                        // Cell text must stay on one line, and raw pipes
                        // would end the cell early.
                        cells.push(
                            text.split_whitespace()
                                .collect::<Vec<_>>()
                                .join(" ")
                                .replace('|', "\\|"),
                        );
                    }
                }
                rows.push(cells);
            }
            Some("thead" | "tbody" | "tfoot") => collect_table_rows(child, icons, rows),
            _ => {}
        }
    }
}

fn render_inline_children(handle: &Handle, icons: IconStyle) -> String {
    let mut out = String::new();
    for child in handle.children.borrow().iter() {
        render_inline_node(child, icons, &mut out);
    }
    out
}

fn render_inline_node(handle: &Handle, icons: IconStyle, out: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => {
            out.push_str(&escape_text(&collapse_whitespace(&contents.borrow())));
        }
        NodeData::Element { name, .. } => match name.local.as_ref() {
            "strong" | "b" => wrap_inline(handle, icons, "**", out),
            "em" | "i" => wrap_inline(handle, icons, "*", out),
            "del" | "s" | "strike" => wrap_inline(handle, icons, "~~", out),
            "code" => {
                out.push('`');
                out.push_str(raw_text(handle).trim());
                out.push('`');
            }
            "a" => {
                let text = render_inline_children(handle, icons);
                match attr_value(handle, "href") {
                    Some(href) if !href.is_empty() => {
                        out.push_str(&format!("[{}]({href})", text.trim()));
                    }
                    _ => out.push_str(&text),
                }
            }
            "img" => out.push_str(&render_image(handle)),
            "br" => out.push('\n'),
            "span" => {
                if attr_value(handle, "class").as_deref() == Some("action-glyph")
                    && let Some(cost) = ActionCost::from_marker(raw_text(handle).trim())
                {
                    out.push_str(&cost.render(icons));
                } else {
                    out.push_str(&render_inline_children(handle, icons));
                }
            }
            _ => out.push_str(&render_inline_children(handle, icons)),
        },
        _ => {}
    }
}

fn wrap_inline(handle: &Handle, icons: IconStyle, delimiter: &str, out: &mut String) {
    let inner = render_inline_children(handle, icons);
    let inner = inner.trim();
    if !inner.is_empty() {
        out.push_str(delimiter);
        out.push_str(inner);
        out.push_str(delimiter);
    }
}

/// `![alt](src)`, or the sized form `![alt|WxH](src)` when the element
/// carries numeric size attributes (swept separately afterwards).
fn render_image(handle: &Handle) -> String {
    let Some(src) = attr_value(handle, "src").filter(|src| !src.is_empty()) else {
        return String::new();
    };
    let alt = attr_value(handle, "alt")
        .unwrap_or_default()
        .replace('|', " ");

    let numeric = |value: Option<String>| value.filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()));
    let width = numeric(attr_value(handle, "width"));
    let height = numeric(attr_value(handle, "height"));

    match (width, height) {
        (Some(w), Some(h)) => format!("![{alt}|{w}x{h}]({src})"),
        (Some(w), None) => format!("![{alt}|{w}]({src})"),
        _ => format!("![{alt}]({src})"),
    }
}

fn raw_text(handle: &Handle) -> String {
    let mut out = String::new();
    collect_raw_text(handle, &mut out);
    out
}

fn collect_raw_text(handle: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &handle.data {
        out.push_str(&contents.borrow());
    }
    for child in handle.children.borrow().iter() {
        collect_raw_text(child, out);
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}

/// Escape Markdown specials in text content. Link-marker brackets get
/// escaped here too; the converter's cleanup pass restores them.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
