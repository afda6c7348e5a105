//! Cross-document reference resolution.
//!
//! Rewrites `@Type[target#hash]{label}` reference tags into `[[target|label]]`
//! link markers by looking targets up in the document graph, and sweeps
//! residual `![label](path)` file references into the asset collector.
//!
//! Two entry points: [`resolve`] never touches storage beyond synchronous
//! graph lookups, while [`resolve_expanding_embeds`] additionally inlines
//! `@Embed` targets by fetching their description field (the one
//! potentially I/O-bound graph call). Resolution failures always degrade
//! to a literal fallback link; nothing here aborts an export.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tome_archive::format_link;
use tome_config::IdentifierNaming;
use tome_graph::{DocumentKind, DocumentNode};
use tracing::{debug, warn};

use crate::PipelineContext;
use crate::inline;

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z]+)\[([^#\]]+)(?:#([^\]]+))?\](?:\{([^}]+)\})?").unwrap()
});

static FILE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]|]*)\]\(([^)]+)\)").unwrap());

static SIZED_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]|]*\|(\d+(?:x\d+)?)\]\(([^)]+)\)").unwrap());

/// Embed expansion recursion limit; embedded descriptions may themselves
/// embed other documents.
const MAX_EMBED_DEPTH: usize = 5;

/// Leveled condition names whose exported notes carry a ` 1` suffix.
const LEVELED_CONDITIONS: [&str; 11] = [
    "Clumsy",
    "Doomed",
    "Drained",
    "Dying",
    "Enfeebled",
    "Frightened",
    "Sickened",
    "Slowed",
    "Stunned",
    "Stupefied",
    "Wounded",
];

/// Resolve reference tags synchronously. `@Embed` targets degrade to
/// ordinary links; use [`resolve_expanding_embeds`] to inline them.
#[must_use]
pub fn resolve(ctx: &PipelineContext<'_>, doc: &DocumentNode, text: &str) -> String {
    resolve_at_depth(ctx, doc, text, None)
}

/// Resolve reference tags, inlining `@Embed` targets' descriptions
/// (recursively rewritten through the inline and link passes).
#[must_use]
pub fn resolve_expanding_embeds(
    ctx: &PipelineContext<'_>,
    doc: &DocumentNode,
    text: &str,
) -> String {
    resolve_at_depth(ctx, doc, text, Some(0))
}

/// `embed_depth` is `None` for the synchronous variant, `Some(depth)` when
/// embeds are being expanded.
fn resolve_at_depth(
    ctx: &PipelineContext<'_>,
    doc: &DocumentNode,
    text: &str,
    embed_depth: Option<usize>,
) -> String {
    LINK.replace_all(text, |caps: &Captures<'_>| {
        resolve_one(ctx, doc, caps, embed_depth)
    })
    .into_owned()
}

fn resolve_one(
    ctx: &PipelineContext<'_>,
    doc: &DocumentNode,
    caps: &Captures<'_>,
    embed_depth: Option<usize>,
) -> String {
    let whole = &caps[0];
    let tag = caps[1].strip_prefix("inline").unwrap_or(&caps[1]);

    // Tags we can't parse into a document reference pass through unchanged.
    if !inline::is_link_tag(tag) {
        debug!(tag, "leaving unrecognized reference tag in place");
        return whole.to_owned();
    }

    let raw_target = &caps[2];
    let hash = caps.get(3).map(|m| m.as_str());
    let label = caps.get(4).map(|m| m.as_str());

    // Normalize to a fully-qualified identifier.
    let mut target = match tag {
        "UUID" => raw_target.to_owned(),
        // Embed targets may carry trailing display options ("... inline").
        "Embed" => raw_target
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_owned(),
        _ => format!("{tag}.{raw_target}"),
    };

    // Relative references resolve against the parent path of the context
    // document's own identifier.
    if target.starts_with('.') {
        let base = doc
            .identifier
            .rsplit_once('.')
            .map_or("", |(head, _)| head);
        target = format!("{base}{target}");
    }

    if tag == "Embed" {
        return expand_embed(ctx, doc, &target, label, embed_depth);
    }

    match ctx.graph.resolve(&target) {
        Ok(node) => document_link(ctx, &node, hash, label),
        Err(err) => {
            debug!(%target, error = %err, "unresolvable reference, falling back to literal link");
            fallback_link(ctx, raw_target, &target, label)
        }
    }
}

/// Inline an embedded document's description, or degrade to a link.
fn expand_embed(
    ctx: &PipelineContext<'_>,
    doc: &DocumentNode,
    target: &str,
    label: Option<&str>,
    embed_depth: Option<usize>,
) -> String {
    let Some(depth) = embed_depth else {
        // Synchronous entry point: an embed becomes an ordinary link.
        return match ctx.graph.resolve(target) {
            Ok(node) => document_link(ctx, &node, None, label),
            Err(_) => fallback_link(ctx, target, target, label),
        };
    };

    if depth >= MAX_EMBED_DEPTH {
        warn!(target, "embed nesting too deep, emitting link instead");
        return fallback_link(ctx, target, target, label);
    }

    match ctx.graph.load_description(target) {
        Ok(description) => {
            // Formulas and relative references inside the embedded text
            // are scoped to the embedded document where it resolves.
            let embedded = ctx.graph.resolve(target).ok();
            let scope = embedded.as_ref().unwrap_or(doc);
            let rewritten = inline::rewrite(ctx, scope, &description);
            resolve_at_depth(ctx, scope, &rewritten, Some(depth + 1))
        }
        Err(err) => {
            debug!(target, error = %err, "embed content unavailable, emitting link instead");
            fallback_link(ctx, target, target, label)
        }
    }
}

/// Literal fallback for unresolvable targets.
///
/// Compendium-path targets (containing `/`) link literally right away.
/// Otherwise a secondary strategy resolves the containing collection
/// synchronously and labels the link with its display name, coping with
/// identifiers only resolvable through the asynchronous API.
fn fallback_link(
    ctx: &PipelineContext<'_>,
    raw_target: &str,
    target: &str,
    label: Option<&str>,
) -> String {
    if !raw_target.contains('/')
        && let Some((parent_id, leaf)) = split_parent(target)
        && let Ok(parent) = ctx.graph.resolve(&parent_id)
    {
        let leaf_label = label.unwrap_or(leaf);
        let composite = format!("{}: {leaf_label}", parent.display_name);
        return format_link(target, Some(&composite), false);
    }
    format_link(target, label, false)
}

/// Split `Pack.Path.Type.id` into the containing collection's identifier
/// and the leaf id.
fn split_parent(target: &str) -> Option<(String, &str)> {
    let (rest, leaf) = target.rsplit_once('.')?;
    let (parent, _kind) = rest.rsplit_once('.')?;
    if parent.is_empty() {
        return None;
    }
    Some((parent.to_owned(), leaf))
}

/// Build the link marker for a resolved document.
fn document_link(
    ctx: &PipelineContext<'_>,
    node: &DocumentNode,
    hash: Option<&str>,
    label: Option<&str>,
) -> String {
    // Path separators in display names are not path segments.
    let mut result = note_filename(node, ctx.naming).replace('/', "-");
    let mut label = label.map(str::to_owned);

    // Section anchors are slugs; the page TOC maps them back to the
    // human-readable heading text.
    if let Some(hash) = hash {
        if let Some(heading) = node.toc.get(hash) {
            result.push('#');
            result.push_str(heading);
            if label.is_none() {
                label = Some(heading.clone());
            }
        }
    } else if label.is_none() {
        label = Some(node.display_name.clone());
    }

    if ctx.naming == IdentifierNaming::DisplayName
        && let Some(collection) = &node.collection
    {
        result = format!("{collection}/{result}");
    }

    format_link(&result, label.as_deref(), false)
}

/// The note filename a document exports under.
///
/// A journal with a single page collapses into one note carrying the
/// journal's own name, so links to either land in the same place.
#[must_use]
pub fn note_filename(node: &DocumentNode, naming: IdentifierNaming) -> String {
    if node.kind == DocumentKind::JournalPage
        && let Some(parent) = &node.parent
        && parent.page_count == 1
    {
        return match naming {
            IdentifierNaming::Uuid => parent.identifier.clone(),
            IdentifierNaming::DisplayName => valid_filename(&parent.display_name),
        };
    }
    match naming {
        IdentifierNaming::Uuid => node.identifier.clone(),
        IdentifierNaming::DisplayName => valid_filename(&node.display_name),
    }
}

/// Replace filesystem-hostile characters with `_`.
#[must_use]
pub fn valid_filename(name: &str) -> String {
    name.replace(['<', '>', ':', '"', '/', '\\', '|', '?', '*'], "_")
}

/// Sweep residual `![label](path)` file references through the asset
/// collector, replacing each with a marker for the collected asset.
///
/// Runs both before and after the HTML→Markdown pass; non-file paths
/// (data URIs, sentinel references) stay in place.
#[must_use]
pub fn sweep_file_references(ctx: &PipelineContext<'_>, text: &str) -> String {
    FILE_REF
        .replace_all(text, |caps: &Captures<'_>| {
            let label = Some(&caps[1]).filter(|l| !l.is_empty()).map(|l| l.to_owned());
            match ctx.collect_file(&caps[2], label.as_deref(), true) {
                Some(marker) => marker,
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Sweep the sized-image form `![label|WxH](path)` the converter emits for
/// images carrying size attributes; the size becomes the marker label.
#[must_use]
pub fn sweep_sized_images(ctx: &PipelineContext<'_>, text: &str) -> String {
    SIZED_IMAGE
        .replace_all(text, |caps: &Captures<'_>| {
            match ctx.collect_file(&caps[2], Some(&caps[1]), true) {
                Some(marker) => marker,
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Rewrite already-emitted `[[uuid|label]]` markers into human-readable
/// `[[Pack Title/Name|label]]` form.
///
/// Used on template-rendered output when display-name naming is active.
/// Leveled condition names gain a ` 1` suffix to match their exported
/// note filenames.
#[must_use]
pub fn humanize_markers(ctx: &PipelineContext<'_>, text: &str) -> String {
    static MARKER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)\|([^\]]+)\]\]").unwrap());

    MARKER
        .replace_all(text, |caps: &Captures<'_>| {
            let target = &caps[1];
            let label = &caps[2];

            let (mut name, collection) = match ctx.graph.resolve(target) {
                Ok(node) => (valid_filename(&node.display_name), node.collection),
                Err(err) => {
                    debug!(target, error = %err, "marker target not found, keeping identifier");
                    (target.to_owned(), None)
                }
            };
            if LEVELED_CONDITIONS.contains(&name.as_str()) {
                name.push_str(" 1");
            }
            if let Some(collection) = collection {
                name = format!("{collection}/{name}");
            }
            format_link(&name, Some(label), false)
        })
        .into_owned()
}
