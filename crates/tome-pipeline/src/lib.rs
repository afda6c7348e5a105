//! Markup transformation pipeline for the Tome campaign exporter.
//!
//! Converts the document store's rich-text dialect — HTML carrying inline
//! domain tags (`@Check[...]`, `@Damage[...]`), a roll-formula
//! micro-language, and identifier-based hyperlinks — into clean Markdown
//! with `[[target|label]]` links, harvesting referenced media into the
//! archive sink along the way.
//!
//! The pipeline is a fixed chain of rewrite passes; each pass's output is
//! the next pass's input:
//!
//! 1. [`inline::rewrite`] — inline tag rewriting (calls [`formula::evaluate`]
//!    for dice and damage amounts)
//! 2. [`links::resolve`] / [`links::resolve_expanding_embeds`] — reference
//!    resolution against the document graph
//! 3. [`html::to_markdown`] — structural HTML→Markdown conversion
//! 4. residual cleanup and media sweeps ([`links::sweep_file_references`],
//!    [`links::sweep_sized_images`])
//!
//! [`html::convert_document`] composes all of the above. Nothing in this
//! crate aborts a multi-document export: every failure degrades to
//! best-effort text and a log line.
//!
//! All per-run state (graph handle, localizer, archive sink, naming and
//! icon settings) travels in an explicit [`PipelineContext`]; there are no
//! globals, so concurrent exports with different settings cannot interfere.

mod context;
pub mod formula;
pub mod glyphs;
pub mod html;
pub mod inline;
pub mod links;

pub use context::PipelineContext;
