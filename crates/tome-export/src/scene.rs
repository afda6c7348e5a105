//! Scene emission as an interactive map code block.
//!
//! Scene geometry lives in pixels; the map block wants map units, so
//! every coordinate is scaled by `grid_distance / grid_size` and the Y
//! axis is flipped against the scene rectangle's bottom edge. Background,
//! foreground, and tile images go through the asset collector; pinned
//! journal notes become markers linking to their exported notes.

use tome_archive::format_link;
use tome_graph::{DocumentBody, DocumentNode};
use tome_pipeline::links;

use crate::emit::{Exporter, join_path};
use crate::frontmatter::frontmatter;

pub(crate) fn emit_scene(exporter: &Exporter<'_>, path: &str, doc: &DocumentNode) {
    let DocumentBody::Scene(scene) = &doc.body else {
        return;
    };
    let ctx = exporter.ctx;

    let units_per_pixel = if scene.grid_size > 0.0 {
        scene.grid_distance / scene.grid_size
    } else {
        1.0
    };
    let coord = |pixels: f64| fmt_coord(pixels * units_per_pixel);
    // Map coordinates are (lat, long) with Y inverted and the scene
    // padding removed.
    let coord2 =
        |py: f64, px: f64| format!("{}, {}", coord(scene.rect.bottom - py), coord(px - scene.rect.left));

    let mut overlays = Vec::new();
    if let Some(foreground) = &scene.foreground
        && let Some(marker) = ctx.collect_file(foreground, Some("Foreground"), false)
    {
        overlays.push(marker);
    }
    for tile in &scene.tiles {
        let name = tile.src.rsplit('/').next().unwrap_or(&tile.src);
        let Some(marker) = ctx.collect_file(&tile.src, Some(name), false) else {
            continue;
        };
        overlays.push(format!(
            "{marker}, [{}], [{}]",
            coord2(tile.y + tile.height - 1.0, tile.x),
            coord2(tile.y, tile.x + tile.width - 1.0)
        ));
    }
    let layers = if overlays.is_empty() {
        String::new()
    } else {
        let lines: String = overlays
            .iter()
            .map(|overlay| format!("    - [ {overlay} ]\n"))
            .collect();
        format!("imageOverlay:\n{lines}")
    };

    let image = scene
        .background
        .as_ref()
        .and_then(|background| ctx.collect_file(background, None, false))
        .unwrap_or_default();

    let mut markdown = frontmatter(doc, true);
    markdown.push_str(&format!(
        "\n```leaflet\n\
         id: {id}\n\
         bounds:\n    - [0, 0]\n    - [{height}, {width}]\n\
         defaultZoom: 2\n\
         lat: {lat}\n\
         long: {long}\n\
         height: 100%\n\
         draw: false\n\
         unit: {unit}\n\
         showAllMarkers: true\n\
         preserveAspect: true\n\
         image: {image}\n\
         {layers}",
        id = doc.identifier,
        height = coord(scene.rect.height),
        width = coord(scene.rect.width),
        lat = coord(scene.rect.height / 2.0),
        long = coord(scene.rect.width / 2.0),
        unit = scene.grid_units,
    ));

    for note in &scene.notes {
        let linkfile = note
            .target
            .as_ref()
            .and_then(|target| ctx.graph.resolve(target).ok())
            .map_or_else(
                || "Not Linked".to_owned(),
                |node| links::note_filename(&node, ctx.naming),
            );
        // The map block treats ':' in marker labels as syntax.
        let label = note.label.replace(':', "_");
        markdown.push_str(&format!(
            "marker: default, {}, {}\n",
            coord2(note.y, note.x),
            format_link(&linkfile, Some(&label), false)
        ));
    }
    markdown.push_str("```");

    exporter.add_note(&join_path(path, &exporter.note_name(doc)), markdown);
}

/// Coordinates print bare when integral, with their fraction otherwise.
fn fmt_coord(value: f64) -> String {
    if value.is_finite() && (value - value.round()).abs() < 1e-9 {
        #[allow(clippy::cast_possible_truncation)]
        let rounded = value.round() as i64;
        rounded.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tome_archive::{ArchiveSink, FetchError, MediaSource};
    use tome_config::{ExportConfig, IconStyle};
    use tome_graph::mock::MemoryGraph;
    use tome_graph::{DocumentKind, SceneBody, SceneNote, SceneRect, SceneTile};
    use tome_pipeline::PipelineContext;

    struct EmptySource;

    impl MediaSource for EmptySource {
        fn fetch(&self, _path: &str) -> Result<Vec<u8>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn scene_doc() -> DocumentNode {
        let mut doc = DocumentNode::new("Scene.keep", "The Keep", DocumentKind::Scene);
        doc.body = DocumentBody::Scene(SceneBody {
            rect: SceneRect {
                left: 0.0,
                bottom: 3000.0,
                width: 4000.0,
                height: 3000.0,
            },
            grid_distance: 5.0,
            grid_size: 100.0,
            grid_units: "ft".to_owned(),
            background: Some("worlds/maps/keep.webp".to_owned()),
            foreground: None,
            tiles: vec![SceneTile {
                src: "worlds/tiles/tower.webp".to_owned(),
                x: 0.0,
                y: 0.0,
                width: 200.0,
                height: 200.0,
            }],
            notes: vec![SceneNote {
                x: 500.0,
                y: 1000.0,
                label: "Gate: north".to_owned(),
                target: Some("JournalEntry.gate".to_owned()),
            }],
        });
        doc
    }

    #[test]
    fn scene_emits_map_block() {
        let mut graph = MemoryGraph::new();
        graph.insert(DocumentNode::new(
            "JournalEntry.gate",
            "The Gate",
            DocumentKind::Journal,
        ));
        let localizer: HashMap<String, String> = HashMap::new();
        let sink = RefCell::new(ArchiveSink::new("zz_asset-files"));
        let config = ExportConfig::default();
        let ctx = PipelineContext::new(
            &graph,
            &localizer,
            &sink,
            config.naming,
            IconStyle::Shortcode,
        );

        Exporter::new(&ctx, &config).emit("maps", &scene_doc());

        let entries = sink.into_inner().finish(&EmptySource);
        let note = entries
            .iter()
            .find(|e| e.name == "maps/Scene.keep.md")
            .expect("scene note");
        let text = String::from_utf8(note.data.clone()).unwrap();

        assert!(text.contains("```leaflet"));
        // 3000px tall, 4000px wide at 5ft per 100px.
        assert!(text.contains("    - [150, 200]"));
        assert!(text.contains("unit: ft"));
        assert!(text.contains("image: [[worlds-maps-keep.webp]]"));
        assert!(text.contains("imageOverlay:"));
        assert!(text.contains("[[worlds-tiles-tower.webp|tower.webp]]"));
        // Note at (500, 1000): lat (3000-1000)*0.05 = 100, long 25; label
        // colon replaced.
        assert_eq!(
            text.lines()
                .find(|line| line.starts_with("marker:"))
                .unwrap(),
            "marker: default, 100, 25, [[JournalEntry.gate|Gate_ north]]"
        );
        // The scene media were registered for fetching.
        assert!(entries.iter().any(|e| e.name == "zz_asset-files/worlds-maps-keep.webp"));
        assert!(entries.iter().any(|e| e.name == "zz_asset-files/worlds-tiles-tower.webp"));
    }
}
