//! Text rendering of a node map.
//!
//! One character per grid cell, one row per `y` (top row is the smallest
//! `y`). Cells without a node are blank.
//!
//! ```text
//! S.o!#
//! ```

use std::collections::HashMap;
use wildfire_core::{DisplayStatus, Location, NodeSnapshot};

/// Glyph marking the station while it is still Safe and empty.
const STATION_GLYPH: char = 'S';

/// Renders the display-status map of `nodes`.
pub fn render_map(nodes: &[NodeSnapshot]) -> String {
    if nodes.is_empty() {
        return String::new();
    }

    let (mut min_x, mut max_x) = (i32::MAX, i32::MIN);
    let (mut min_y, mut max_y) = (i32::MAX, i32::MIN);
    for node in nodes {
        min_x = min_x.min(node.location.x);
        max_x = max_x.max(node.location.x);
        min_y = min_y.min(node.location.y);
        max_y = max_y.max(node.location.y);
    }

    let cells: HashMap<Location, &NodeSnapshot> = nodes.iter().map(|n| (n.location, n)).collect();
    let mut out = String::new();
    for y in min_y..=max_y {
        let row: String = (min_x..=max_x)
            .map(|x| match cells.get(&Location::new(x, y)) {
                Some(node) => glyph(node),
                None => ' ',
            })
            .collect();
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

fn glyph(node: &NodeSnapshot) -> char {
    if node.is_station && node.display == DisplayStatus::Safe {
        STATION_GLYPH
    } else {
        node.display.glyph()
    }
}

/// One-line key to the map glyphs.
pub fn legend() -> String {
    let statuses = [
        DisplayStatus::Safe,
        DisplayStatus::Threatened,
        DisplayStatus::Burning,
        DisplayStatus::Occupied,
        DisplayStatus::Fortified,
        DisplayStatus::Casualty,
    ];
    let mut parts: Vec<String> = vec![format!("{STATION_GLYPH} station")];
    parts.extend(statuses.iter().map(|s| format!("{} {:?}", s.glyph(), s)));
    parts.join("  ")
}
