use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// Horizontal distance between siblings and vertical drop below the parent.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Spacing {
    pub x_spacing: f64,
    pub y_offset: f64,
}

impl Spacing {
    pub fn new(x_spacing: f64, y_offset: f64) -> Self {
        Spacing { x_spacing, y_offset }
    }
}

fn default_spacing_table() -> BTreeMap<String, Spacing> {
    [
        ("dataset", Spacing::new(400.0, 220.0)),
        ("datapoint", Spacing::new(180.0, 180.0)),
        ("table", Spacing::new(200.0, 180.0)),
        ("column", Spacing::new(150.0, 160.0)),
        ("downstream_table", Spacing::new(220.0, 200.0)),
        ("downstream_column", Spacing::new(140.0, 160.0)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_fallback_spacing() -> Spacing {
    Spacing::new(250.0, 180.0)
}

fn default_grid_threshold() -> usize {
    6
}

fn default_grid_row_height() -> f64 {
    80.0
}

/// Placement constants for newly revealed children.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_spacing_table")]
    pub spacing: BTreeMap<String, Spacing>,
    #[serde(default = "default_fallback_spacing")]
    pub default_spacing: Spacing,
    /// Sibling counts above this are laid out as a grid instead of a row.
    #[serde(default = "default_grid_threshold")]
    pub grid_threshold: usize,
    #[serde(default = "default_grid_row_height")]
    pub grid_row_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            spacing: default_spacing_table(),
            default_spacing: default_fallback_spacing(),
            grid_threshold: default_grid_threshold(),
            grid_row_height: default_grid_row_height(),
        }
    }
}

impl LayoutConfig {
    pub fn spacing_for(&self, node_type: &str) -> Spacing {
        self.spacing
            .get(node_type)
            .copied()
            .unwrap_or(self.default_spacing)
    }

    /// Position of sibling `index` out of `count` below `parent`.  Rows are
    /// centered under the parent; dense sibling sets wrap into a grid of
    /// ⌈√count⌉ columns.
    pub fn place(&self, parent: Position, node_type: &str, index: usize, count: usize) -> Position {
        let spacing = self.spacing_for(node_type);
        let (columns, column, row) = if count > self.grid_threshold {
            let columns = (count as f64).sqrt().ceil() as usize;
            (columns, index % columns, index / columns)
        } else {
            (count.max(1), index, 0)
        };

        let centered = column as f64 - (columns as f64 - 1.0) / 2.0;
        Position {
            x: parent.x + centered * spacing.x_spacing,
            y: parent.y + spacing.y_offset + row as f64 * self.grid_row_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_is_centered() {
        let layout = LayoutConfig::default();
        let parent = Position::new(100.0, 50.0);
        let xs: Vec<f64> = (0..3)
            .map(|i| layout.place(parent, "datapoint", i, 3).x)
            .collect();
        assert_eq!(xs, vec![-80.0, 100.0, 280.0]);
        assert_eq!(layout.place(parent, "datapoint", 0, 3).y, 230.0);
        assert_eq!(layout.place(parent, "datapoint", 0, 1).x, 100.0);
    }

    #[test]
    fn dense_siblings_form_a_grid() {
        let layout = LayoutConfig::default();
        let parent = Position::new(0.0, 0.0);
        // 7 > threshold so 3 columns.
        let placed: Vec<Position> = (0..7)
            .map(|i| layout.place(parent, "table", i, 7))
            .collect();
        assert_eq!(placed[0], Position::new(-200.0, 180.0));
        assert_eq!(placed[2], Position::new(200.0, 180.0));
        assert_eq!(placed[3], Position::new(-200.0, 260.0));
        assert_eq!(placed[6], Position::new(-200.0, 340.0));
    }

    #[test]
    fn unknown_types_use_default_spacing() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.spacing_for("widget"), Spacing::new(250.0, 180.0));
    }
}
