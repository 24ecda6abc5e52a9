use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::row::{scalar_to_string, Row};

/**
Per-type presentation: visual styles, display labels and tooltips.

Everything here is data.  Labels and tooltips are chosen from a small closed
set of named formatting strategies (`LabelFormat`, `TooltipFormat`) so that a
theme can be loaded from configuration and swapped per deployment without
carrying executable code.  Anything that needs a presentation decision goes
through the `StyleProvider` trait rather than a `Theme` directly.
*/

/// What a formatter gets to look at for one node.
#[derive(Clone, Copy, Debug)]
pub struct NodeView<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    pub attributes: &'a Row,
    pub child_count: usize,
}

impl<'a> NodeView<'a> {
    /// Resolve a field reference.  `@id` and `@name` address the node id and
    /// display name; anything else is looked up in the attributes.
    fn field(&self, field: &str) -> Option<String> {
        match field {
            "@id" => Some(self.id.to_string()),
            "@name" => Some(self.display_name.to_string()),
            _ => self.attributes.get(field).and_then(scalar_to_string),
        }
    }
}

pub trait StyleProvider {
    fn style_for(&self, node_type: &str) -> NodeStyle;
    fn label_for(&self, node_type: &str, node: &NodeView) -> String;
    fn tooltip_for(&self, node_type: &str, node: &NodeView) -> String;
    fn edge_style_for(&self, edge_type: &str) -> EdgeStyle;
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    Ellipse,
    Box,
    Diamond,
    Database,
    Dot,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FontStyle {
    pub size: u32,
    pub color: String,
    #[serde(default)]
    pub bold: bool,
}

impl FontStyle {
    fn new(size: u32, color: &str, bold: bool) -> Self {
        FontStyle {
            size,
            color: color.to_string(),
            bold,
        }
    }
}

fn default_border_width() -> u32 {
    1
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NodeStyle {
    pub background: String,
    pub border: String,
    pub shape: NodeShape,
    pub size: u32,
    pub font: FontStyle,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    #[serde(default)]
    pub border_width_selected: Option<u32>,
}

impl NodeStyle {
    fn new(background: &str, border: &str, shape: NodeShape, size: u32, font: FontStyle) -> Self {
        NodeStyle {
            background: background.to_string(),
            border: border.to_string(),
            shape,
            size,
            font,
            max_width: None,
            border_width: default_border_width(),
            border_width_selected: None,
        }
    }

    fn max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Expandable nodes are drawn with a heavier border.
    pub fn for_node(&self, expandable: bool) -> NodeStyle {
        let mut style = self.clone();
        if expandable {
            style.border_width += 2;
            style.border_width_selected = Some(style.border_width + 1);
        }
        style
    }
}

impl Default for NodeStyle {
    fn default() -> Self {
        NodeStyle::new(
            "#F0F8FF",
            "#D0E8EF",
            NodeShape::Ellipse,
            15,
            FontStyle::new(12, "#000000", false),
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EdgeStyle {
    pub width: u32,
    pub color: String,
    /// Edge property shown as the edge label, when present and non-empty.
    #[serde(default)]
    pub label_field: Option<String>,
    #[serde(default)]
    pub font: Option<FontStyle>,
}

impl EdgeStyle {
    fn new(width: u32, color: &str) -> Self {
        EdgeStyle {
            width,
            color: color.to_string(),
            label_field: None,
            font: None,
        }
    }

    fn labelled(mut self, field: &str, font: FontStyle) -> Self {
        self.label_field = Some(field.to_string());
        self.font = Some(font);
        self
    }

    pub fn label(&self, properties: &Row) -> Option<String> {
        let field = self.label_field.as_ref()?;
        properties
            .get(field)
            .and_then(scalar_to_string)
            .filter(|s| !s.is_empty())
    }
}

impl Default for EdgeStyle {
    fn default() -> Self {
        EdgeStyle::new(2, "#666666")
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelFormat {
    /// The display name as-is.
    #[default]
    Plain,
    /// Underscores become spaces and each word is capitalized.
    TitleCase,
    /// Last dotted segment with any `_VW` view suffix removed, title-cased.
    TableName,
    /// `"<display name> (<child count> fields)"`.
    WithChildCount,
}

impl LabelFormat {
    pub fn apply(&self, node: &NodeView) -> String {
        match self {
            LabelFormat::Plain => node.display_name.to_string(),
            LabelFormat::TitleCase => title_case(&node.display_name.replace('_', " ")),
            LabelFormat::TableName => {
                let last = node.display_name.rsplit('.').next().unwrap_or(node.display_name);
                title_case(&last.replace("_VW", "").replace('_', " "))
            }
            LabelFormat::WithChildCount => {
                format!("{} ({} fields)", node.display_name, node.child_count)
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TooltipLine {
    #[serde(default)]
    pub prefix: String,
    pub field: String,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TooltipFormat {
    #[default]
    None,
    /// A single field with a prefix; empty if the field is absent.
    Field {
        #[serde(default)]
        prefix: String,
        field: String,
    },
    /// Database / Schema / Table lines for `DB.SCHEMA.TABLE` style ids.
    QualifiedTable {
        #[serde(default)]
        prefix: String,
    },
    /// One `Key: value` line per attribute, minus the excluded keys.
    AttributeList {
        #[serde(default)]
        exclude: Vec<String>,
    },
    Lines { lines: Vec<TooltipLine> },
}

impl TooltipFormat {
    pub fn apply(&self, node: &NodeView) -> String {
        match self {
            TooltipFormat::None => String::new(),
            TooltipFormat::Field { prefix, field } => node
                .field(field)
                .map(|v| format!("{}{}", prefix, v))
                .unwrap_or_default(),
            TooltipFormat::QualifiedTable { prefix } => {
                let parts: Vec<&str> = node.id.split('.').collect();
                if parts.len() >= 3 {
                    format!(
                        "{}Database: {}\nSchema: {}\nTable: {}",
                        prefix,
                        parts[0],
                        parts[1],
                        parts[2..].join(".")
                    )
                } else {
                    format!("{}Table: {}", prefix, node.id)
                }
            }
            TooltipFormat::AttributeList { exclude } => node
                .attributes
                .iter()
                .filter(|(k, _)| !exclude.contains(*k))
                .filter_map(|(k, v)| {
                    scalar_to_string(v).map(|v| format!("{}: {}", title_case(&k.replace('_', " ")), v))
                })
                .join("\n"),
            TooltipFormat::Lines { lines } => lines
                .iter()
                .filter_map(|line| {
                    node.field(&line.field)
                        .or_else(|| line.default.clone())
                        .map(|v| format!("{}{}", line.prefix, v))
                })
                .join("\n"),
        }
    }
}

/// Capitalize the first letter of every alphabetic run and lowercase the
/// rest of it.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NodeTheme {
    pub style: NodeStyle,
    #[serde(default)]
    pub label: LabelFormat,
    #[serde(default)]
    pub tooltip: TooltipFormat,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Theme {
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeTheme>,
    #[serde(default)]
    pub edges: BTreeMap<String, EdgeStyle>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::lineage()
    }
}

impl Theme {
    /// Styles for every level of the built-in default and extended schemas.
    pub fn lineage() -> Self {
        use NodeShape::*;

        let navy = "#000080";
        let dark_red = "#8B0000";
        let mut nodes = BTreeMap::new();
        let mut node = |name: &str, style: NodeStyle, label: LabelFormat, tooltip: TooltipFormat| {
            nodes.insert(name.to_string(), NodeTheme { style, label, tooltip });
        };
        let field = |prefix: &str, field: &str| TooltipFormat::Field {
            prefix: prefix.to_string(),
            field: field.to_string(),
        };

        node(
            "model",
            NodeStyle::new("#1F4E79", "#0F3E69", Ellipse, 40, FontStyle::new(20, "white", true)),
            LabelFormat::Plain,
            field("Model: ", "@id"),
        );
        node(
            "function",
            NodeStyle::new("#4A90A4", "#3A8094", Box, 30, FontStyle::new(16, "white", true)),
            LabelFormat::Plain,
            field("", "function_definition"),
        );
        node(
            "dataset",
            NodeStyle::new("#87CEEB", "#77BEDB", Diamond, 40, FontStyle::new(14, navy, true)),
            LabelFormat::WithChildCount,
            field("", "@name"),
        );
        node(
            "datapoint",
            NodeStyle::new("#B0E0E6", "#A0D0D6", Ellipse, 25, FontStyle::new(11, navy, false))
                .max_width(150),
            LabelFormat::TitleCase,
            TooltipFormat::AttributeList {
                exclude: vec!["function_name".to_string(), "model_name".to_string()],
            },
        );
        node(
            "table",
            NodeStyle::new("#E6F3FF", "#D6E3EF", Database, 30, FontStyle::new(12, navy, true))
                .max_width(180),
            LabelFormat::TableName,
            TooltipFormat::QualifiedTable {
                prefix: String::new(),
            },
        );
        node(
            "column",
            NodeStyle::new("#F0F8FF", "#E0E8EF", Dot, 20, FontStyle::new(10, navy, false))
                .max_width(120),
            LabelFormat::TitleCase,
            TooltipFormat::Lines {
                lines: vec![
                    TooltipLine {
                        prefix: "Column: ".to_string(),
                        field: "@id".to_string(),
                        default: None,
                    },
                    TooltipLine {
                        prefix: "Type: ".to_string(),
                        field: "data_type".to_string(),
                        default: Some("Unknown".to_string()),
                    },
                ],
            },
        );
        node(
            "downstream_table",
            NodeStyle::new("#FFE4E1", "#EED4D1", Database, 30, FontStyle::new(12, dark_red, true))
                .max_width(180),
            LabelFormat::TableName,
            field("Downstream Table: ", "@id"),
        );
        node(
            "downstream_column",
            NodeStyle::new("#FFF0F5", "#EEE0E5", Dot, 20, FontStyle::new(10, dark_red, false))
                .max_width(120),
            LabelFormat::TitleCase,
            field("Downstream Column: ", "@id"),
        );

        let mut edges = BTreeMap::new();
        edges.insert("model_to_function".to_string(), EdgeStyle::new(3, "#1F4E79"));
        edges.insert("function_to_dataset".to_string(), EdgeStyle::default());
        edges.insert("dataset_to_datapoint".to_string(), EdgeStyle::default());
        edges.insert(
            "datapoint_to_table".to_string(),
            EdgeStyle::default().labelled("method", FontStyle::new(10, "#333333", false)),
        );
        edges.insert("table_to_column".to_string(), EdgeStyle::new(1, "#999999"));
        edges.insert(
            "column_to_downstream_table".to_string(),
            EdgeStyle::new(2, "#CC6666").labelled("transformation", FontStyle::new(9, dark_red, false)),
        );
        edges.insert(
            "downstream_table_to_downstream_column".to_string(),
            EdgeStyle::new(1, "#AA5555"),
        );
        edges.insert("default".to_string(), EdgeStyle::default());

        Theme { nodes, edges }
    }

    /// Replace entries of this theme with those present in `overrides`.
    pub fn merged(mut self, overrides: Theme) -> Theme {
        self.nodes.extend(overrides.nodes);
        self.edges.extend(overrides.edges);
        self
    }

    /// Style tables for hand-off to the document, with the fallbacks under
    /// the `default` keys.
    pub fn style_tables(&self) -> (BTreeMap<String, NodeStyle>, BTreeMap<String, EdgeStyle>) {
        let mut node_styles: BTreeMap<String, NodeStyle> = self
            .nodes
            .iter()
            .map(|(k, v)| (k.clone(), v.style.clone()))
            .collect();
        node_styles
            .entry("default".to_string())
            .or_insert_with(NodeStyle::default);
        let mut edge_styles = self.edges.clone();
        edge_styles
            .entry("default".to_string())
            .or_insert_with(EdgeStyle::default);
        (node_styles, edge_styles)
    }
}

impl StyleProvider for Theme {
    fn style_for(&self, node_type: &str) -> NodeStyle {
        self.nodes
            .get(node_type)
            .map(|t| t.style.clone())
            .unwrap_or_default()
    }

    fn label_for(&self, node_type: &str, node: &NodeView) -> String {
        self.nodes
            .get(node_type)
            .map(|t| t.label)
            .unwrap_or_default()
            .apply(node)
    }

    fn tooltip_for(&self, node_type: &str, node: &NodeView) -> String {
        match self.nodes.get(node_type) {
            Some(t) => t.tooltip.apply(node),
            None => String::new(),
        }
    }

    fn edge_style_for(&self, edge_type: &str) -> EdgeStyle {
        self.edges
            .get(edge_type)
            .or_else(|| self.edges.get("default"))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view<'a>(id: &'a str, name: &'a str, attrs: &'a Row, child_count: usize) -> NodeView<'a> {
        NodeView {
            id,
            display_name: name,
            attributes: attrs,
            child_count,
        }
    }

    #[test]
    fn labels() {
        let theme = Theme::lineage();
        let attrs = Row::new();
        assert_eq!(
            theme.label_for("table", &view("FIN.DB.REVENUE_MONTHLY_VW", "FIN.DB.REVENUE_MONTHLY_VW", &attrs, 0)),
            "Revenue Monthly"
        );
        assert_eq!(
            theme.label_for("dataset", &view("f_sales", "sales", &attrs, 3)),
            "sales (3 fields)"
        );
        assert_eq!(
            theme.label_for("datapoint", &view("customer_count__f", "customer_count", &attrs, 0)),
            "Customer Count"
        );
        assert_eq!(theme.label_for("mystery", &view("x_y", "x_y", &attrs, 0)), "x_y");
    }

    #[test]
    fn tooltips() {
        let theme = Theme::lineage();
        let attrs: Row = json!({
            "function_name": "f",
            "dataset_name": "fin_data",
            "source_type": "API",
        })
        .as_object()
        .unwrap()
        .clone();

        assert_eq!(
            theme.tooltip_for("table", &view("DB.SCHEMA.T.X", "", &attrs, 0)),
            "Database: DB\nSchema: SCHEMA\nTable: T.X"
        );
        assert_eq!(theme.tooltip_for("table", &view("T", "", &attrs, 0)), "Table: T");
        assert_eq!(
            theme.tooltip_for("datapoint", &view("d", "d", &attrs, 0)),
            "Dataset Name: fin_data\nSource Type: API"
        );
        assert_eq!(
            theme.tooltip_for("column", &view("C1", "C1", &attrs, 0)),
            "Column: C1\nType: Unknown"
        );
        // Missing field gives no tooltip rather than a bare prefix.
        assert_eq!(theme.tooltip_for("function", &view("f", "f", &attrs, 0)), "");
        assert_eq!(theme.tooltip_for("mystery", &view("m", "m", &attrs, 0)), "");
    }

    #[test]
    fn edge_styles_fall_back() {
        let theme = Theme::lineage();
        assert_eq!(theme.edge_style_for("table_to_column").width, 1);
        assert_eq!(theme.edge_style_for("nope"), EdgeStyle::default());

        let props: Row = json!({"method": "QRP"}).as_object().unwrap().clone();
        assert_eq!(
            theme.edge_style_for("datapoint_to_table").label(&props).as_deref(),
            Some("QRP")
        );
        assert_eq!(theme.edge_style_for("function_to_dataset").label(&props), None);
    }

    #[test]
    fn expandable_nodes_get_heavier_borders() {
        let style = Theme::lineage().style_for("function");
        assert_eq!(style.for_node(false).border_width, 1);
        let expandable = style.for_node(true);
        assert_eq!(expandable.border_width, 3);
        assert_eq!(expandable.border_width_selected, Some(4));
    }

    #[test]
    fn overrides_from_toml() {
        let overrides: Theme = toml::from_str(
            r##"
            [nodes.table]
            label = "plain"
            tooltip = { kind = "field", prefix = "T: ", field = "@id" }
            [nodes.table.style]
            background = "#000000"
            border = "#111111"
            shape = "box"
            size = 10
            font = { size = 9, color = "red" }
            "##,
        )
        .unwrap();
        let theme = Theme::lineage().merged(overrides);
        let attrs = Row::new();
        assert_eq!(theme.style_for("table").shape, NodeShape::Box);
        assert_eq!(theme.label_for("table", &view("A.B_VW", "A.B_VW", &attrs, 0)), "A.B_VW");
        assert_eq!(theme.tooltip_for("table", &view("A", "A", &attrs, 0)), "T: A");
        // Untouched entries survive.
        assert_eq!(theme.style_for("model").size, 40);
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("hello WORLD 2nd"), "Hello World 2Nd");
    }
}
