use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ustr::{ustr, Ustr};

use crate::error::{BuildError, ErrorLayer, Result};

/// Edge type used when no relationship entry matches a parent/child pair.
pub const DEFAULT_EDGE_TYPE: &str = "default";

/// One tier of the hierarchy.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LevelSpec {
    pub name: Ustr,
    /// Row field whose value becomes the node's raw key.  The root level's
    /// field is injected from the externally supplied root name.
    pub identity_field: String,
    /// Row field used for display, defaulting to the identity field.
    #[serde(default)]
    pub display_field: Option<String>,
    /// When set, ids at this level are prefixed with the id of the nearest
    /// ancestor at the named level so that the same natural key under two
    /// different ancestors produces two nodes.
    #[serde(default)]
    pub scoped_by: Option<Ustr>,
    /// Whether nodes of this level should expand along with their parent.
    /// Unset means "only tables".
    #[serde(default)]
    pub auto_expand: Option<bool>,
}

impl LevelSpec {
    pub fn new(name: &str, identity_field: &str, display_field: &str) -> Self {
        LevelSpec {
            name: ustr(name),
            identity_field: identity_field.to_string(),
            display_field: Some(display_field.to_string()),
            scoped_by: None,
            auto_expand: None,
        }
    }

    pub fn scoped_by(mut self, ancestor_level: &str) -> Self {
        self.scoped_by = Some(ustr(ancestor_level));
        self
    }

    pub fn display_field(&self) -> &str {
        self.display_field.as_deref().unwrap_or(&self.identity_field)
    }

    pub fn auto_expand(&self) -> bool {
        self.auto_expand.unwrap_or(self.name.as_str() == "table")
    }
}

/// Parent level to child level mapping along with the edge type to use.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Relationship {
    pub parent: Ustr,
    pub child: Ustr,
    pub edge_type: String,
    /// Row fields copied onto the edge, e.g. the lookup method of a table.
    #[serde(default)]
    pub edge_properties: Vec<String>,
}

impl Relationship {
    pub fn new(parent: &str, child: &str, edge_type: &str) -> Self {
        Relationship {
            parent: ustr(parent),
            child: ustr(child),
            edge_type: edge_type.to_string(),
            edge_properties: vec![],
        }
    }

    pub fn with_properties(mut self, props: &[&str]) -> Self {
        self.edge_properties = props.iter().map(|p| p.to_string()).collect();
        self
    }
}

fn default_separator() -> String {
    "__".to_string()
}

/// A field synthesized for rows that lack it by joining other fields.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DerivedField {
    pub field: String,
    pub from: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HierarchySchema {
    pub levels: Vec<LevelSpec>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub derived_fields: Vec<DerivedField>,
}

impl Default for HierarchySchema {
    fn default() -> Self {
        HierarchySchema::default_lineage()
    }
}

impl HierarchySchema {
    /// model → function → dataset → datapoint → table
    pub fn default_lineage() -> Self {
        HierarchySchema {
            levels: vec![
                LevelSpec::new("model", "model_name", "model_name"),
                LevelSpec::new("function", "function_name", "function_name"),
                LevelSpec::new("dataset", "dataset_name", "dataset_name").scoped_by("function"),
                LevelSpec::new("datapoint", "datapoint_id", "datapoint"),
                LevelSpec::new("table", "table_name", "table_name"),
            ],
            relationships: vec![
                Relationship::new("model", "function", "model_to_function"),
                Relationship::new("function", "dataset", "function_to_dataset"),
                Relationship::new("dataset", "datapoint", "dataset_to_datapoint"),
                Relationship::new("datapoint", "table", "datapoint_to_table")
                    .with_properties(&["method"]),
            ],
            derived_fields: vec![DerivedField {
                field: "datapoint_id".to_string(),
                from: vec!["datapoint".to_string(), "function_name".to_string()],
                separator: default_separator(),
            }],
        }
    }

    /// The default lineage continued down to column-level downstream lineage.
    pub fn extended_lineage() -> Self {
        let mut schema = HierarchySchema::default_lineage();
        schema.levels.extend([
            LevelSpec::new("column", "column_name", "column_name"),
            LevelSpec::new("downstream_table", "downstream_table", "downstream_table"),
            LevelSpec::new("downstream_column", "downstream_column", "downstream_column"),
        ]);
        schema.relationships.extend([
            Relationship::new("table", "column", "table_to_column"),
            Relationship::new("column", "downstream_table", "column_to_downstream_table")
                .with_properties(&["transformation"]),
            Relationship::new(
                "downstream_table",
                "downstream_column",
                "downstream_table_to_downstream_column",
            ),
        ]);
        schema
    }

    /// Look up one of the built-in schemas by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "default" => Some(HierarchySchema::default_lineage()),
            "extended" => Some(HierarchySchema::extended_lineage()),
            _ => None,
        }
    }

    pub fn root_level(&self) -> &LevelSpec {
        // validate() guarantees at least one level.
        &self.levels[0]
    }

    pub fn level(&self, name: &str) -> Option<&LevelSpec> {
        self.levels.iter().find(|l| l.name.as_str() == name)
    }

    /// Root level plus the first child level.
    pub fn default_initial_levels(&self) -> Vec<Ustr> {
        self.levels.iter().take(2).map(|l| l.name).collect()
    }

    pub fn relationship(&self, parent: &str, child: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.parent.as_str() == parent && r.child.as_str() == child)
    }

    /// Resolve the edge type for a parent/child level pair, falling back to
    /// `DEFAULT_EDGE_TYPE`.
    pub fn edge_type(&self, parent: &str, child: &str) -> &str {
        self.relationship(parent, child)
            .map(|r| r.edge_type.as_str())
            .unwrap_or(DEFAULT_EDGE_TYPE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(BuildError::new(
                ErrorLayer::Schema,
                "hierarchy schema has no levels",
            ));
        }

        let mut seen = HashSet::new();
        for (i, level) in self.levels.iter().enumerate() {
            if !seen.insert(level.name) {
                return Err(BuildError::new(
                    ErrorLayer::Schema,
                    format!("level '{}' is declared twice", level.name),
                ));
            }
            if let Some(scope) = &level.scoped_by {
                let is_ancestor = self.levels[..i].iter().any(|l| l.name == *scope);
                if !is_ancestor {
                    return Err(BuildError::new(
                        ErrorLayer::Schema,
                        format!(
                            "level '{}' is scoped by '{}' which is not an earlier level",
                            level.name, scope
                        ),
                    ));
                }
            }
        }

        for rel in &self.relationships {
            for end in [&rel.parent, &rel.child] {
                if !seen.contains(end) {
                    return Err(BuildError::new(
                        ErrorLayer::Schema,
                        format!(
                            "relationship '{}' references unknown level '{}'",
                            rel.edge_type, end
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_validate() {
        HierarchySchema::default_lineage().validate().unwrap();
        HierarchySchema::extended_lineage().validate().unwrap();
        assert!(HierarchySchema::builtin("nope").is_none());
    }

    #[test]
    fn edge_type_falls_back_to_default() {
        let schema = HierarchySchema::default_lineage();
        assert_eq!(schema.edge_type("dataset", "datapoint"), "dataset_to_datapoint");
        assert_eq!(schema.edge_type("model", "table"), DEFAULT_EDGE_TYPE);
    }

    #[test]
    fn auto_expand_defaults_to_tables() {
        let schema = HierarchySchema::extended_lineage();
        let flagged: Vec<&str> = schema
            .levels
            .iter()
            .filter(|l| l.auto_expand())
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["table"]);
    }

    #[test]
    fn rejects_bad_references() {
        let mut schema = HierarchySchema::default_lineage();
        schema.relationships.push(Relationship::new("table", "column", "table_to_column"));
        assert_eq!(schema.validate().unwrap_err().layer(), ErrorLayer::Schema);

        let mut schema = HierarchySchema::default_lineage();
        schema.levels[1].scoped_by = Some(ustr("table"));
        assert!(schema.validate().is_err());

        let mut schema = HierarchySchema::default_lineage();
        schema.levels.push(LevelSpec::new("table", "x", "x"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn parses_from_toml() {
        let schema: HierarchySchema = toml::from_str(
            r#"
            [[levels]]
            name = "system"
            identity_field = "system"

            [[levels]]
            name = "job"
            identity_field = "job_id"
            display_field = "job_name"
            auto_expand = true

            [[relationships]]
            parent = "system"
            child = "job"
            edge_type = "runs"
            "#,
        )
        .unwrap();
        schema.validate().unwrap();
        assert_eq!(schema.root_level().display_field(), "system");
        assert!(schema.level("job").unwrap().auto_expand());
        assert!(schema.derived_fields.is_empty());
    }
}
