use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use ustr::Ustr;

use crate::controller::CollapsePolicy;
use crate::error::{BuildError, ErrorLayer, Result};
use crate::layout::LayoutConfig;
use crate::schema::HierarchySchema;
use crate::theme::Theme;

/// Either the name of a built-in schema or a complete inline one.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SchemaSource {
    Named(String),
    Inline(HierarchySchema),
}

impl Default for SchemaSource {
    fn default() -> Self {
        SchemaSource::Named("default".to_string())
    }
}

impl SchemaSource {
    pub fn resolve(&self) -> Result<HierarchySchema> {
        let schema = match self {
            SchemaSource::Named(name) => HierarchySchema::builtin(name).ok_or_else(|| {
                BuildError::new(ErrorLayer::Schema, format!("unknown built-in schema '{}'", name))
            })?,
            SchemaSource::Inline(schema) => schema.clone(),
        };
        schema.validate()?;
        Ok(schema)
    }
}

fn default_title() -> String {
    "Lineage Graph".to_string()
}

fn default_height() -> String {
    "800px".to_string()
}

/// Schema for the optional TOML build configuration.  Every section is
/// optional; a missing file is equivalent to an empty one.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// CSS height of the drawing area.
    #[serde(default = "default_height")]
    pub height: String,
    #[serde(default)]
    pub schema: SchemaSource,
    /// Levels drawn up front; defaults to the root and its child level.
    #[serde(default)]
    pub initial_levels: Option<Vec<String>>,
    #[serde(default)]
    pub collapse_policy: CollapsePolicy,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Overrides merged over the built-in lineage theme.
    #[serde(default)]
    pub theme: Option<Theme>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            title: default_title(),
            height: default_height(),
            schema: SchemaSource::default(),
            initial_levels: None,
            collapse_policy: CollapsePolicy::default(),
            layout: LayoutConfig::default(),
            theme: None,
        }
    }
}

impl BuildConfig {
    pub fn from_toml_str(s: &str) -> Result<BuildConfig> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<BuildConfig> {
        let contents = fs::read_to_string(path)?;
        let config = BuildConfig::from_toml_str(&contents)?;
        debug!(path = %path.display(), "loaded build config");
        Ok(config)
    }

    pub fn theme(&self) -> Theme {
        match &self.theme {
            Some(overrides) => Theme::lineage().merged(overrides.clone()),
            None => Theme::lineage(),
        }
    }

    /// Initial levels, checked against the schema.
    pub fn initial_levels(&self, schema: &HierarchySchema) -> Result<Vec<Ustr>> {
        let Some(levels) = &self.initial_levels else {
            return Ok(schema.default_initial_levels());
        };
        levels
            .iter()
            .map(|name| match schema.level(name) {
                Some(level) => Ok(level.name),
                None => Err(BuildError::new(
                    ErrorLayer::Schema,
                    format!("initial level '{}' is not part of the schema", name),
                )),
            })
            .collect::<Result<Vec<Ustr>>>()
            .map(|mut levels| {
                let root = schema.root_level().name;
                if !levels.contains(&root) {
                    levels.insert(0, root);
                }
                levels
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ustr::ustr;

    #[test]
    fn empty_config_uses_defaults() {
        let config = BuildConfig::from_toml_str("").unwrap();
        assert_eq!(config, BuildConfig::default());
        let schema = config.schema.resolve().unwrap();
        assert_eq!(
            config.initial_levels(&schema).unwrap(),
            vec![ustr("model"), ustr("function")]
        );
        assert_eq!(config.collapse_policy, CollapsePolicy::RefCounted);
    }

    #[test]
    fn named_schema_and_options() {
        let config = BuildConfig::from_toml_str(
            r#"
            title = "Finance"
            schema = "extended"
            initial_levels = ["function", "dataset"]
            collapse_policy = "by_id"

            [layout]
            grid_threshold = 4
            [layout.default_spacing]
            x_spacing = 100.0
            y_offset = 90.0
            "#,
        )
        .unwrap();
        let schema = config.schema.resolve().unwrap();
        assert!(schema.level("downstream_column").is_some());
        // The root is always drawn.
        assert_eq!(
            config.initial_levels(&schema).unwrap(),
            vec![ustr("model"), ustr("function"), ustr("dataset")]
        );
        assert_eq!(config.collapse_policy, CollapsePolicy::ById);
        assert_eq!(config.layout.grid_threshold, 4);
        assert_eq!(config.layout.spacing_for("table").y_offset, 180.0);
        assert_eq!(config.layout.spacing_for("widget").y_offset, 90.0);
    }

    #[test]
    fn inline_schema() {
        let config = BuildConfig::from_toml_str(
            r#"
            [[schema.levels]]
            name = "system"
            identity_field = "system"
            [[schema.levels]]
            name = "job"
            identity_field = "job"
            scoped_by = "system"
            [[schema.relationships]]
            parent = "system"
            child = "job"
            edge_type = "runs"
            "#,
        )
        .unwrap();
        let schema = config.schema.resolve().unwrap();
        assert_eq!(schema.levels.len(), 2);
        assert_eq!(schema.edge_type("system", "job"), "runs");
    }

    #[test]
    fn bad_references_are_schema_errors() {
        let config = BuildConfig::from_toml_str(r#"schema = "nope""#).unwrap();
        assert_eq!(config.schema.resolve().unwrap_err().layer(), ErrorLayer::Schema);

        let config = BuildConfig::from_toml_str(r#"initial_levels = ["column"]"#).unwrap();
        let schema = config.schema.resolve().unwrap();
        assert_eq!(config.initial_levels(&schema).unwrap_err().layer(), ErrorLayer::Schema);

        let err = BuildConfig::from_toml_str("colapse_policy = 'by_id'").unwrap_err();
        assert_eq!(err.layer(), ErrorLayer::Schema);
    }
}
