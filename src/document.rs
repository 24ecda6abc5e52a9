//! Assemble the self-contained HTML document and write it out.
//!
//! The document embeds everything the browser needs as one JSON payload: the
//! materialized view, the style tables, the layout constants and the collapse
//! policy.  The drawing code and the browser port of the expansion protocol
//! come from the embedded templates; nothing is fetched at view time.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compiler::compile;
use crate::config::BuildConfig;
use crate::controller::{CollapsePolicy, ExpansionController};
use crate::error::{BuildError, ErrorLayer, Result};
use crate::layout::LayoutConfig;
use crate::materialize::{materialize, MaterializedView};
use crate::row::Row;
use crate::templating::builder::build_and_parse_lineage_graph;
use crate::theme::{EdgeStyle, NodeStyle, Theme};

#[derive(Clone, Debug, Serialize)]
pub struct DocumentPayload {
    #[serde(flatten)]
    pub view: MaterializedView,
    pub node_styles: BTreeMap<String, NodeStyle>,
    pub edge_styles: BTreeMap<String, EdgeStyle>,
    pub layout: LayoutConfig,
    pub collapse_policy: CollapsePolicy,
}

pub struct LineageDocument {
    pub title: String,
    pub height: String,
    pub theme: Theme,
    pub payload: DocumentPayload,
}

impl LineageDocument {
    /// Run the whole pipeline: resolve the schema, compile the rows and
    /// materialize the view.
    pub fn build(rows: &[Row], root_name: &str, config: &BuildConfig) -> Result<LineageDocument> {
        let schema = config.schema.resolve()?;
        let initial_levels = config.initial_levels(&schema)?;
        let theme = config.theme();

        let tree = compile(rows, &schema, root_name)?;
        let view = materialize(&tree, &schema, &initial_levels, &theme);
        let (node_styles, edge_styles) = theme.style_tables();

        Ok(LineageDocument {
            title: config.title.clone(),
            height: config.height.clone(),
            theme,
            payload: DocumentPayload {
                view,
                node_styles,
                edge_styles,
                layout: config.layout.clone(),
                collapse_policy: config.collapse_policy,
            },
        })
    }

    /// A controller over this document's view, for driving it headlessly.
    pub fn controller(&self) -> ExpansionController<'_> {
        ExpansionController::new(
            &self.payload.view,
            &self.theme,
            &self.payload.layout,
            self.payload.collapse_policy,
        )
    }

    pub fn render(&self) -> Result<String> {
        let _span = info_span!("render_document").entered();
        let template = build_and_parse_lineage_graph()?;
        let payload = liquid_core::model::to_value(&self.payload)?;
        let globals = liquid::object!({
            "title": self.title,
            "height": self.height,
            "payload": payload,
        });
        let html = template.render(&globals)?;
        debug!(bytes = html.len(), "rendered document");
        Ok(html)
    }

    pub fn write_html(&self, path: &Path) -> Result<()> {
        let html = self.render()?;
        write_atomically(path, html.as_bytes())?;
        info!(path = %path.display(), "wrote lineage document");
        Ok(())
    }

    /// Dump the payload as pretty JSON, mostly for diffing and debugging.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.payload)?;
        write_atomically(path, json.as_bytes())?;
        info!(path = %path.display(), "wrote payload json");
        Ok(())
    }
}

fn output_problem(path: &Path, what: &str, err: std::io::Error) -> BuildError {
    BuildError::new(
        ErrorLayer::Output,
        format!("Problem {} '{}': {}", what, path.display(), err),
    )
}

fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        BuildError::new(
            ErrorLayer::Output,
            format!("Output path '{}' has no file name", path.display()),
        )
    })?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(format!(".tmp-{}", std::process::id()));
    Ok(path.with_file_name(temp_name))
}

/// Write `contents` to a temporary sibling of `path` and rename it into place,
/// creating parent directories as needed.  On failure the temporary file is
/// removed and `path` is left as it was.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_problem(parent, "creating", e))?;
    }

    let temp_path = temp_sibling(path)?;
    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    let result = written
        .map_err(|e| output_problem(&temp_path, "writing", e))
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| output_problem(path, "replacing", e)));

    if result.is_err() {
        if let Err(err) = fs::remove_file(&temp_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %temp_path.display(), %err, "could not remove temporary file");
            }
        }
    }
    result
}
