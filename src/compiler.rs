//! Fold flat lineage rows into a `LineageTree` following a `HierarchySchema`.
//!
//! Each row walks the schema levels below the root, creating or reusing one
//! node per level under the current insertion point and merging the row's
//! fields into it.  A level without a usable identity value ends the walk
//! for that row; nothing at that level or deeper is created by it.

use serde_json::Value;

use crate::error::Result;
use crate::identity::{resolve_row, PathSegment};
use crate::row::{identity_value, prepare_rows, Row};
use crate::schema::HierarchySchema;
use crate::tree::{LineageTree, NodeHandle};

pub fn compile(rows: &[Row], schema: &HierarchySchema, root_name: &str) -> Result<LineageTree> {
    schema.validate()?;
    let _span = info_span!("compile", root = root_name, rows = rows.len()).entered();

    let root_level = schema.root_level();
    let mut tree = LineageTree::new(root_level.name, root_name);
    let root = tree.root();
    tree.get_mut(root).attributes.insert(
        root_level.identity_field.clone(),
        Value::String(root_name.to_string()),
    );

    let mut truncated = 0;
    for row in prepare_rows(rows, schema, root_name) {
        if !fold_row(&mut tree, schema, &row) {
            truncated += 1;
        }
    }

    info!(nodes = tree.len(), truncated, "compiled lineage tree");
    Ok(tree)
}

/// Walk one row down the hierarchy.  Returns false if the row stopped
/// before reaching the deepest level.
fn fold_row(tree: &mut LineageTree, schema: &HierarchySchema, row: &Row) -> bool {
    let root = tree.root();
    let mut ancestors = vec![PathSegment {
        level: tree.get(root).level,
        id: tree.get(root).id.clone(),
    }];
    let mut current: NodeHandle = root;

    for level in schema.levels.iter().skip(1) {
        let resolved = match resolve_row(level, row, &ancestors) {
            Some(resolved) => resolved,
            None => {
                trace!(level = %level.name, field = %level.identity_field, "row truncated");
                return false;
            }
        };

        let parent_level = tree.get(current).level;
        let edge_type = schema.edge_type(&parent_level, &level.name);
        let (handle, created) = tree.ensure_child(
            current,
            &resolved.id,
            level.name,
            &resolved.display_name,
            edge_type,
        );

        let node = tree.get_mut(handle);
        if !created && identity_value(row, level.display_field()).is_some() {
            node.display_name = resolved.display_name;
        }
        merge_fields(&mut node.attributes, row, None);
        if let (Some(rel), Some(edge)) = (
            schema.relationship(&parent_level, &level.name),
            node.edge.as_mut(),
        ) {
            merge_fields(&mut edge.properties, row, Some(&rel.edge_properties));
        }

        ancestors.push(PathSegment {
            level: level.name,
            id: resolved.id,
        });
        current = handle;
    }

    true
}

/// Last-write-wins merge of the row's non-null fields, optionally limited to
/// a set of field names.
fn merge_fields(target: &mut Row, row: &Row, only: Option<&[String]>) {
    for (key, value) in row {
        if value.is_null() {
            continue;
        }
        if let Some(only) = only {
            if !only.iter().any(|f| f == key) {
                continue;
            }
        }
        target.insert(key.clone(), value.clone());
    }
}
