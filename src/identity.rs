//! Node identity resolution.
//!
//! Most levels use the row's raw identity value directly as the node id, so
//! the same table referenced from two datapoints becomes one node drawn with
//! two edges.  Levels with `scoped_by` instead prefix the raw value with the
//! id of their nearest ancestor at the scoping level, which keeps e.g. two
//! functions' identically named datasets apart.

use ustr::Ustr;

use crate::row::{identity_value, Row};
use crate::schema::LevelSpec;

/// One step of the path from the root to the current insertion point.
#[derive(Clone, Debug, PartialEq)]
pub struct PathSegment {
    pub level: Ustr,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedIdentity {
    pub id: String,
    pub display_name: String,
}

/// Compute the node id for `raw_value` at `level` given the ancestors above
/// it (root first).
pub fn resolve(level: &LevelSpec, raw_value: &str, ancestors: &[PathSegment]) -> String {
    match scope_id(level, ancestors) {
        Some(scope) => format!("{}_{}", scope, raw_value),
        None => raw_value.to_string(),
    }
}

fn scope_id<'a>(level: &LevelSpec, ancestors: &'a [PathSegment]) -> Option<&'a str> {
    let scope_level = level.scoped_by?;
    ancestors
        .iter()
        .rev()
        .find(|seg| seg.level == scope_level)
        .map(|seg| seg.id.as_str())
}

/// Resolve the identity of `row` at `level`.  `None` means the row has no
/// usable value here and descent stops for this row.
pub fn resolve_row(level: &LevelSpec, row: &Row, ancestors: &[PathSegment]) -> Option<ResolvedIdentity> {
    let raw = identity_value(row, &level.identity_field)?;
    let id = resolve(level, &raw, ancestors);

    // The scope prefix only ever goes on the id, so the raw value is already
    // the unprefixed name.
    let display_name = identity_value(row, level.display_field()).unwrap_or(raw);

    Some(ResolvedIdentity { id, display_name })
}
