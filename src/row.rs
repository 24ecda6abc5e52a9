use std::{fs, io::Read, path::Path};

use clap::ValueEnum;
use serde_json::{Map, Value};

use crate::error::{BuildError, ErrorLayer, Result};
use crate::schema::{DerivedField, HierarchySchema};

/// One record of the flat lineage dataset.  Field order is preserved and
/// absent fields are simply missing; loaders strip explicit nulls so that
/// "present" always means "usable".
pub type Row = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Json,
    Jsonl,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<InputFormat> {
        match path.extension()?.to_str()? {
            "csv" => Some(InputFormat::Csv),
            "json" => Some(InputFormat::Json),
            "jsonl" | "ndjson" => Some(InputFormat::Jsonl),
            _ => None,
        }
    }
}

pub fn load_rows(path: &Path, format: InputFormat) -> Result<Vec<Row>> {
    let rows = match format {
        InputFormat::Csv => parse_csv(fs::File::open(path)?)?,
        InputFormat::Json => parse_json(&fs::read_to_string(path)?)?,
        InputFormat::Jsonl => parse_json_lines(&fs::read_to_string(path)?)?,
    };
    debug!(path = %path.display(), rows = rows.len(), "loaded lineage rows");
    Ok(rows)
}

/// Parse CSV with a header row.  Empty cells are treated as null.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            if !cell.is_empty() {
                row.insert(header.to_string(), Value::String(cell.to_string()));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Parse a JSON array of objects.
pub fn parse_json(s: &str) -> Result<Vec<Row>> {
    match serde_json::from_str(s)? {
        Value::Array(items) => items.into_iter().map(value_to_row).collect(),
        _ => Err(BuildError::new(
            ErrorLayer::BadInput,
            "expected a JSON array of row objects",
        )),
    }
}

/// Parse one JSON object per line, ignoring blank lines.
pub fn parse_json_lines(s: &str) -> Result<Vec<Row>> {
    s.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| value_to_row(serde_json::from_str(line)?))
        .collect()
}

fn value_to_row(value: Value) -> Result<Row> {
    match value {
        Value::Object(obj) => Ok(obj.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(BuildError::new(
            ErrorLayer::BadInput,
            format!("expected a row object but found {}", other),
        )),
    }
}

/// Render a scalar field value as an identity string.  Integral floats lose
/// their fractional part so that `7.0` and `7` name the same node; nulls
/// and structured values have no identity.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i.to_string());
            }
            if let Some(u) = n.as_u64() {
                return Some(u.to_string());
            }
            match n.as_f64() {
                // Past the i64 range the cast would saturate and merge ids.
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Some((f as i64).to_string())
                }
                _ => Some(n.to_string()),
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// The usable identity value of `field`, if any.
pub fn identity_value(row: &Row, field: &str) -> Option<String> {
    row.get(field).and_then(scalar_to_string)
}

/// Fill in derived fields that the row lacks.  A derived field is only
/// produced when its first source field is present; absent later sources are
/// skipped.
pub fn apply_derived_fields(row: &mut Row, derived: &[DerivedField]) {
    for rule in derived {
        if row.get(&rule.field).map_or(false, |v| !v.is_null()) {
            continue;
        }
        let mut parts = rule.from.iter().map(|f| identity_value(row, f));
        let first = match parts.next() {
            Some(Some(first)) => first,
            _ => continue,
        };
        let joined = std::iter::once(first)
            .chain(parts.flatten())
            .collect::<Vec<String>>()
            .join(&rule.separator);
        row.insert(rule.field.clone(), Value::String(joined));
    }
}

/// Inject the root identity and any derived fields into every row.
pub fn prepare_rows(rows: &[Row], schema: &HierarchySchema, root_name: &str) -> Vec<Row> {
    let root_field = &schema.root_level().identity_field;
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            row.insert(root_field.clone(), Value::String(root_name.to_string()));
            apply_derived_fields(&mut row, &schema.derived_fields);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        value_to_row(v).unwrap()
    }

    #[test]
    fn csv_empty_cells_are_absent() {
        let data = "function_name,dataset_name,method\nget_fin,fin_data,\nget_cost,,QRP\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("dataset_name"), Some(&json!("fin_data")));
        assert!(rows[0].get("method").is_none());
        assert!(rows[1].get("dataset_name").is_none());
    }

    #[test]
    fn json_nulls_are_stripped() {
        let rows = parse_json(r#"[{"a": 1, "b": null}, {"a": "x"}]"#).unwrap();
        assert_eq!(rows[0].len(), 1);
        assert_eq!(identity_value(&rows[0], "a").as_deref(), Some("1"));
        assert!(parse_json(r#"{"a": 1}"#).is_err());
        assert!(parse_json("[1, 2]").is_err());
    }

    #[test]
    fn large_integer_ids_stay_distinct() {
        let rows = parse_json(
            r#"[{"id": 18446744073709551615}, {"id": 18446744073709551000}, {"id": -3.0}]"#,
        )
        .unwrap();
        let ids: Vec<String> = rows.iter().filter_map(|r| identity_value(r, "id")).collect();
        assert_eq!(ids[0], "18446744073709551615");
        assert_ne!(ids[1], ids[0]);
        assert_ne!(ids[1], i64::MAX.to_string());
        assert_eq!(ids[2], "-3");
    }

    #[test]
    fn json_lines_skip_blanks() {
        let rows = parse_json_lines("{\"a\": 1}\n\n{\"a\": 2.0}\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(identity_value(&rows[1], "a").as_deref(), Some("2"));
    }

    #[test]
    fn derived_datapoint_ids() {
        let schema = HierarchySchema::default_lineage();
        let rows = vec![
            row(json!({"datapoint": "revenue", "function_name": "get_fin"})),
            row(json!({"datapoint": "revenue"})),
            row(json!({"datapoint": "revenue", "datapoint_id": "explicit"})),
            row(json!({"function_name": "get_fin"})),
        ];
        let prepared = prepare_rows(&rows, &schema, "Model");
        let ids: Vec<Option<String>> = prepared
            .iter()
            .map(|r| identity_value(r, "datapoint_id"))
            .collect();
        assert_eq!(
            ids,
            vec![
                Some("revenue__get_fin".to_string()),
                Some("revenue".to_string()),
                Some("explicit".to_string()),
                None,
            ]
        );
        assert!(prepared
            .iter()
            .all(|r| identity_value(r, "model_name").as_deref() == Some("Model")));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a/b.csv")), Some(InputFormat::Csv));
        assert_eq!(InputFormat::from_path(Path::new("b.ndjson")), Some(InputFormat::Jsonl));
        assert_eq!(InputFormat::from_path(Path::new("b")), None);
    }
}
