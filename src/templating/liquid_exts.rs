use liquid_core::Result;
use liquid_core::Runtime;
use liquid_core::{Display_filter, Filter, FilterReflection, ParseFilter};
use liquid_core::{Value, ValueView};
use regex::{Captures, Regex};

/// Serialize to compact JSON that is safe to inline inside a `<script>`
/// element: `<`, `>` and `&` (plus the JS line separators) become `\uXXXX`
/// escapes, which any JSON parser reads back unchanged.
pub fn script_safe_json(json: &str) -> String {
    lazy_static! {
        static ref RE_SCRIPT_UNSAFE: Regex = Regex::new("[<>&\u{2028}\u{2029}]").unwrap();
    }
    RE_SCRIPT_UNSAFE
        .replace_all(json, |caps: &Captures| {
            let c = caps[0].chars().next().unwrap_or_default();
            format!("\\u{:04x}", c as u32)
        })
        .into_owned()
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "script_json",
    description = "Render the provided object as JSON safe to embed in a script element.",
    parsed(ScriptJsonFilter)
)]
pub struct ScriptJsonFilterParser;

#[derive(Debug, Default, Display_filter)]
#[name = "script_json"]
struct ScriptJsonFilter;

impl Filter for ScriptJsonFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> Result<Value> {
        let json = serde_json::to_string(&input.to_value())
            .map_err(|e| liquid_core::Error::with_msg(e.to_string()))?;
        Ok(Value::scalar(script_safe_json(&json)))
    }
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "css_length",
    description = "Pass through a plain CSS length like `800px` or `90vh`, otherwise `800px`.",
    parsed(CssLengthFilter)
)]
pub struct CssLengthFilterParser;

#[derive(Debug, Default, Display_filter)]
#[name = "css_length"]
struct CssLengthFilter;

impl Filter for CssLengthFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> Result<Value> {
        lazy_static! {
            static ref RE_CSS_LENGTH: Regex =
                Regex::new(r"^\d+(\.\d+)?(px|%|vh|vw|em|rem)$").unwrap();
        }

        let s = input.to_kstr();
        let trimmed = s.trim();
        if RE_CSS_LENGTH.is_match(trimmed) {
            Ok(Value::scalar(trimmed.to_string()))
        } else {
            Ok(Value::scalar("800px".to_string()))
        }
    }
}
