//! Data values and per-iteration loop context.
//!
//! Template data is a [`serde_json::Value`]. Mappings keep insertion order
//! (`preserve_order`), which is the order repeat expansion visits arrays in.

use serde_json::{Map, Value};

/// A data mapping bound to one render scope.
pub type DataMap = Map<String, Value>;

/// Reserved key a scalar array item is bound to inside its repeat block.
pub const THIS_KEY: &str = "this";

/// Truthiness of a data value.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy. Arrays and objects are
/// truthy even when empty.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value as text for insertion into markup.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Length of a sequence-like value: array items or string characters.
pub fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// LoopContext
// ---------------------------------------------------------------------------

/// Position metadata for one iteration of a repeat block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopContext {
    pub index: usize,
    pub length: usize,
}

impl LoopContext {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.length
    }

    pub fn is_multiple(&self) -> bool {
        self.length > 1
    }

    /// Look up a loop field by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        let v = match name {
            "length" => Value::from(self.length),
            "loop_first" => Value::Bool(self.is_first()),
            "loop_notfirst" => Value::Bool(!self.is_first()),
            "loop_last" => Value::Bool(self.is_last()),
            "loop_notlast" => Value::Bool(!self.is_last()),
            "loop_multiple" => Value::Bool(self.is_multiple()),
            _ => return None,
        };
        Some(v)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_values() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!truthy(&v), "{v} should be falsy");
        }
    }

    #[test]
    fn empty_containers_are_truthy() {
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
        assert!(truthy(&json!("0")));
    }

    #[test]
    fn integral_floats_drop_fraction() {
        assert_eq!(to_display_string(&json!(1.0)), "1");
        assert_eq!(to_display_string(&json!(2.5)), "2.5");
        assert_eq!(to_display_string(&json!(-7)), "-7");
    }

    #[test]
    fn arrays_join_with_commas() {
        assert_eq!(to_display_string(&json!(["a", 1, true])), "a,1,true");
        assert_eq!(to_display_string(&json!(null)), "");
    }

    #[test]
    fn loop_flags_for_single_item() {
        let ctx = LoopContext::new(0, 1);
        assert_eq!(ctx.get("loop_first"), Some(json!(true)));
        assert_eq!(ctx.get("loop_last"), Some(json!(true)));
        assert_eq!(ctx.get("loop_multiple"), Some(json!(false)));
        assert_eq!(ctx.get("index"), None);
    }

    #[test]
    fn loop_flags_for_middle_item() {
        let ctx = LoopContext::new(1, 3);
        assert_eq!(ctx.get("length"), Some(json!(3)));
        assert_eq!(ctx.get("loop_notfirst"), Some(json!(true)));
        assert_eq!(ctx.get("loop_notlast"), Some(json!(true)));
        assert_eq!(ctx.get("loop_multiple"), Some(json!(true)));
    }
}
