//! Filter registry and built-in filters.
//!
//! A filter is a pure function of one value. Filters are applied left to
//! right in a field reference such as `[[weight|sIfPlural]]`.
//!
//! `safe` is not a filter: the renderer treats the name as a flag that
//! turns off `<` escaping for the field, whatever the registry holds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use ptemplate_core::value::{length_of, to_display_string, truthy};

/// Reserved name that disables escaping instead of transforming the value.
pub const SAFE: &str = "safe";

/// A registered filter function.
pub type Filter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Name → filter mapping. Later insertions replace earlier ones.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Filter>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.filters.keys()).finish()
    }
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `count` and `sIfPlural`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert("count", count);
        registry.insert("sIfPlural", s_if_plural);
        registry
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Merge `other` into `self`; entries of `other` win on name clash.
    pub fn extend(&mut self, other: FilterRegistry) {
        self.filters.extend(other.filters);
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// Length of an array or string; `0` for anything without a length.
pub fn count(value: &Value) -> Value {
    if !truthy(value) {
        return Value::from(0);
    }
    Value::from(length_of(value).unwrap_or(0))
}

/// `""` when the value reads as exactly 1 or -1, otherwise `"s"`.
pub fn s_if_plural(value: &Value) -> Value {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        other => parse_float_prefix(&to_display_string(other)),
    };
    match n {
        Some(n) if n == 1.0 || n == -1.0 => Value::from(""),
        _ => Value::from("s"),
    }
}

/// Parse the longest leading decimal number of `s`, after leading
/// whitespace. `"3 apples"` reads as 3, `"apples"` as nothing.
pub(crate) fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits |= frac_end > frac_start;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(300), "s")]
    #[case(json!(1), "")]
    #[case(json!(-1), "")]
    #[case(json!(1.0), "")]
    #[case(json!(0), "s")]
    #[case(json!("1"), "")]
    #[case(json!("1 kg"), "")]
    #[case(json!("2.5"), "s")]
    #[case(json!("heavy"), "s")]
    #[case(json!(""), "s")]
    #[case(json!(true), "s")]
    fn s_if_plural_cases(#[case] input: Value, #[case] expected: &str) {
        assert_eq!(s_if_plural(&input), json!(expected));
    }

    #[rstest]
    #[case(json!([1, 2, 3]), 3)]
    #[case(json!([]), 0)]
    #[case(json!("abcd"), 4)]
    #[case(json!(""), 0)]
    #[case(json!(null), 0)]
    #[case(json!(12), 0)]
    #[case(json!({"a": 1}), 0)]
    fn count_cases(#[case] input: Value, #[case] expected: u64) {
        assert_eq!(count(&input), json!(expected));
    }

    #[rstest]
    #[case("42", Some(42.0))]
    #[case("  -3.5e2x", Some(-350.0))]
    #[case(".5", Some(0.5))]
    #[case("7.", Some(7.0))]
    #[case("1e", Some(1.0))]
    #[case("-", None)]
    #[case(".", None)]
    #[case("abc", None)]
    fn float_prefix(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_float_prefix(input), expected);
    }

    #[test]
    fn extend_overrides_builtins() {
        let mut registry = FilterRegistry::with_builtins();
        let mut extra = FilterRegistry::new();
        extra.insert("count", |_: &Value| json!("many"));
        extra.insert("upper", |v: &Value| json!(to_display_string(v).to_uppercase()));
        registry.extend(extra);

        let count = registry.get("count").expect("count");
        assert_eq!(count(&json!([1])), json!("many"));
        assert!(registry.get("upper").is_some());
        assert!(registry.get("sIfPlural").is_some());
    }

    #[test]
    fn debug_lists_names() {
        let registry = FilterRegistry::with_builtins();
        assert_eq!(format!("{registry:?}"), r#"{"count", "sIfPlural"}"#);
    }
}
