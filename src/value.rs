//! Dynamic row values. Tagged variant per `spec.md` §9 ("avoid boxed
//! interfaces for hot numeric paths"); comparators and JSON writers
//! dispatch on the tag rather than going through `dyn Trait`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The declared storage kind of a column, used by the row comparator
/// (`spec.md` §4.9.1) to pick a comparison strategy independent of the
/// runtime-tagged [`DataValue`] (a column can be typed even if a given row
/// happens to carry a coercible value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Int64,
    Float,
    String,
    Json,
    StringList,
    Int64List,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DataValue {
    Int(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    Int64List(Vec<i64>),
    Json(Json),
}

impl DataValue {
    /// String projection used for stats group keys (`spec.md` §4.6) and for
    /// the header round-trip / `String`-kind comparator.
    pub fn as_group_key_part(&self) -> String {
        match self {
            DataValue::Int(i) => i.to_string(),
            DataValue::Float(f) => f.to_string(),
            DataValue::String(s) => s.clone(),
            DataValue::StringList(v) => v.join(","),
            DataValue::Int64List(v) => v.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
            DataValue::Json(j) => j.to_string(),
        }
    }

    /// Permissive numeric coercion for the Integer/Int64/Float comparator
    /// path (`spec.md` §4.9.1). Non-numeric values coerce to 0.0, matching
    /// the "permissive" wording in the spec rather than erroring.
    pub fn as_f64_lossy(&self) -> f64 {
        match self {
            DataValue::Int(i) => *i as f64,
            DataValue::Float(f) => *f,
            DataValue::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            DataValue::Json(Json::Number(n)) => n.as_f64().unwrap_or(0.0),
            DataValue::Json(Json::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            DataValue::StringList(_) | DataValue::Int64List(_) | DataValue::Json(_) => 0.0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            DataValue::Int(i) => Json::from(*i),
            DataValue::Float(f) => {
                serde_json::Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null)
            }
            DataValue::String(s) => Json::String(s.clone()),
            DataValue::StringList(v) => Json::Array(v.iter().cloned().map(Json::String).collect()),
            DataValue::Int64List(v) => Json::Array(v.iter().map(|i| Json::from(*i)).collect()),
            DataValue::Json(j) => j.clone(),
        }
    }
}

/// Compares two values under a declared [`ValueKind`], per `spec.md`
/// §4.9.1. The StringList/Int64List branch intentionally returns a constant
/// (see that section's Open Question) rather than a lexicographic order —
/// preserved as-is, not silently "fixed".
pub fn compare_by_kind(kind: ValueKind, a: &DataValue, b: &DataValue, asc: bool) -> Ordering {
    match kind {
        ValueKind::Integer | ValueKind::Int64 | ValueKind::Float => {
            let (fa, fb) = (a.as_f64_lossy(), b.as_f64_lossy());
            let ord = fa.partial_cmp(&fb).unwrap_or(Ordering::Equal);
            if asc { ord } else { ord.reverse() }
        }
        ValueKind::Json | ValueKind::String => {
            let (sa, sb) = (a.as_group_key_part(), b.as_group_key_part());
            let ord = sa.cmp(&sb);
            if asc { ord } else { ord.reverse() }
        }
        ValueKind::StringList | ValueKind::Int64List => {
            // Open question in spec.md §9: unordered by spec, the reference
            // behavior returns `direction == Asc` unconditionally. A real
            // ordering would need a defined element-wise comparison; none
            // is specified, so this is preserved as a non-ordering rather
            // than invented.
            if asc { Ordering::Less } else { Ordering::Greater }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_compare_equal_continues() {
        let a = DataValue::Int(5);
        let b = DataValue::Float(5.0);
        assert_eq!(compare_by_kind(ValueKind::Integer, &a, &b, true), Ordering::Equal);
    }

    #[test]
    fn string_compare_no_case_folding() {
        let a = DataValue::String("B".into());
        let b = DataValue::String("a".into());
        // 'B' (0x42) < 'a' (0x61) byte-wise; no case folding applied.
        assert_eq!(compare_by_kind(ValueKind::String, &a, &b, true), Ordering::Less);
    }

    #[test]
    fn list_kind_returns_direction_constant() {
        let a = DataValue::StringList(vec!["z".into()]);
        let b = DataValue::StringList(vec!["a".into()]);
        assert_eq!(compare_by_kind(ValueKind::StringList, &a, &b, true), Ordering::Less);
        assert_eq!(compare_by_kind(ValueKind::StringList, &a, &b, false), Ordering::Greater);
    }
}
