//! Document-side sort / 文档排序
//!
//! Used for sort keys the index pointers do not carry, and for exports.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

use crate::models::{Document, SortDirection, SortSpec};

/// Leading float literal, the way a lenient number parse reads it / 前缀浮点数
static LEADING_FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid float regex")
});

/// Display text of a field value / 字段值的文本形式
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| if item.is_null() { String::new() } else { display_text(item) })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn leading_float(text: &str) -> Option<f64> {
    let m = LEADING_FLOAT_RE.find(text)?;
    m.as_str().trim().parse::<f64>().ok()
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Compare two documents on `spec.key` / 按字段比较两个文档
///
/// Null or empty values sort last in both directions. Two numeric-looking
/// values compare as numbers, anything else as text.
pub fn compare_documents(a: &Document, b: &Document, spec: &SortSpec) -> Ordering {
    let path = spec.key.path();
    let (va, vb) = (a.get(path), b.get(path));

    match (is_blank(va), is_blank(vb)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let (ta, tb) = match (va, vb) {
        (Some(va), Some(vb)) => (display_text(va), display_text(vb)),
        _ => return Ordering::Equal,
    };

    let ordering = match (leading_float(&ta), leading_float(&tb)) {
        (Some(na), Some(nb)) => na.total_cmp(&nb),
        _ => ta.cmp(&tb),
    };

    match spec.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Stable in-place sort / 稳定排序
pub fn sort_documents(docs: &mut [Document], spec: &SortSpec) {
    docs.sort_by(|a, b| compare_documents(a, b, spec));
}
