//! Post-filter engine - predicates over materialized documents / 后置过滤
//!
//! Phrase and presence checks cannot be answered by the keyword index, so they
//! run against each loaded document. All filters must pass.

use serde_json::Value;

use crate::models::Document;

use super::fields::Field;
use super::query::{PostFilter, PostFilterOp};

/// Text searched by a phrase on the `default` field / 全文短语的检索文本
fn default_haystack(doc: &Document) -> String {
    let text = |path: &str| doc.get(path).and_then(Value::as_str).unwrap_or("").to_string();

    let mut parts = vec![
        text(Field::GuildName.path()),
        text(Field::GuildDescription.path()),
        text(Field::ProfileTag.path()),
    ];
    if let Some(traits) = doc.get(Field::ProfileTraits.path()).and_then(Value::as_array) {
        parts.extend(
            traits
                .iter()
                .map(|t| t.get("label").and_then(Value::as_str).unwrap_or("").to_string()),
        );
    }
    parts.join(" ").to_lowercase()
}

fn haystack(doc: &Document, field: Field) -> String {
    if field == Field::Default {
        return default_haystack(doc);
    }
    // 非字符串字段视为空文本
    doc.get(field.path())
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase()
}

/// Present = not null, not "", not an empty array / 字段是否存在
///
/// `false` and `0` count as present.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Evaluate one filter, negation included / 计算单个过滤条件
pub fn evaluate(doc: &Document, filter: &PostFilter) -> bool {
    let result = match filter.op {
        PostFilterOp::Phrase => {
            let needle = filter.value.as_deref().unwrap_or("").to_lowercase();
            haystack(doc, filter.field).contains(&needle)
        }
        PostFilterOp::Has => is_present(doc.get(filter.field.path())),
        PostFilterOp::Missing => !is_present(doc.get(filter.field.path())),
    };
    result != filter.negated
}

/// AND of every filter; no filters means pass / 所有过滤条件均需通过
pub fn passes(doc: &Document, filters: &[PostFilter]) -> bool {
    filters.iter().all(|filter| evaluate(doc, filter))
}
