use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::search::fields::Field;

/// Index pointer - one entry inside a keyword-index shard / 索引指针
///
/// Carries the document id plus denormalized sort values so that the plan
/// executor can order results without materializing documents.
/// 携带文档ID以及冗余的排序字段，无需加载文档即可排序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub id: u64,
    /// Member count / 成员数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc: Option<f64>,
    /// Online count / 在线数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oc: Option<f64>,
}

/// Sort values carried by pointers / 指针携带的排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSortKey {
    MemberCount,
    OnlineCount,
}

impl Pointer {
    /// Sort value, missing treated as 0 / 排序值，缺失视为0
    pub fn sort_value(&self, key: IndexSortKey) -> f64 {
        let value = match key {
            IndexSortKey::MemberCount => self.mc,
            IndexSortKey::OnlineCount => self.oc,
        };
        value.unwrap_or(0.0)
    }
}

/// Fully materialized corpus entry / 完整文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub internal_id: u64,
    #[serde(default)]
    pub data: Value,
}

impl Document {
    /// Resolve a dotted path inside `data`, treating null as absent / 按点路径取值
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_nested_val(&self.data, path)
    }
}

/// Walk a dotted path through nested objects / 沿点路径读取嵌套值
pub fn get_nested_val<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Sort direction / 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Active sort / 当前排序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: Field,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: Field, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Pointer field that can sort this key without documents / 可由索引直接排序的字段
    pub fn index_key(&self) -> Option<IndexSortKey> {
        self.key.index_sort_key()
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new(Field::MemberCount, SortDirection::Desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pointer_deserialize() {
        let p: Pointer = serde_json::from_value(json!({"id": 5, "mc": 100, "oc": null})).unwrap();
        assert_eq!(p.id, 5);
        assert_eq!(p.sort_value(IndexSortKey::MemberCount), 100.0);
        assert_eq!(p.sort_value(IndexSortKey::OnlineCount), 0.0);
    }

    #[test]
    fn test_get_nested_val() {
        let doc = Document {
            internal_id: 1,
            data: json!({"guild": {"name": "Hub", "nsfw": false, "icon": null}}),
        };
        assert_eq!(doc.get("guild.name"), Some(&json!("Hub")));
        assert_eq!(doc.get("guild.nsfw"), Some(&json!(false)));
        assert_eq!(doc.get("guild.icon"), None);
        assert_eq!(doc.get("guild.name.inner"), None);
        assert_eq!(doc.get("profile.tag"), None);
    }

    #[test]
    fn test_sort_direction_toggle() {
        assert_eq!(SortDirection::Asc.toggled(), SortDirection::Desc);
        assert_eq!(SortDirection::Desc.toggled(), SortDirection::Asc);
    }
}
