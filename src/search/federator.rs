//! Index federator - resolve one condition into a pointer list / 索引联邦查询
//!
//! Keyword lookups read the same shard file from every repository in parallel
//! and union whatever came back. A shard that cannot be read contributes
//! nothing; it never fails the lookup.
//! 关键词查询并行读取所有仓库中的同一分片文件并合并，读取失败的分片视为空。

use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;

use crate::fetch::{fetch_or_none, JsonFetcher};
use crate::manifest::ManifestStore;
use crate::models::Pointer;

use super::fields::{Field, DEFAULT_TEXT_FIELDS};
use super::query::Condition;
use super::router::ShardRouter;

pub struct IndexFederator {
    fetcher: Arc<dyn JsonFetcher>,
    store: Arc<ManifestStore>,
}

impl IndexFederator {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, store: Arc<ManifestStore>) -> Self {
        Self { fetcher, store }
    }

    /// Resolve a condition into pointers, ignoring its negation flag / 解析条件为指针列表
    ///
    /// Duplicates are kept; set semantics are applied by the plan executor.
    pub async fn resolve(&self, condition: &Condition) -> Vec<Pointer> {
        if matches!(condition, Condition::PostFilter(_)) {
            return Vec::new();
        }

        if condition.field() == Field::Default {
            // Free text fans out over the text fields / 全文条件扩散到各文本字段
            let per_field: Vec<Condition> = DEFAULT_TEXT_FIELDS
                .iter()
                .map(|field| condition.with_field(*field))
                .collect();
            let lists = join_all(per_field.iter().map(|c| self.resolve_on_field(c))).await;
            return lists.into_iter().flatten().collect();
        }

        self.resolve_on_field(condition).await
    }

    async fn resolve_on_field(&self, condition: &Condition) -> Vec<Pointer> {
        match condition {
            Condition::Keyword { field, val, .. } => self.lookup_keyword(*field, val).await,
            Condition::Numeric { field, op, val, .. } => {
                let target = *val;
                self.lookup_numeric(*field, |v| op.matches(v, target)).await
            }
            Condition::NumericRange {
                field, start, end, ..
            } => {
                let (start, end) = (*start, *end);
                self.lookup_numeric(*field, |v| v >= start && v <= end).await
            }
            Condition::PostFilter(_) => Vec::new(),
        }
    }

    /// Range queries are a union of exact-value lookups / 数值查询 = 精确值查询的并集
    async fn lookup_numeric<P>(&self, field: Field, predicate: P) -> Vec<Pointer>
    where
        P: Fn(f64) -> bool,
    {
        let Some(values) = self.store.numeric().and_then(|m| m.values(field.path())) else {
            return Vec::new();
        };

        let keys: Vec<String> = values
            .iter()
            .copied()
            .filter(|v| predicate(*v))
            .map(|v| v.to_string())
            .collect();
        tracing::debug!("Numeric condition on {} expands to {} value(s)", field, keys.len());

        let lists = join_all(keys.iter().map(|key| self.lookup_keyword(field, key))).await;
        lists.into_iter().flatten().collect()
    }

    /// Federated read of one keyword across all repositories / 跨仓库读取单个关键词
    pub async fn lookup_keyword(&self, field: Field, value: &str) -> Vec<Pointer> {
        let router = ShardRouter::new(self.store.manifest());
        let urls = router.index_urls(field, value);

        let shards = join_all(urls.iter().map(|url| fetch_or_none(self.fetcher.as_ref(), url))).await;

        let mut combined = Vec::new();
        for shard in shards.into_iter().flatten() {
            let Some(entries) = shard.get(value).and_then(|v| v.as_array()) else {
                continue;
            };
            for entry in entries {
                match Pointer::deserialize(entry) {
                    Ok(pointer) => combined.push(pointer),
                    Err(e) => tracing::debug!("Skipping malformed pointer in {}:{}: {}", field, value, e),
                }
            }
        }

        tracing::debug!(
            "Keyword {}:{} -> {} pointer(s) from {} shard(s)",
            field,
            value,
            combined.len(),
            urls.len()
        );
        combined
    }
}
