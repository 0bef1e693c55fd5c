//! Document loader - batched reads of data shard files / 文档加载
//!
//! Ids are grouped by the data file that holds them, every distinct file is
//! read exactly once, and the documents come back in request order. Ids whose
//! file failed or that are absent from their file are skipped.
//! 按数据文件分组读取，每个文件只读一次，结果保持请求顺序。

use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::fetch::{fetch_or_none, JsonFetcher};
use crate::manifest::ManifestStore;
use crate::models::Document;

use super::router::ShardRouter;

pub struct DocumentLoader {
    fetcher: Arc<dyn JsonFetcher>,
    store: Arc<ManifestStore>,
}

impl DocumentLoader {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, store: Arc<ManifestStore>) -> Self {
        Self { fetcher, store }
    }

    /// Distinct data files for `ids`, in first-seen order / 去重后的数据文件地址
    pub fn data_urls(&self, ids: &[u64]) -> Vec<String> {
        let router = ShardRouter::new(self.store.manifest());
        let mut seen = HashSet::new();
        ids.iter()
            .map(|id| router.data_url(*id))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    /// Load documents for `ids` in request order / 按请求顺序加载文档
    pub async fn load(&self, ids: &[u64]) -> Vec<Document> {
        if ids.is_empty() {
            return Vec::new();
        }

        let urls = self.data_urls(ids);
        tracing::debug!("Loading {} document(s) from {} data file(s)", ids.len(), urls.len());

        let chunks = join_all(urls.iter().map(|url| fetch_or_none(self.fetcher.as_ref(), url))).await;

        let mut by_id: HashMap<u64, Document> = HashMap::new();
        for chunk in chunks.into_iter().flatten() {
            let Value::Array(items) = chunk else {
                tracing::warn!("Data file is not a list, skipping");
                continue;
            };
            for item in items {
                match Document::deserialize(&item) {
                    Ok(doc) => {
                        by_id.insert(doc.internal_id, doc);
                    }
                    Err(e) => tracing::debug!("Skipping malformed document: {}", e),
                }
            }
        }

        // 同一ID重复请求时每次都返回一份
        ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
    }
}
