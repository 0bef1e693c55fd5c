//! Manifest store - load-once routing and numeric manifests / 清单存储
//!
//! Both documents are fetched at startup, before any query executes, and are
//! never mutated afterwards. The routing manifest is mandatory; the numeric
//! manifest is optional and its absence only disables numeric queries.
//! 两份清单在启动时加载一次，之后只读。路由清单必需，数值清单可选。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::config::SourceConfig;
use crate::error::{QueryError, QueryResult};
use crate::fetch::{fetch_or_none, fetch_typed, JsonFetcher};

/// One contiguous id range stored in a repository / 数据分片映射条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataShardEntry {
    pub start_id: u64,
    /// Open-ended when absent / 缺省表示无上界
    #[serde(default)]
    pub end_id: Option<u64>,
    pub repo: u32,
}

impl DataShardEntry {
    pub fn contains(&self, id: u64) -> bool {
        self.start_id <= id && self.end_id.map_or(true, |end| end >= id)
    }
}

/// Shard/routing manifest / 分片路由清单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub total_servers: u64,
    /// Number of repositories the keyword index is replicated across / 索引复制的仓库数
    #[serde(default = "default_total_shards")]
    pub total_shards: u32,
    pub repo_base_url: String,
    /// Repository path with a `{}` placeholder for the shard number / 仓库名模板
    pub repo_name_template: String,
    #[serde(default)]
    pub index_shard_map: HashMap<String, u32>,
    #[serde(default)]
    pub data_shard_map: Vec<DataShardEntry>,
    /// Id span of one data repository; absent means a single repository / 单仓库文档数
    #[serde(default)]
    pub servers_per_shard: Option<u64>,
    pub docs_per_file: u64,
    #[serde(default)]
    pub last_updated: Option<Value>,
}

fn default_total_shards() -> u32 {
    1
}

impl Manifest {
    /// Version token appended to every shard URL / 缓存版本号
    pub fn cache_token(&self) -> Option<String> {
        match self.last_updated.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Append the cache-busting parameter when the manifest carries a version / 追加缓存参数
    pub fn bust_cache(&self, url: &str) -> String {
        match self.cache_token() {
            Some(token) => format!("{}?v={}", url, token),
            None => url.to_string(),
        }
    }
}

/// Distinct numeric values per field / 每个数值字段的全部取值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericManifest {
    values: HashMap<String, Vec<f64>>,
}

impl NumericManifest {
    pub fn new(values: HashMap<String, Vec<f64>>) -> Self {
        Self { values }
    }

    pub fn values(&self, field: &str) -> Option<&[f64]> {
        self.values.get(field).map(|v| v.as_slice())
    }
}

/// Process-wide, load-once manifest pair / 进程级只读清单
#[derive(Debug, Clone)]
pub struct ManifestStore {
    manifest: Manifest,
    numeric: Option<NumericManifest>,
}

impl ManifestStore {
    pub fn new(manifest: Manifest, numeric: Option<NumericManifest>) -> Self {
        Self { manifest, numeric }
    }

    /// Load both manifests (all-or-nothing for the routing manifest) / 加载清单
    pub async fn load(fetcher: &dyn JsonFetcher, source: &SourceConfig) -> QueryResult<Self> {
        // The routing manifest is never served from cache / 路由清单始终绕过缓存
        let manifest_url = format!(
            "{}?t={}",
            source.root_resource(&source.manifest_file),
            chrono::Utc::now().timestamp_millis()
        );
        tracing::info!("Loading manifest from {}", manifest_url);

        let raw = fetch_or_none(fetcher, &manifest_url)
            .await
            .ok_or_else(|| QueryError::ManifestUnavailable("Manifest not found".to_string()))?;
        let manifest: Manifest = serde_json::from_value(raw)
            .map_err(|e| QueryError::ManifestUnavailable(format!("Invalid manifest: {}", e)))?;

        let numeric_url = manifest.bust_cache(&source.root_resource(&source.numeric_manifest_file));
        let numeric: Option<NumericManifest> = fetch_typed(fetcher, &numeric_url).await;
        if numeric.is_none() {
            tracing::warn!("Numeric manifest unavailable, numeric queries will return nothing");
        }

        tracing::info!(
            "Manifest loaded: {} servers across {} shard(s)",
            manifest.total_servers,
            manifest.total_shards
        );

        Ok(Self { manifest, numeric })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn numeric(&self) -> Option<&NumericManifest> {
        self.numeric.as_ref()
    }
}
