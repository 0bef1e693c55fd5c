//! Application configuration module / 应用配置模块
//!
//! Manages configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QueryError, QueryResult};
use crate::models::SortDirection;

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the manifests live / 清单位置
    #[serde(default)]
    pub source: SourceConfig,
    /// HTTP client configuration / HTTP 客户端配置
    #[serde(default)]
    pub http: HttpConfig,
    /// Search configuration / 搜索配置
    #[serde(default)]
    pub search: SearchConfig,
}

/// Source configuration / 数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root URL holding manifest.json and friends (no trailing slash) / 根地址
    pub root_url: String,
    /// Shard/routing manifest file name / 路由清单文件名
    pub manifest_file: String,
    /// Numeric-value manifest file name / 数值清单文件名
    pub numeric_manifest_file: String,
    /// Popularity-sorted id listing used when browsing / 按人气排序的ID列表
    pub sorted_ids_file: String,
}

/// HTTP configuration / HTTP 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds / 请求超时（秒）
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Ids per pagination tick / 每次分页加载的ID数量
    pub batch_size: usize,
    /// Initial sort field path / 初始排序字段
    pub default_sort_key: String,
    pub default_sort_direction: SortDirection,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root_url: ".".to_string(),
            manifest_file: "manifest.json".to_string(),
            numeric_manifest_file: "numeric_manifest.json".to_string(),
            sorted_ids_file: "all_servers_sorted_by_members.json".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("pdsl-query/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            default_sort_key: "profile.member_count".to_string(),
            default_sort_direction: SortDirection::Desc,
        }
    }
}

impl SourceConfig {
    /// Absolute URL of a root-level resource / 根目录资源的完整地址
    pub fn root_resource(&self, file: &str) -> String {
        format!("{}/{}", self.root_url.trim_end_matches('/'), file)
    }
}

/// Get the config file path / 获取配置文件路径
///
/// `PDSL_CONFIG` overrides the default `./config.json`.
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PDSL_CONFIG") {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config(config_path: &Path) -> QueryResult<AppConfig> {
    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| QueryError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| QueryError::Config(format!("Failed to parse config file: {}", e)))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };

    // Environment override / 环境变量覆盖
    if let Ok(root) = std::env::var("PDSL_ROOT_URL") {
        config.source.root_url = root;
    }

    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> QueryResult<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| QueryError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(config_path, content)
        .map_err(|e| QueryError::Config(format!("Failed to write config file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.search.batch_size, 20);
        assert_eq!(config.search.default_sort_key, "profile.member_count");
        assert_eq!(config.search.default_sort_direction, SortDirection::Desc);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"http": {"timeout_secs": 5, "user_agent": "ua"}}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.source.manifest_file, "manifest.json");
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_config(&path), Err(QueryError::Config(_))));
    }

    #[test]
    fn test_root_resource() {
        let source = SourceConfig {
            root_url: "https://example.org/pdsl/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            source.root_resource("manifest.json"),
            "https://example.org/pdsl/manifest.json"
        );
    }
}
