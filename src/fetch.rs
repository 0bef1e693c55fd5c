//! Resource fetching - "GET a versioned JSON resource" / 资源获取
//!
//! The engine only ever needs one transport primitive: fetch a URL and parse
//! the body as JSON. Everything else (caching, retries) is out of scope.
//! 引擎只需要一个传输原语：获取 URL 并解析为 JSON。

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::HttpConfig;

/// JSON fetcher abstraction / JSON 获取抽象
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// Fetch `url` and parse the body as JSON / 获取并解析 JSON
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// HTTP fetcher backed by reqwest / 基于 reqwest 的 HTTP 获取器
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("Request failed: status={}", status.as_u16()));
        }

        let value: Value = resp.json().await?;
        Ok(value)
    }
}

/// Fetch and fold any failure into `None` / 获取失败时返回 None
///
/// Network errors, non-2xx statuses and parse failures all mean "no data from
/// this source". The failure is logged and never propagated.
pub async fn fetch_or_none(fetcher: &dyn JsonFetcher, url: &str) -> Option<Value> {
    match fetcher.get_json(url).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Fetch error for {}: {}", url, e);
            None
        }
    }
}

/// Fetch and deserialize into `T`, folding failures into `None` / 获取并反序列化
pub async fn fetch_typed<T: DeserializeOwned>(fetcher: &dyn JsonFetcher, url: &str) -> Option<T> {
    let value = fetch_or_none(fetcher, url).await?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Unexpected JSON shape from {}: {}", url, e);
            None
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory fetcher for tests / 测试用内存获取器
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    pub struct MockFetcher {
        resources: Mutex<HashMap<String, Value>>,
        failing: Mutex<HashSet<String>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, url: impl Into<String>, value: Value) {
            self.resources.lock().insert(url.into(), value);
        }

        /// Registered resource, without recording a request
        pub fn resource(&self, url: &str) -> Option<Value> {
            self.resources.lock().get(url).cloned()
        }

        /// Make `url` fail even if a resource is registered
        pub fn fail(&self, url: impl Into<String>) {
            self.failing.lock().insert(url.into());
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests.lock().iter().filter(|u| u.as_str() == url).count()
        }
    }

    #[async_trait]
    impl JsonFetcher for MockFetcher {
        async fn get_json(&self, url: &str) -> Result<Value> {
            self.requests.lock().push(url.to_string());
            // 让出一次调度，模拟真实的网络等待
            tokio::task::yield_now().await;

            if self.failing.lock().contains(url) {
                return Err(anyhow!("connection reset"));
            }
            self.resources
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("Request failed: status=404"))
        }
    }
}
