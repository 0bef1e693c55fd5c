//! Error types / 错误类型
//!
//! Only startup failures are typed here. Shard reads never produce errors for
//! the query path: a failed read is folded into "no data" at the join point.
//! 只有启动阶段的失败会在这里建模，分片读取失败一律视为"无数据"。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Manifest missing or unparseable, the service cannot start / 清单缺失或无法解析
    #[error("search manifest unavailable: {0}")]
    ManifestUnavailable(String),

    /// Configuration file could not be read or written / 配置文件读写失败
    #[error("configuration error: {0}")]
    Config(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
