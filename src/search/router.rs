//! Shard router - (field, value | id) to shard URLs / 分片路由
//!
//! Pure functions over the manifest. Every URL produced here carries the
//! manifest's cache-busting version.
//! 纯函数，所有地址都带有清单的缓存版本参数。

use crate::manifest::{DataShardEntry, Manifest};

use super::fields::Field;

/// Characters of a value used as the shard file name / 分片键长度
pub const SHARD_PREFIX_LENGTH: usize = 2;

/// Shard key: first two characters, or `_` for shorter values / 分片键
pub fn shard_key(value: &str) -> String {
    if value.chars().count() >= SHARD_PREFIX_LENGTH {
        value.chars().take(SHARD_PREFIX_LENGTH).collect()
    } else {
        "_".to_string()
    }
}

pub struct ShardRouter<'a> {
    manifest: &'a Manifest,
}

impl<'a> ShardRouter<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest }
    }

    /// Repository root for shard number `repo` / 仓库根地址
    pub fn repo_url(&self, repo: u32) -> String {
        format!(
            "{}{}",
            self.manifest.repo_base_url,
            self.manifest.repo_name_template.replace("{}", &repo.to_string())
        )
    }

    fn index_path(&self, repo: u32, field: Field, value: &str) -> String {
        let key = shard_key(value);
        let url = format!(
            "{}/index/{}/{}.json",
            self.repo_url(repo),
            field.index_dir(),
            urlencoding::encode(&key)
        );
        self.manifest.bust_cache(&url)
    }

    /// Keyword shard in the repository the manifest assigns to `field` / 字段所属仓库中的索引分片
    pub fn index_url(&self, field: Field, value: &str) -> String {
        let repo = self
            .manifest
            .index_shard_map
            .get(field.path())
            .copied()
            .unwrap_or(1);
        self.index_path(repo, field, value)
    }

    /// The same keyword shard in every repository `1..=total_shards` / 所有仓库中的同一索引分片
    ///
    /// The keyword index is replicated across all repositories, so a lookup
    /// has to read every copy and union the results.
    pub fn index_urls(&self, field: Field, value: &str) -> Vec<String> {
        (1..=self.manifest.total_shards.max(1))
            .map(|repo| self.index_path(repo, field, value))
            .collect()
    }

    /// Data shard map entry owning `id` / 文档ID所属的数据分片
    pub fn data_shard(&self, id: u64) -> Option<&'a DataShardEntry> {
        let map = &self.manifest.data_shard_map;
        map.iter().find(|entry| entry.contains(id)).or_else(|| map.first())
    }

    /// Batch file index of `id` inside its repository / 批次编号
    pub fn batch_id(&self, id: u64) -> u64 {
        let relative = match self.manifest.servers_per_shard {
            Some(span) if span > 0 => id % span,
            _ => id,
        };
        relative / self.manifest.docs_per_file.max(1)
    }

    /// Data file holding document `id` / 文档所在的数据文件
    pub fn data_url(&self, id: u64) -> String {
        let repo = self.data_shard(id).map(|entry| entry.repo).unwrap_or(1);
        let url = format!("{}/data/d_{}.json", self.repo_url(repo), self.batch_id(id));
        self.manifest.bust_cache(&url)
    }
}
