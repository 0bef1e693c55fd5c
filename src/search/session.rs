//! Search session - one user's query state / 搜索会话
//!
//! Owns the ordered id list, the pagination cursor, the active post-filters,
//! the loaded documents and the sort. Everything a search needs is reached
//! through the session; nothing is global.
//!
//! Concurrency / 并发：
//! - `fetching` and `exporting` are advisory flags, not locks. A call that
//!   finds its flag set returns immediately instead of waiting.
//! - A new search does not cancel an in-flight pagination tick or export.
//!   A tick started before the reset may still append its documents.
//! - The state mutex is never held across an `.await`.

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{AppConfig, SourceConfig};
use crate::fetch::{fetch_typed, JsonFetcher};
use crate::manifest::ManifestStore;
use crate::models::{Document, SortDirection, SortSpec};

use super::executor::PlanExecutor;
use super::federator::IndexFederator;
use super::fields::Field;
use super::filter::passes;
use super::loader::DocumentLoader;
use super::query::{parse_query, PostFilter};
use super::sort::sort_documents;

/// RAII holder of an advisory flag / 标志位守卫
///
/// Releases the flag when dropped.
/// 丢弃时自动释放。
struct FlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlagGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl<'a> Drop for FlagGuard<'a> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of one pagination tick / 分页加载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Another tick (or an export) is in flight / 正在加载中
    Busy,
    /// Cursor already at the end of the id list / 已全部加载
    Exhausted,
    Loaded {
        /// Documents that passed the post-filters / 通过过滤的文档数
        appended: usize,
        cursor: usize,
        total: usize,
    },
}

/// Result of a search / 搜索结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Empty query outside the initial load / 非初始加载的空查询
    Ignored,
    NoResults,
    Found { total: usize, batch: BatchOutcome },
}

/// What a sort toggle requires from the caller / 切换排序后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortChange {
    /// Index order changed, run the search again / 需要重新搜索
    Rerun,
    /// Loaded documents were re-sorted in place / 已在本地重新排序
    Resorted,
}

/// Progress summary / 进度摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStatus {
    pub shown: usize,
    pub total: usize,
    pub cursor: usize,
}

impl SearchStatus {
    pub fn more_available(&self) -> bool {
        self.shown < self.total
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Showing {} of {} results...", self.shown, self.total)?;
        if self.more_available() {
            write!(f, " (scroll for more)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    query: String,
    ids: Vec<u64>,
    cursor: usize,
    post_filters: Vec<PostFilter>,
    loaded: Vec<Document>,
    sort: SortSpec,
}

impl SessionState {
    /// Clear everything except the sort / 重置除排序外的全部状态
    fn reset(&mut self) {
        self.ids.clear();
        self.cursor = 0;
        self.post_filters.clear();
        self.loaded.clear();
    }
}

/// 1234567 -> "1,234,567"
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub struct SearchSession {
    fetcher: Arc<dyn JsonFetcher>,
    store: Arc<ManifestStore>,
    federator: IndexFederator,
    loader: DocumentLoader,
    source: SourceConfig,
    batch_size: usize,
    state: Mutex<SessionState>,
    fetching: AtomicBool,
    exporting: AtomicBool,
}

impl SearchSession {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, store: Arc<ManifestStore>, config: &AppConfig) -> Self {
        let key = Field::from_path(&config.search.default_sort_key).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown sort key {:?}, using {}",
                config.search.default_sort_key,
                Field::MemberCount
            );
            Field::MemberCount
        });
        let state = SessionState {
            sort: SortSpec::new(key, config.search.default_sort_direction),
            ..Default::default()
        };

        Self {
            federator: IndexFederator::new(fetcher.clone(), store.clone()),
            loader: DocumentLoader::new(fetcher.clone(), store.clone()),
            fetcher,
            store,
            source: config.source.clone(),
            batch_size: config.search.batch_size.max(1),
            state: Mutex::new(state),
            fetching: AtomicBool::new(false),
            exporting: AtomicBool::new(false),
        }
    }

    /// "Ready. N servers indexed." / 就绪提示
    pub fn ready_message(&self) -> String {
        format!(
            "Ready. {} servers indexed.",
            group_thousands(self.store.manifest().total_servers)
        )
    }

    pub fn sort(&self) -> SortSpec {
        self.state.lock().sort
    }

    /// Snapshot of the loaded documents / 已加载文档的快照
    pub fn documents(&self) -> Vec<Document> {
        self.state.lock().loaded.clone()
    }

    pub fn status(&self) -> SearchStatus {
        let state = self.state.lock();
        SearchStatus {
            shown: state.loaded.len(),
            total: state.ids.len(),
            cursor: state.cursor,
        }
    }

    /// Run a query and load its first batch / 执行查询并加载第一批
    ///
    /// An empty query browses the popularity listing, but only on the initial
    /// load; later empty queries are ignored.
    pub async fn search(&self, query: &str, initial: bool) -> SearchOutcome {
        let query = query.trim();
        if query.is_empty() && !initial {
            return SearchOutcome::Ignored;
        }

        let sort = {
            let mut state = self.state.lock();
            state.reset();
            state.query = query.to_string();
            state.sort
        };
        // 重置时释放加载标志，不取消正在进行的加载
        self.fetching.store(false, Ordering::Release);

        let ids = if query.is_empty() {
            tracing::info!("Loading most popular servers");
            self.browse_listing().await
        } else {
            let plan = parse_query(query);
            let ids = PlanExecutor::new(&self.federator).execute(&plan, &sort).await;
            if ids.is_empty() {
                tracing::info!("No results for {:?}", query);
                return SearchOutcome::NoResults;
            }
            tracing::info!("Found {} potential servers for {:?}", ids.len(), query);
            self.state.lock().post_filters = plan.post_filters;
            ids
        };

        let total = ids.len();
        self.state.lock().ids = ids;
        let batch = self.fetch_batch().await;
        SearchOutcome::Found { total, batch }
    }

    /// Search again with the last query / 用上次的查询重新搜索
    pub async fn rerun(&self) -> SearchOutcome {
        let query = self.state.lock().query.clone();
        let initial = query.is_empty();
        self.search(&query, initial).await
    }

    async fn browse_listing(&self) -> Vec<u64> {
        let url = self
            .store
            .manifest()
            .bust_cache(&self.source.root_resource(&self.source.sorted_ids_file));
        fetch_typed::<Vec<u64>>(self.fetcher.as_ref(), &url)
            .await
            .unwrap_or_default()
    }

    /// Next pagination tick, skipped while an export runs / 加载下一批
    pub async fn load_next_batch(&self) -> BatchOutcome {
        if self.exporting.load(Ordering::Acquire) {
            return BatchOutcome::Busy;
        }
        self.fetch_batch().await
    }

    async fn fetch_batch(&self) -> BatchOutcome {
        let Some(_guard) = FlagGuard::try_acquire(&self.fetching) else {
            return BatchOutcome::Busy;
        };

        let (batch, cursor, total) = {
            let mut state = self.state.lock();
            let total = state.ids.len();
            if state.cursor >= total {
                return BatchOutcome::Exhausted;
            }
            let end = (state.cursor + self.batch_size).min(total);
            let batch = state.ids[state.cursor..end].to_vec();
            // Advances even if some ids fail to load / 无论加载成功与否游标都前进
            state.cursor = end;
            (batch, end, total)
        };

        let docs = self.loader.load(&batch).await;

        let mut state = self.state.lock();
        let passing: Vec<Document> = docs
            .into_iter()
            .filter(|doc| passes(doc, &state.post_filters))
            .collect();
        let appended = passing.len();
        state.loaded.extend(passing);

        let sort = state.sort;
        if sort.index_key().is_none() {
            sort_documents(&mut state.loaded, &sort);
        }

        tracing::debug!(
            "Batch of {} id(s): {} appended, cursor {}/{}",
            batch.len(),
            appended,
            cursor,
            total
        );
        BatchOutcome::Loaded {
            appended,
            cursor,
            total,
        }
    }

    /// Change the sort key, or flip the direction of the current one / 切换排序
    pub fn toggle_sort(&self, key: Field) -> SortChange {
        let mut state = self.state.lock();
        let previous = state.sort;

        state.sort = if previous.key == key {
            SortSpec::new(key, previous.direction.toggled())
        } else {
            SortSpec::new(key, SortDirection::Desc)
        };

        if previous.index_key().is_some() || state.sort.index_key().is_some() {
            return SortChange::Rerun;
        }
        let sort = state.sort;
        sort_documents(&mut state.loaded, &sort);
        SortChange::Resorted
    }

    /// Every matching document, post-filtered and sorted / 导出全部结果
    ///
    /// Returns `None` when an export is already running or there is nothing
    /// to export.
    pub async fn export(&self) -> Option<Vec<Document>> {
        let _guard = FlagGuard::try_acquire(&self.exporting)?;

        let (ids, filters, sort) = {
            let state = self.state.lock();
            if state.ids.is_empty() {
                return None;
            }
            (state.ids.clone(), state.post_filters.clone(), state.sort)
        };

        tracing::info!("Fetching all {} results for export", ids.len());
        let mut docs: Vec<Document> = self
            .loader
            .load(&ids)
            .await
            .into_iter()
            .filter(|doc| passes(doc, &filters))
            .collect();
        sort_documents(&mut docs, &sort);

        tracing::info!("Exporting {} document(s)", docs.len());
        Some(docs)
    }

    /// Field values of the loaded documents, for display / 已加载文档的字段值
    pub fn column(&self, field: Field) -> Vec<Option<Value>> {
        self.state
            .lock()
            .loaded
            .iter()
            .map(|doc| doc.get(field.path()).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::manifest::tests::sample_manifest;
    use crate::search::federator::tests::put_keyword;
    use crate::search::loader::tests::put_documents;
    use serde_json::json;

    fn setup() -> (Arc<MockFetcher>, Arc<ManifestStore>, SearchSession) {
        let fetcher = Arc::new(MockFetcher::new());
        let store = Arc::new(ManifestStore::new(sample_manifest(), None));
        let session = SearchSession::new(fetcher.clone(), store.clone(), &AppConfig::default());
        (fetcher, store, session)
    }

    fn listing_url(store: &ManifestStore) -> String {
        let source = SourceConfig::default();
        store
            .manifest()
            .bust_cache(&source.root_resource(&source.sorted_ids_file))
    }

    fn ids(docs: &[Document]) -> Vec<u64> {
        docs.iter().map(|d| d.internal_id).collect()
    }

    /// 45 ids in the listing, all in one data file
    fn browse_setup() -> (Arc<MockFetcher>, SearchSession) {
        let (fetcher, store, session) = setup();
        let all: Vec<u64> = (0..45).collect();
        fetcher.insert(listing_url(&store), json!(all));
        let docs: Vec<(u64, &str, u64)> = all.iter().map(|id| (*id, "server", 1000 - id)).collect();
        put_documents(&fetcher, &store, &docs);
        (fetcher, session)
    }

    #[tokio::test]
    async fn test_pagination_ticks() {
        let (_, session) = browse_setup();

        let outcome = session.search("", true).await;
        assert_eq!(
            outcome,
            SearchOutcome::Found {
                total: 45,
                batch: BatchOutcome::Loaded {
                    appended: 20,
                    cursor: 20,
                    total: 45
                }
            }
        );
        assert_eq!(
            session.load_next_batch().await,
            BatchOutcome::Loaded {
                appended: 20,
                cursor: 40,
                total: 45
            }
        );
        assert_eq!(
            session.load_next_batch().await,
            BatchOutcome::Loaded {
                appended: 5,
                cursor: 45,
                total: 45
            }
        );
        assert_eq!(session.load_next_batch().await, BatchOutcome::Exhausted);

        let status = session.status();
        assert_eq!(status.cursor, 45);
        assert_eq!(status.shown, 45);
        assert!(!status.more_available());
        assert_eq!(status.to_string(), "Showing 45 of 45 results...");
        assert_eq!(ids(&session.documents())[..3], [0, 1, 2]);
    }

    #[tokio::test]
    async fn test_busy_guard_makes_tick_a_no_op() {
        let (fetcher, session) = browse_setup();
        session.search("", true).await;
        let before = fetcher.requests().len();

        {
            let _held = FlagGuard::try_acquire(&session.fetching).unwrap();
            assert_eq!(session.load_next_batch().await, BatchOutcome::Busy);
        }
        {
            let _held = FlagGuard::try_acquire(&session.exporting).unwrap();
            assert_eq!(session.load_next_batch().await, BatchOutcome::Busy);
            assert!(session.export().await.is_none());
        }
        assert_eq!(fetcher.requests().len(), before);
        assert_eq!(session.status().cursor, 20);

        // 守卫释放后可以继续加载
        assert!(matches!(
            session.load_next_batch().await,
            BatchOutcome::Loaded { cursor: 40, .. }
        ));
    }

    #[test]
    fn test_flag_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let g1 = FlagGuard::try_acquire(&flag);
        assert!(g1.is_some());
        assert!(FlagGuard::try_acquire(&flag).is_none());
        drop(g1);
        assert!(FlagGuard::try_acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn test_empty_query_ignored_after_initial_load() {
        let (fetcher, session) = browse_setup();
        assert_eq!(session.search("   ", false).await, SearchOutcome::Ignored);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_listing_browses_nothing() {
        let (_, _, session) = setup();
        assert_eq!(
            session.search("", true).await,
            SearchOutcome::Found {
                total: 0,
                batch: BatchOutcome::Exhausted
            }
        );
    }

    #[tokio::test]
    async fn test_query_search_orders_by_index() {
        let (fetcher, store, session) = setup();
        put_keyword(&fetcher, &store, 1, Field::ProfileTag, "anime", &[1, 2, 3]);
        put_documents(&fetcher, &store, &[(1, "one", 10), (2, "two", 20), (3, "three", 30)]);

        let outcome = session.search("tag:anime", false).await;
        assert!(matches!(outcome, SearchOutcome::Found { total: 3, .. }));
        assert_eq!(ids(&session.documents()), vec![3, 2, 1]);

        assert_eq!(session.search("tag:nothing", false).await, SearchOutcome::NoResults);
        assert!(session.documents().is_empty());
    }

    #[tokio::test]
    async fn test_post_filtered_documents_still_advance_cursor() {
        let (fetcher, store, session) = setup();
        put_keyword(&fetcher, &store, 1, Field::ProfileTag, "anime", &[1, 2]);
        put_documents(&fetcher, &store, &[(1, "one", 10), (2, "two", 20)]);

        let outcome = session.search("tag:anime has:guild.icon", false).await;
        assert_eq!(
            outcome,
            SearchOutcome::Found {
                total: 2,
                batch: BatchOutcome::Loaded {
                    appended: 0,
                    cursor: 2,
                    total: 2
                }
            }
        );
        assert_eq!(session.status().to_string(), "Showing 0 of 2 results... (scroll for more)");
        assert_eq!(session.load_next_batch().await, BatchOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_toggle_sort() {
        let (fetcher, store, session) = setup();
        put_keyword(&fetcher, &store, 1, Field::ProfileTag, "anime", &[1, 2, 3]);
        put_documents(&fetcher, &store, &[(1, "bravo", 10), (2, "alpha", 20), (3, "charlie", 30)]);
        session.search("tag:anime", false).await;

        assert_eq!(session.toggle_sort(Field::MemberCount), SortChange::Rerun);
        assert_eq!(session.sort(), SortSpec::new(Field::MemberCount, SortDirection::Asc));
        session.rerun().await;
        assert_eq!(ids(&session.documents()), vec![1, 2, 3]);

        // 从索引字段切走也需要重新搜索
        assert_eq!(session.toggle_sort(Field::GuildName), SortChange::Rerun);
        assert_eq!(session.sort(), SortSpec::new(Field::GuildName, SortDirection::Desc));
        session.rerun().await;
        assert_eq!(ids(&session.documents()), vec![3, 1, 2]);

        assert_eq!(session.toggle_sort(Field::GuildName), SortChange::Resorted);
        assert_eq!(ids(&session.documents()), vec![2, 1, 3]);
        assert_eq!(
            session.column(Field::GuildName),
            vec![Some(json!("alpha")), Some(json!("bravo")), Some(json!("charlie"))]
        );
    }

    #[tokio::test]
    async fn test_export_fetches_everything_once() {
        let (fetcher, session) = browse_setup();
        session.search("", true).await;
        let before = fetcher.requests().len();

        let exported = session.export().await.unwrap();
        assert_eq!(exported.len(), 45);
        // 45 个ID都在同一个数据文件中
        assert_eq!(fetcher.requests().len(), before + 1);
        // 按成员数降序
        assert_eq!(exported[0].internal_id, 0);
        assert_eq!(exported[44].internal_id, 44);
        // 导出不改变分页状态
        assert_eq!(session.status().cursor, 20);
    }

    #[tokio::test]
    async fn test_export_without_results() {
        let (_, _, session) = setup();
        assert!(session.export().await.is_none());
    }

    #[tokio::test]
    async fn test_new_search_resets_state() {
        let (fetcher, store, session) = setup();
        put_keyword(&fetcher, &store, 1, Field::ProfileTag, "anime", &[1, 2]);
        put_keyword(&fetcher, &store, 1, Field::ProfileTag, "music", &[7]);
        put_documents(&fetcher, &store, &[(1, "one", 10), (2, "two", 20), (7, "seven", 70)]);

        session.search("tag:anime has:guild.name", false).await;
        assert_eq!(session.documents().len(), 2);

        session.search("tag:music", false).await;
        assert_eq!(ids(&session.documents()), vec![7]);
        let status = session.status();
        assert_eq!((status.shown, status.total, status.cursor), (1, 1, 1));
    }

    #[test]
    fn test_ready_message() {
        let (_, _, session) = setup();
        assert_eq!(session.ready_message(), "Ready. 1,200 servers indexed.");
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }
}
