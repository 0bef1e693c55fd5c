//! Search module - federated query engine over the sharded index / 搜索模块
//!
//! Pipeline / 流程：
//! - `query`: DSL text -> `QueryPlan`
//! - `federator` + `router`: each condition -> pointers, read from every shard
//! - `executor`: OR of AND-groups -> ordered ids
//! - `loader` + `filter` + `sort`: ids -> documents, in batches
//! - `session`: search / pagination / export state for one user

pub mod executor;
pub mod federator;
pub mod fields;
pub mod filter;
pub mod loader;
pub mod query;
pub mod router;
pub mod session;
pub mod sort;
pub mod tokenizer;

pub use executor::PlanExecutor;
pub use fields::Field;
pub use query::{parse_query, Condition, QueryPlan};
pub use session::{BatchOutcome, SearchOutcome, SearchSession, SearchStatus, SortChange};
