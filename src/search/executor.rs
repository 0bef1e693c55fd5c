//! Plan executor - OR of AND-groups with group-local negation / 查询计划执行器
//!
//! Per group / 每个分组：
//! 1. resolve every positive condition concurrently / 并发解析所有正向条件
//! 2. any empty positive list empties the group / 任一正向条件为空则分组为空
//! 3. intersect by id, keeping the first list's order / 按ID求交集
//! 4. subtract each negative condition's ids / 减去否定条件的ID
//!
//! Groups are then merged first-writer-keeps: a pointer captured by an earlier
//! group is never replaced by a later group's copy of the same id.
//! 分组之间按"先写入者保留"合并。

use futures::future::join_all;
use std::collections::{HashMap, HashSet};

use crate::models::{Pointer, SortDirection, SortSpec};

use super::federator::IndexFederator;
use super::query::{Condition, QueryPlan};

/// Insertion-ordered id -> pointer map / 保持插入顺序的指针表
#[derive(Debug, Default)]
struct PointerMap {
    order: Vec<u64>,
    pointers: HashMap<u64, Pointer>,
}

impl PointerMap {
    /// Later duplicates replace the value but keep the first position / 重复ID保留首次位置
    fn from_pointers(list: Vec<Pointer>) -> Self {
        let mut map = PointerMap::default();
        for pointer in list {
            if !map.pointers.contains_key(&pointer.id) {
                map.order.push(pointer.id);
            }
            map.pointers.insert(pointer.id, pointer);
        }
        map
    }

    fn insert_if_absent(&mut self, pointer: Pointer) {
        if !self.pointers.contains_key(&pointer.id) {
            self.order.push(pointer.id);
            self.pointers.insert(pointer.id, pointer);
        }
    }

    fn retain<F: Fn(u64) -> bool>(&mut self, keep: F) {
        self.pointers.retain(|id, _| keep(*id));
        let pointers = &self.pointers;
        self.order.retain(|id| pointers.contains_key(id));
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn into_values(mut self) -> Vec<Pointer> {
        self.order
            .iter()
            .filter_map(|id| self.pointers.remove(id))
            .collect()
    }
}

fn id_set(pointers: &[Pointer]) -> HashSet<u64> {
    pointers.iter().map(|p| p.id).collect()
}

pub struct PlanExecutor<'a> {
    federator: &'a IndexFederator,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(federator: &'a IndexFederator) -> Self {
        Self { federator }
    }

    /// Execute a plan and return ordered ids / 执行计划，返回有序ID列表
    pub async fn execute(&self, plan: &QueryPlan, sort: &SortSpec) -> Vec<u64> {
        self.execute_pointers(plan, sort)
            .await
            .into_iter()
            .map(|p| p.id)
            .collect()
    }

    /// Execute a plan and return the merged, sorted pointers / 执行计划，返回排序后的指针
    pub async fn execute_pointers(&self, plan: &QueryPlan, sort: &SortSpec) -> Vec<Pointer> {
        let mut merged = PointerMap::default();

        for (index, group) in plan.or_groups.iter().enumerate() {
            let Some(survivors) = self.execute_group(group).await else {
                tracing::debug!("OR-group {} matched nothing", index);
                continue;
            };
            tracing::debug!("OR-group {} matched {} id(s)", index, survivors.len());

            for pointer in survivors.into_values() {
                merged.insert_if_absent(pointer);
            }
        }

        let mut pointers = merged.into_values();
        if let Some(key) = sort.index_key() {
            // Stable sort, missing values count as 0 / 稳定排序，缺失值按0处理
            pointers.sort_by(|a, b| {
                let (va, vb) = (a.sort_value(key), b.sort_value(key));
                match sort.direction {
                    SortDirection::Desc => vb.total_cmp(&va),
                    SortDirection::Asc => va.total_cmp(&vb),
                }
            });
        }
        pointers
    }

    async fn execute_group(&self, group: &[Condition]) -> Option<PointerMap> {
        let (positive, negative): (Vec<&Condition>, Vec<&Condition>) =
            group.iter().partition(|c| !c.is_negated());

        // A group cannot be negative-only / 分组不能只有否定条件
        if positive.is_empty() {
            return None;
        }

        let lists = join_all(positive.iter().map(|c| self.federator.resolve(c))).await;
        if lists.iter().any(|list| list.is_empty()) {
            return None;
        }

        let mut lists = lists.into_iter();
        let mut survivors = PointerMap::from_pointers(lists.next()?);
        for list in lists {
            let ids = id_set(&list);
            survivors.retain(|id| ids.contains(&id));
        }

        for condition in negative {
            let excluded = id_set(&self.federator.resolve(condition).await);
            if !excluded.is_empty() {
                survivors.retain(|id| !excluded.contains(&id));
            }
        }

        Some(survivors)
    }
}
