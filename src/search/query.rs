//! Query parser - query string to query plan / 查询解析器
//!
//! Grammar / 语法：
//! - `a OR b`, `a | b`: OR-groups / 或分组
//! - `word`: required free-text keyword (stemmed, stop words removed) / 全文关键词
//! - `field:value`, `-field:value`: keyword on a field, optionally negated / 字段关键词
//! - `field:>N`, `>=N`, `<N`, `<=N`: numeric comparison / 数值比较
//! - `field:A..B`: inclusive numeric range / 数值区间
//! - `"some phrase"`, `field:"some phrase"`: exact phrase, checked on documents / 短语
//! - `has:field`, `missing:field`: presence checks, checked on documents / 字段存在性
//!
//! The parser never fails. Malformed terms are dropped or reinterpreted as
//! keywords. 解析永不失败，错误的词项会被丢弃或按关键词处理。

use once_cell::sync::Lazy;
use regex::Regex;

use super::fields::Field;
use super::tokenizer::{simple_stem, tokenize};

static OR_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i) OR | \| ").expect("valid OR regex"));

/// `-`? then `field:value`, a quoted phrase, or a bare word / 词项正则
static TERM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(-)?([a-zA-Z._]+:(?:"[^"]*"|[^ ]+)|"[^"]*"|[^ ]+)"#).expect("valid term regex")
});

static COMPARISON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(>=|>|<=|<)(\d+(?:\.\d+)?)$").expect("valid comparison regex"));

/// Numeric comparison operator / 数值比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// `value <op> target` / 比较
    pub fn matches(self, value: f64, target: f64) -> bool {
        match self {
            CompareOp::Gt => value > target,
            CompareOp::Gte => value >= target,
            CompareOp::Lt => value < target,
            CompareOp::Lte => value <= target,
        }
    }
}

/// Document-side predicate kind / 后置过滤类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilterOp {
    Phrase,
    Has,
    Missing,
}

/// Predicate evaluated against materialized documents / 后置过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct PostFilter {
    pub op: PostFilterOp,
    pub field: Field,
    /// Phrase text, `None` for has/missing / 短语内容
    pub value: Option<String>,
    pub negated: bool,
}

/// Leaf condition / 查询条件
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Keyword {
        field: Field,
        val: String,
        negated: bool,
    },
    Numeric {
        field: Field,
        op: CompareOp,
        val: f64,
        negated: bool,
    },
    NumericRange {
        field: Field,
        start: f64,
        end: f64,
        negated: bool,
    },
    PostFilter(PostFilter),
}

impl Condition {
    /// Required free-text keyword / 默认字段关键词
    pub fn default_keyword(val: impl Into<String>) -> Self {
        Condition::Keyword {
            field: Field::Default,
            val: val.into(),
            negated: false,
        }
    }

    pub fn field(&self) -> Field {
        match self {
            Condition::Keyword { field, .. }
            | Condition::Numeric { field, .. }
            | Condition::NumericRange { field, .. } => *field,
            Condition::PostFilter(filter) => filter.field,
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Condition::Keyword { negated, .. }
            | Condition::Numeric { negated, .. }
            | Condition::NumericRange { negated, .. } => *negated,
            Condition::PostFilter(filter) => filter.negated,
        }
    }

    /// Same condition aimed at another field / 替换字段
    pub fn with_field(&self, field: Field) -> Condition {
        let mut cond = self.clone();
        match &mut cond {
            Condition::Keyword { field: f, .. }
            | Condition::Numeric { field: f, .. }
            | Condition::NumericRange { field: f, .. } => *f = field,
            Condition::PostFilter(filter) => filter.field = field,
        }
        cond
    }
}

/// OR of AND-groups plus global post-filters / 查询计划
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub or_groups: Vec<Vec<Condition>>,
    pub post_filters: Vec<PostFilter>,
}

impl QueryPlan {
    /// No index conditions at all, matches nothing / 空计划不匹配任何结果
    pub fn is_empty(&self) -> bool {
        self.or_groups.is_empty()
    }
}

/// Stemmed, stop-word-free keyword tokens of free text / 提取默认字段关键词
fn default_tokens(text: &str) -> Vec<Condition> {
    tokenize(text).into_iter().map(Condition::default_keyword).collect()
}

/// Strip surrounding quotes / 去掉引号
fn unquote(value: &str) -> Option<&str> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

fn parse_range(value: &str) -> Option<(f64, f64)> {
    let (start, end) = value.split_once("..")?;
    let start = start.trim().parse::<f64>().ok()?;
    let end = end.trim().parse::<f64>().ok()?;
    if start.is_finite() && end.is_finite() {
        Some((start, end))
    } else {
        None
    }
}

fn keyword(field: Field, value: &str, negated: bool) -> Condition {
    Condition::Keyword {
        field,
        val: simple_stem(&value.to_lowercase()),
        negated,
    }
}

/// Parse one OR-group into its conditions / 解析单个或分组
fn parse_group(group: &str, post_filters: &mut Vec<PostFilter>) -> Vec<Condition> {
    let mut conditions = Vec::new();

    for caps in TERM_RE.captures_iter(group) {
        let negated = caps.get(1).is_some();
        let term = match caps.get(2) {
            Some(m) => m.as_str(),
            None => continue,
        };

        // Split into (field name, raw value) / 拆分字段与值
        let (field_name, raw_value) = if term.starts_with('"') && term.ends_with('"') {
            ("default", term)
        } else if let Some((name, value)) = term.split_once(':') {
            (name, value)
        } else {
            // Bare words are always required keywords / 裸词总是必需关键词
            conditions.extend(default_tokens(term));
            continue;
        };

        let (value, quoted) = match unquote(raw_value) {
            Some(inner) => (inner, true),
            None if raw_value == "\"" => ("", true),
            None => (raw_value, false),
        };
        if value.is_empty() {
            continue;
        }

        if field_name == "has" || field_name == "missing" {
            let Some(target) = Field::resolve(value) else {
                tracing::debug!("Dropping {}:{} - unknown field", field_name, value);
                continue;
            };
            let op = if field_name == "has" {
                PostFilterOp::Has
            } else {
                PostFilterOp::Missing
            };
            post_filters.push(PostFilter {
                op,
                field: target,
                value: None,
                negated,
            });
            continue;
        }

        let Some(field) = Field::resolve(field_name) else {
            tracing::debug!("Dropping term {:?} - unknown field {:?}", term, field_name);
            continue;
        };

        if field != Field::Default && value.contains("..") {
            if let Some((start, end)) = parse_range(value) {
                conditions.push(Condition::NumericRange {
                    field,
                    start,
                    end,
                    negated,
                });
                continue;
            }
        }

        if quoted {
            // Exact phrase: prefilter by its tokens, verify on documents / 短语：先按词元预筛，再精确匹配
            post_filters.push(PostFilter {
                op: PostFilterOp::Phrase,
                field,
                value: Some(value.to_string()),
                negated,
            });
            conditions.extend(default_tokens(value));
            continue;
        }

        if let Some(caps) = COMPARISON_RE.captures(value) {
            let op = CompareOp::parse(&caps[1]);
            let target = caps[2].parse::<f64>().ok();
            if let (Some(op), Some(val)) = (op, target) {
                conditions.push(Condition::Numeric {
                    field,
                    op,
                    val,
                    negated,
                });
                continue;
            }
        }

        conditions.push(keyword(field, value, negated));
    }

    conditions
}

/// Parse a query string into a plan / 解析查询字符串
pub fn parse_query(query: &str) -> QueryPlan {
    let mut plan = QueryPlan::default();

    for group in OR_SPLIT_RE.split(query) {
        let conditions = parse_group(group, &mut plan.post_filters);
        if !conditions.is_empty() {
            plan.or_groups.push(conditions);
        }
    }

    tracing::debug!(
        "Parsed query {:?}: {} group(s), {} post-filter(s)",
        query,
        plan.or_groups.len(),
        plan.post_filters.len()
    );
    plan
}
