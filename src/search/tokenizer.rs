//! Tokenizer - must agree exactly with the index build pipeline / 分词器
//!
//! The keyword shards were produced with a fixed rule set:
//! - lowercase, keep ASCII alphanumeric runs of length >= 2 / 转小写，保留长度>=2的字母数字串
//! - drop stop words / 去除停用词
//! - strip one trailing `s` from words longer than 3 chars / 去掉一个结尾的 s
//!
//! Any "smarter" stemming would miss index entries, so the rule is reproduced
//! literally, including its over-stemming (`status` -> `statu`).

use once_cell::sync::Lazy;
use regex::Regex;

/// Alphanumeric runs on ASCII word boundaries / ASCII 单词边界上的字母数字串
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)[a-z0-9]{2,}(?-u:\b)").expect("valid token regex"));

/// Fixed stop-word set / 停用词表
///
/// `new` is not in the set: `the new server` keeps `new`.
pub const STOP_WORDS: [&str; 17] = [
    "the", "and", "for", "with", "you", "are", "server", "our", "from", "a", "is", "in", "it",
    "us", "to", "of", "we",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Suffix stemmer / 后缀词干提取
pub fn simple_stem(word: &str) -> String {
    if word.chars().count() > 3 && word.ends_with('s') {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Raw alphanumeric runs of already-lowercased text / 提取字母数字串
pub fn word_runs(lowercased: &str) -> impl Iterator<Item = &str> {
    TOKEN_RE.find_iter(lowercased).map(|m| m.as_str())
}

/// Tokenize free text into index terms / 对文本进行分词
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_runs(&lower)
        .filter(|word| !is_stop_word(word))
        .map(simple_stem)
        .collect()
}
