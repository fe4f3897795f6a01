//! 术语模式索引
//!
//! 把所有已知术语编译成一个不区分大小写的正则交替式。较长的术语排在前面，
//! 否则在同一位置上较短的术语会先匹配，较长的术语永远没有机会。

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

/// 编译后的术语模式
///
/// 第 i 个捕获组对应 `terms()[i]`。术语列表为空时不匹配任何文本。
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Option<Regex>,
    terms: Vec<String>,
}

impl Pattern {
    /// 不匹配任何文本的模式
    pub fn empty() -> Self {
        Self {
            regex: None,
            terms: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub(crate) fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }
}

/// 编译术语列表
///
/// 过滤空白术语，按小写去重（保留最先出现的写法），按字符数降序排列。
/// 正则构建失败时记录日志并返回空模式。
pub fn compile<S: AsRef<str>>(terms: &[S]) -> Pattern {
    let mut seen = HashSet::new();
    let mut canonical: Vec<String> = terms
        .iter()
        .map(|term| term.as_ref().trim())
        .filter(|term| !term.is_empty())
        .filter(|term| seen.insert(term.to_lowercase()))
        .map(str::to_string)
        .collect();

    if canonical.is_empty() {
        return Pattern::empty();
    }

    canonical.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });

    let alternation = canonical
        .iter()
        .map(|term| format!("({})", regex::escape(term)))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .size_limit(64 * (1 << 20))
        .build()
    {
        Ok(regex) => {
            tracing::debug!("术语模式已编译: {} 个术语", canonical.len());
            Pattern {
                regex: Some(regex),
                terms: canonical,
            }
        }
        Err(e) => {
            tracing::warn!("术语模式编译失败，本次不做匹配: {}", e);
            Pattern::empty()
        }
    }
}
