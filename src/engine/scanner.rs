//! 文本匹配
//!
//! 在一段文本中找出全部不重叠的术语匹配，按从左到右的顺序返回。

use super::pattern::Pattern;

/// 一次匹配
///
/// `start` 和 `length` 是文本中的字节偏移，总在字符边界上。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub matched_text: String,
    pub start: usize,
    pub length: usize,
    /// 命中的术语在 `Pattern::terms()` 中的位置
    pub term_index: usize,
}

impl MatchSpan {
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// 查找文本中的全部匹配
pub fn find_matches(text: &str, pattern: &Pattern) -> Vec<MatchSpan> {
    let Some(regex) = pattern.regex() else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    let mut position = 0;

    while position <= text.len() {
        let Some(captures) = regex.captures_at(text, position) else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };

        if whole.is_empty() {
            // 空匹配时向前推进一个字符，保证循环结束
            match text[whole.end()..].chars().next() {
                Some(ch) => position = whole.end() + ch.len_utf8(),
                None => break,
            }
            continue;
        }

        let term_index = (1..captures.len())
            .find(|&group| captures.get(group).is_some_and(|m| !m.is_empty()))
            .map(|group| group - 1)
            .unwrap_or(0);

        spans.push(MatchSpan {
            matched_text: whole.as_str().to_string(),
            start: whole.start(),
            length: whole.len(),
            term_index,
        });
        position = whole.end();
    }

    spans
}
