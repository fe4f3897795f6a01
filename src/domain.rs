//! 域名排除规则
//!
//! 在排除列表中的站点上，引擎完全不工作。规则是主机名，
//! 以 `*.` 开头时匹配基础域名及其所有子域名。

use url::Url;

/// 单条排除规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    host: String,
    include_subdomains: bool,
}

impl ExclusionRule {
    /// 解析规则，空白规则返回 `None`
    ///
    /// 允许用户直接粘贴完整 URL，此时只取主机名部分。
    pub fn parse(rule: &str) -> Option<Self> {
        let trimmed = rule.trim().trim_end_matches('.').to_lowercase();
        if trimmed.is_empty() {
            return None;
        }

        let (include_subdomains, host) = match trimmed.strip_prefix("*.") {
            Some(rest) => (true, rest.to_string()),
            None => (false, trimmed),
        };

        let host = if host.contains("://") {
            Url::parse(&host).ok()?.host_str()?.to_string()
        } else {
            host
        };

        if host.is_empty() {
            return None;
        }

        Some(Self {
            host,
            include_subdomains,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn include_subdomains(&self) -> bool {
        self.include_subdomains
    }

    /// 检查主机名是否命中该规则
    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.trim().trim_end_matches('.').to_lowercase();
        if hostname == self.host {
            return true;
        }

        self.include_subdomains
            && hostname
                .strip_suffix(&self.host)
                .map(|prefix| prefix.ends_with('.'))
                .unwrap_or(false)
    }
}

/// 从页面地址中取出主机名
pub fn host_of(page_url: &str) -> Option<String> {
    Url::parse(page_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_lowercase()))
}

/// 主机名是否被任意规则排除
pub fn is_domain_excluded(hostname: &str, rules: &[ExclusionRule]) -> bool {
    rules.iter().any(|rule| rule.matches(hostname))
}

/// 解析存储中的原始规则列表，忽略无效项
pub fn parse_rules(raw: &[String]) -> Vec<ExclusionRule> {
    raw.iter()
        .filter_map(|rule| {
            let parsed = ExclusionRule::parse(rule);
            if parsed.is_none() {
                tracing::debug!("忽略无效的排除规则: {:?}", rule);
            }
            parsed
        })
        .collect()
}
