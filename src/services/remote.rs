//! HTTP 翻译/音标查询客户端

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::background::RemoteLookup;
use crate::config::{constants, EngineConfig};
use crate::error::{AnnotatorError, AnnotatorResult};

/// 单次尝试的结果分类
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// 服务端错误、超时、连接失败，可以再试
    Retryable(String),
    /// 客户端错误、响应格式错误，立即失败
    Fatal(String),
}

/// 有界重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 总尝试次数（包含第一次）
    pub max_attempts: usize,
    pub per_attempt_timeout: Duration,
    /// 第 n 次重试前等待 `backoff * 2^(n-1)`，为零时立即重试
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_RETRY_ATTEMPTS,
            per_attempt_timeout: Duration::from_millis(constants::DEFAULT_REQUEST_TIMEOUT_MS),
            backoff: Duration::from_millis(constants::DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_retry_attempts.max(1),
            per_attempt_timeout: config.request_timeout(),
            backoff: config.retry_backoff(),
        }
    }

    /// 按策略执行操作，`operation` 接收从 1 开始的尝试序号
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> AnnotatorResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let outcome = tokio::time::timeout(self.per_attempt_timeout, operation(attempt)).await;

            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(AttemptError::Fatal(message))) => {
                    return Err(AnnotatorError::Lookup(message));
                }
                Ok(Err(AttemptError::Retryable(message))) => {
                    tracing::debug!("查询失败({}/{}): {}", attempt, max_attempts, message);
                    last_error = message;
                }
                Err(_) => {
                    tracing::debug!("查询超时({}/{})", attempt, max_attempts);
                    last_error = format!("请求超过 {:?} 未响应", self.per_attempt_timeout);
                }
            }

            if attempt < max_attempts && !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff * (1u32 << (attempt - 1).min(16))).await;
            }
        }

        Err(AnnotatorError::Lookup(format!(
            "{} 次尝试后仍然失败: {}",
            max_attempts, last_error
        )))
    }
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhoneticsResponse {
    #[serde(default)]
    phonetic_text: Option<String>,
}

/// 基于 reqwest 的远程查询
pub struct HttpLookup {
    base_url: Url,
    client: Client,
    retry: RetryPolicy,
}

impl HttpLookup {
    pub fn new(base_url: &str, retry: RetryPolicy) -> AnnotatorResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AnnotatorError::Config(format!("无效的API地址 {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(retry.per_attempt_timeout)
            .build()
            .map_err(|e| AnnotatorError::Config(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            retry,
        })
    }

    pub fn from_config(config: &EngineConfig) -> AnnotatorResult<Self> {
        Self::new(&config.api_base_url, RetryPolicy::from_config(config))
    }

    fn endpoint(&self, path: &str, word: &str) -> AnnotatorResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AnnotatorError::Config(format!("无法拼接接口地址: {}", e)))?;
        url.query_pairs_mut().append_pair("word", word);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> AnnotatorResult<T> {
        self.retry
            .run(|_| {
                let request = self.client.get(url.clone());
                async move {
                    let response = request.send().await.map_err(|e| {
                        if e.is_timeout() || e.is_connect() || e.is_request() {
                            AttemptError::Retryable(format!("网络错误: {}", e))
                        } else {
                            AttemptError::Fatal(format!("请求失败: {}", e))
                        }
                    })?;

                    let status = response.status();
                    if status.is_server_error() {
                        return Err(AttemptError::Retryable(format!("服务端错误: {}", status)));
                    }
                    if !status.is_success() {
                        return Err(AttemptError::Fatal(format!("请求失败: {}", status)));
                    }

                    response
                        .json::<T>()
                        .await
                        .map_err(|e| AttemptError::Fatal(format!("响应解析失败: {}", e)))
                }
            })
            .await
    }
}

#[async_trait(?Send)]
impl RemoteLookup for HttpLookup {
    async fn lookup_translation(&self, word: &str) -> AnnotatorResult<String> {
        let url = self.endpoint(constants::TRANSLATE_ENDPOINT, word)?;
        let response: TranslateResponse = self.get_json(url).await?;

        response
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AnnotatorError::Lookup(format!("服务没有返回翻译: {}", word)))
    }

    async fn lookup_phonetics(&self, word: &str) -> AnnotatorResult<String> {
        let url = self.endpoint(constants::PHONETICS_ENDPOINT, word)?;
        let response: PhoneticsResponse = self.get_json(url).await?;
        Ok(response.phonetic_text.unwrap_or_default())
    }
}
