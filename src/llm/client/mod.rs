//! LLM客户端 - 基于rig的语言模型协作方实现

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::config::LLMConfig;
use crate::llm::LanguageModel;

mod providers;

use providers::ProviderClient;

/// 连接检查时要求模型提交的最小结构
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct Greeting {
    /// A short greeting
    reply: String,
}

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// 检查模型连接及结构化输出是否正常
    pub async fn check_connection(&self) -> Result<()> {
        println!("🔄 正在检查模型连接...");
        match self
            .extract::<Greeting>("You are a helpful assistant.", "Say hello.")
            .await
        {
            Ok(_) => {
                println!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// 通用重试逻辑，用于处理异步操作的重试机制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(
                        provider = %self.config.provider,
                        attempt = retries,
                        max_attempts = max_retries,
                        error = %err,
                        "model call failed"
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    // 线性退避
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms * retries as u64))
                        .await;
                }
            }
        }
    }
}

#[async_trait]
impl LanguageModel for LLMClient {
    async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let extractor =
            self.client
                .create_extractor::<T>(&self.config.model, system_prompt, &self.config)?;
        let timeout = self.attempt_timeout();
        tracing::debug!(provider = %extractor.provider(), model = %self.config.model, "structured extraction");

        self.retry_with_backoff(|| async {
            match tokio::time::timeout(timeout, extractor.extract(user_prompt)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "model call timed out after {}s",
                    timeout.as_secs()
                )),
            }
        })
        .await
    }
}
