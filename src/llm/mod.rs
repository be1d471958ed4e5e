//! 语言模型协作方

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod client;

pub use client::LLMClient;

/// 语言模型协作方接口，要求可被多个运行并发调用
///
/// 各阶段只需要结构化输出：实现方按 `T` 的 JSON Schema 约束模型，返回解析好的值。
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static;
}
