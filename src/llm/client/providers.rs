//! LLM Provider支持模块

use anyhow::Result;
use rig::{
    client::CompletionClient,
    extractor::Extractor,
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{LLMConfig, LLMProvider};

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    Moonshot(rig::providers::moonshot::Client),
    DeepSeek(rig::providers::deepseek::Client),
    Mistral(rig::providers::mistral::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Gemini(rig::providers::gemini::Client),
    Ollama(rig::providers::ollama::Client),
}

/// 为各 provider 的 extractor builder 补上统一参数
macro_rules! finish_extractor {
    ($variant:ident, $builder:expr, $system_prompt:expr, $config:expr) => {
        ProviderExtractor::$variant(
            $builder
                .preamble($system_prompt)
                .max_tokens($config.max_tokens.into())
                .build(),
        )
    };
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let key = config.api_key.as_str();
        let base_url = config.api_base_url.as_str();

        let client = match config.provider {
            LLMProvider::OpenAI => ProviderClient::OpenAI(
                rig::providers::openai::Client::builder(key)
                    .base_url(base_url)
                    .build(),
            ),
            LLMProvider::Moonshot => ProviderClient::Moonshot(
                rig::providers::moonshot::Client::builder(key)
                    .base_url(base_url)
                    .build(),
            ),
            LLMProvider::DeepSeek => ProviderClient::DeepSeek(
                rig::providers::deepseek::Client::builder(key)
                    .base_url(base_url)
                    .build(),
            ),
            LLMProvider::Mistral => {
                ProviderClient::Mistral(rig::providers::mistral::Client::builder(key).build())
            }
            LLMProvider::OpenRouter => {
                ProviderClient::OpenRouter(rig::providers::openrouter::Client::builder(key).build())
            }
            LLMProvider::Anthropic => ProviderClient::Anthropic(
                rig::providers::anthropic::ClientBuilder::new(key).build()?,
            ),
            LLMProvider::Gemini => {
                ProviderClient::Gemini(rig::providers::gemini::Client::builder(key).build()?)
            }
            LLMProvider::Ollama => {
                ProviderClient::Ollama(rig::providers::ollama::Client::builder().build())
            }
        };
        Ok(client)
    }

    /// 创建结构化输出的 Extractor，模型通过工具调用提交符合 `T` 的 JSON
    pub fn create_extractor<T>(
        &self,
        model: &str,
        system_prompt: &str,
        config: &LLMConfig,
    ) -> Result<ProviderExtractor<T>>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let extractor = match self {
            ProviderClient::OpenAI(client) => finish_extractor!(
                OpenAI,
                client.extractor_completions_api::<T>(model),
                system_prompt,
                config
            ),
            ProviderClient::Moonshot(client) => {
                finish_extractor!(Moonshot, client.extractor::<T>(model), system_prompt, config)
            }
            ProviderClient::DeepSeek(client) => {
                finish_extractor!(DeepSeek, client.extractor::<T>(model), system_prompt, config)
            }
            ProviderClient::Mistral(client) => {
                finish_extractor!(Mistral, client.extractor::<T>(model), system_prompt, config)
            }
            ProviderClient::OpenRouter(client) => {
                finish_extractor!(OpenRouter, client.extractor::<T>(model), system_prompt, config)
            }
            ProviderClient::Anthropic(client) => {
                finish_extractor!(Anthropic, client.extractor::<T>(model), system_prompt, config)
            }
            ProviderClient::Gemini(client) => {
                let params =
                    AdditionalParameters::default().with_config(GenerationConfig::default());
                finish_extractor!(
                    Gemini,
                    client
                        .extractor::<T>(model)
                        .additional_params(serde_json::to_value(params)?),
                    system_prompt,
                    config
                )
            }
            ProviderClient::Ollama(client) => {
                finish_extractor!(Ollama, client.extractor::<T>(model), system_prompt, config)
            }
        };
        Ok(extractor)
    }
}

/// 统一的Extractor枚举
pub enum ProviderExtractor<T>
where
    T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
{
    OpenAI(Extractor<rig::providers::openai::CompletionModel, T>),
    Mistral(Extractor<rig::providers::mistral::CompletionModel, T>),
    OpenRouter(Extractor<rig::providers::openrouter::CompletionModel, T>),
    Anthropic(Extractor<rig::providers::anthropic::completion::CompletionModel, T>),
    Gemini(Extractor<rig::providers::gemini::completion::CompletionModel, T>),
    Moonshot(Extractor<rig::providers::moonshot::CompletionModel, T>),
    DeepSeek(Extractor<rig::providers::deepseek::CompletionModel, T>),
    Ollama(Extractor<rig::providers::ollama::CompletionModel<reqwest::Client>, T>),
}

impl<T> ProviderExtractor<T>
where
    T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
{
    /// 执行提取
    pub async fn extract(&self, prompt: &str) -> Result<T> {
        let extracted = match self {
            ProviderExtractor::OpenAI(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::Moonshot(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::DeepSeek(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::Mistral(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::OpenRouter(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::Anthropic(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::Gemini(extractor) => extractor.extract(prompt).await,
            ProviderExtractor::Ollama(extractor) => extractor.extract(prompt).await,
        };
        extracted.map_err(Into::into)
    }

    pub fn provider(&self) -> LLMProvider {
        match self {
            ProviderExtractor::OpenAI(_) => LLMProvider::OpenAI,
            ProviderExtractor::Moonshot(_) => LLMProvider::Moonshot,
            ProviderExtractor::DeepSeek(_) => LLMProvider::DeepSeek,
            ProviderExtractor::Mistral(_) => LLMProvider::Mistral,
            ProviderExtractor::OpenRouter(_) => LLMProvider::OpenRouter,
            ProviderExtractor::Anthropic(_) => LLMProvider::Anthropic,
            ProviderExtractor::Gemini(_) => LLMProvider::Gemini,
            ProviderExtractor::Ollama(_) => LLMProvider::Ollama,
        }
    }
}
