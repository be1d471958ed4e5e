use crate::config::{Config, LLMProvider, OutputFormat};
use crate::types::GenerationRequest;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// 未在配置中填写时读取的LLM API KEY环境变量
pub const LLM_API_KEY_ENV: &str = "DECKGEN_LLM_API_KEY";
/// 未在配置中填写时读取的搜索API KEY环境变量
pub const SEARCH_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// deckgen-rs - 由Rust与AI驱动的主题到幻灯片生成引擎
#[derive(Parser, Debug)]
#[command(name = "deckgen-rs")]
#[command(
    about = "AI-based slide deck generator. It expands a topic into web searches, plans a seven-slide outline and writes the content of every slide."
)]
#[command(version)]
pub struct Args {
    /// 演示主题
    pub topic: String,

    /// 作者名，显示在封面
    #[arg(short, long)]
    pub author: Option<String>,

    /// 主题样式 (Minimalist_Dark, Business_Corporate, Education_Creative, Historical_Vintage, Technology_Futuristic, Environmental_Natural, default)
    #[arg(short, long)]
    pub theme: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出目录
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// 输出格式 (markdown, json)
    #[arg(long)]
    pub format: Option<String>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// LLM Provider (openai, moonshot, deepseek, mistral, openrouter, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 使用的模型
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 搜索服务API KEY
    #[arg(long)]
    pub search_api_key: Option<String>,

    /// 检索与逐页生成的并发上限
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// 查询扩展的最大条数
    #[arg(long)]
    pub max_queries: Option<usize>,

    /// 整次运行的超时（秒）
    #[arg(long)]
    pub run_timeout: Option<u64>,
}

impl Args {
    /// 本次运行的生成请求，校验在流水线启动前进行
    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            topic: self.topic.clone(),
            author: self.author.clone(),
            theme: self.theme.clone(),
        }
    }

    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let mut config = if let Some(config_path) = &self.config {
            // 如果显式指定了配置文件路径，从该路径加载
            Config::from_file(config_path)
                .context(format!("无法读取配置文件 {:?}", config_path))?
        } else {
            // 如果没有显式指定配置文件，尝试从默认位置加载
            let default_config_path = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("deckgen.toml");

            if default_config_path.exists() {
                Config::from_file(&default_config_path)
                    .context(format!("无法读取默认配置文件 {:?}", default_config_path))?
            } else {
                // 默认配置文件不存在，使用默认值
                Config::default()
            }
        };

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            if let Ok(provider) = provider_str.parse::<LLMProvider>() {
                config.llm.provider = provider;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                );
            }
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        // 搜索配置
        if let Some(search_api_key) = self.search_api_key {
            config.search.api_key = search_api_key;
        }

        // 流水线配置
        if let Some(max_parallels) = self.max_parallels {
            config.pipeline.max_parallels = max_parallels;
        }
        if let Some(max_queries) = self.max_queries {
            config.pipeline.max_queries = max_queries;
        }
        if let Some(run_timeout) = self.run_timeout {
            config.pipeline.run_timeout_seconds = run_timeout;
        }

        // 输出配置
        if let Some(output_dir) = self.output_dir {
            config.output.output_dir = output_dir;
        }
        if let Some(format_str) = self.format {
            if let Ok(format) = format_str.parse::<OutputFormat>() {
                config.output.format = format;
            } else {
                eprintln!("⚠️ 警告: 未知的输出格式: {}，使用 markdown", format_str);
            }
        }

        config.verbose = config.verbose || self.verbose;

        apply_env_keys(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }
}

/// 配置与命令行都没有给出API KEY时，从环境变量补齐
pub fn apply_env_keys<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if config.llm.api_key.is_empty()
        && let Some(key) = lookup(LLM_API_KEY_ENV)
    {
        config.llm.api_key = key;
    }
    if config.search.api_key.is_empty()
        && let Some(key) = lookup(SEARCH_API_KEY_ENV)
    {
        config.search.api_key = key;
    }
}

// Include tests
#[cfg(test)]
mod tests;
