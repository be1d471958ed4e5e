use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Mistral => write!(f, "mistral"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 演示文稿输出格式
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// LLM模型配置
    pub llm: LLMConfig,

    /// 网络搜索配置
    pub search: SearchConfig,

    /// 流水线参数
    pub pipeline: PipelineConfig,

    /// 输出配置
    pub output: OutputConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 使用的模型
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 网络搜索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: String,

    pub api_base_url: String,

    /// 每个查询返回的最大结果数
    pub max_results: usize,

    /// basic 或 advanced
    pub search_depth: String,

    pub timeout_seconds: u64,
}

/// 流水线参数，数值均为可调默认值
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// 查询扩展的最大条数
    pub max_queries: usize,

    /// 大纲形态不合法时的纠正重试次数
    pub outline_retries: u32,

    pub min_bullets: usize,

    pub max_bullets: usize,

    /// 单条要点的最大字符数
    pub max_bullet_chars: usize,

    /// 幻灯片标题的最大字符数
    pub max_title_chars: usize,

    /// 单页内容为空时的重试次数
    pub content_retries: u32,

    /// 检索与逐页生成的并发上限
    pub max_parallels: usize,

    /// 单次协作方调用的超时（秒）
    pub call_timeout_seconds: u64,

    /// 整次运行的超时（秒）
    pub run_timeout_seconds: u64,

    /// 每页最多使用的上下文片段
    pub snippets_per_slide: usize,

    /// 每页最多列出的来源
    pub max_references: usize,
}

/// 输出配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,

    pub format: OutputFormat,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// 检查流水线参数是否自洽
    pub fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        if pipeline.max_queries == 0 {
            bail!("pipeline.max_queries must be at least 1");
        }
        if pipeline.min_bullets == 0 {
            bail!("pipeline.min_bullets must be at least 1");
        }
        if pipeline.min_bullets > pipeline.max_bullets {
            bail!(
                "pipeline.min_bullets ({}) exceeds pipeline.max_bullets ({})",
                pipeline.min_bullets,
                pipeline.max_bullets
            );
        }
        if pipeline.max_parallels == 0 {
            bail!("pipeline.max_parallels must be at least 1");
        }
        if pipeline.max_bullet_chars < 10 {
            bail!("pipeline.max_bullet_chars is too small");
        }

        if pipeline.call_timeout_seconds == 0 || pipeline.run_timeout_seconds == 0 {
            bail!("pipeline timeouts must be at least 1 second");
        }
        if self.llm.timeout_seconds == 0 || self.search.timeout_seconds == 0 {
            bail!("llm.timeout_seconds and search.timeout_seconds must be at least 1 second");
        }
        // 单次尝试超时不短于整次调用超时时，客户端的重试永远没有机会执行
        if self.llm.timeout_seconds >= pipeline.call_timeout_seconds {
            bail!(
                "llm.timeout_seconds ({}) must be shorter than pipeline.call_timeout_seconds ({})",
                self.llm.timeout_seconds,
                pipeline.call_timeout_seconds
            );
        }
        if pipeline.run_timeout_seconds < pipeline.call_timeout_seconds {
            bail!(
                "pipeline.run_timeout_seconds ({}) is shorter than pipeline.call_timeout_seconds ({})",
                pipeline.run_timeout_seconds,
                pipeline.call_timeout_seconds
            );
        }
        Ok(())
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: String::new(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model: String::from("gpt-4o-mini"),
            max_tokens: 4096,
            temperature: 0.3,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 30,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: String::from("https://api.tavily.com"),
            max_results: 4,
            search_depth: String::from("basic"),
            timeout_seconds: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queries: 5,
            outline_retries: 1,
            min_bullets: 3,
            max_bullets: 6,
            max_bullet_chars: 160,
            max_title_chars: 80,
            content_retries: 1,
            max_parallels: 3,
            call_timeout_seconds: 120,
            run_timeout_seconds: 900,
            snippets_per_slide: 8,
            max_references: 2,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            format: OutputFormat::default(),
        }
    }
}
