//! 网络搜索协作方

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod tavily;

pub use tavily::TavilyClient;

/// 一条搜索结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl SearchHit {
    pub fn new(content: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
            title: None,
            score: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// 搜索协作方接口：查询进，按相关度排好序的片段出；允许返回空列表
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}
