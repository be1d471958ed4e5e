//! Tavily 搜索 API 客户端

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::search::{SearchHit, SearchProvider};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// 基于 reqwest 的 Tavily 客户端，可被多个运行共享
#[derive(Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    config: SearchConfig,
}

impl TavilyClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("deckgen-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.config.api_base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            api_key: &self.config.api_key,
            query,
            max_results: self.config.max_results,
            search_depth: &self.config.search_depth,
        };

        let response = self
            .http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .context("search request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("search service returned HTTP {}", status);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("search response is not valid JSON")?;

        Ok(into_hits(parsed))
    }
}

/// 丢弃缺少链接或正文的结果
fn into_hits(response: SearchResponse) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter_map(|raw| {
            let url = raw.url.filter(|u| !u.trim().is_empty())?;
            let content = raw.content.filter(|c| !c.trim().is_empty())?;
            Some(SearchHit {
                content,
                url,
                title: raw.title,
                score: raw.score,
            })
        })
        .collect()
}
