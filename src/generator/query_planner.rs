//! 查询扩展：把主题扩展为若干条聚焦的搜索查询

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::generator::cancellation::CancellationToken;
use crate::generator::context::GeneratorContext;
use crate::generator::error::PipelineError;
use crate::llm::LanguageModel;
use crate::types::{SearchQuery, Topic};
use crate::utils::text::normalize;

const SYSTEM_PROMPT: &str = "You are an expert research assistant who writes concise, keyword-style web search queries.";

/// 模型输出的查询列表
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SubQueries {
    /// 4-5 search queries for the topic
    pub queries: Vec<String>,
}

pub struct QueryPlanner<'a, M> {
    context: &'a GeneratorContext<M>,
}

impl<'a, M: LanguageModel> QueryPlanner<'a, M> {
    pub fn new(context: &'a GeneratorContext<M>) -> Self {
        Self { context }
    }

    /// 把主题扩展为 1 到 `max_queries` 条查询
    pub async fn expand(
        &self,
        topic: &Topic,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchQuery>, PipelineError> {
        let prompt = build_prompt(topic.text());
        let llm = self.context.llm.as_ref();

        let planned: SubQueries = self
            .context
            .guarded(cancel, llm.extract::<SubQueries>(SYSTEM_PROMPT, &prompt))
            .await
            .map_err(|e| PipelineError::Planning(e.to_string()))?;

        let queries = dedupe_queries(planned.queries, self.context.config.max_queries);
        if queries.is_empty() {
            return Err(PipelineError::Planning(
                "model returned no usable queries".to_string(),
            ));
        }

        tracing::debug!(count = queries.len(), "queries planned");
        Ok(queries)
    }
}

/// 去首尾空白，按不区分大小写去重，保留首次出现的顺序
pub fn dedupe_queries(raw: Vec<String>, max_queries: usize) -> Vec<SearchQuery> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|query| query.trim().trim_matches('"').trim().to_string())
        .filter(|query| !query.is_empty())
        .filter(|query| seen.insert(normalize(query)))
        .take(max_queries)
        .map(SearchQuery::new)
        .collect()
}

fn build_prompt(topic: &str) -> String {
    format!(
        r#"Generate search queries that will find broad and reliable information for a presentation on "{topic}".

Instructions:
1. Create 4-5 diverse search queries.
2. Cover causes, impacts, benchmarks and statistics, policies or solutions, and the future outlook.
3. Favor broader keywords and simpler questions over long academic questions. Ask for accurate numbers where possible.
4. Think in terms of the keywords you would type into a search engine.

Example
Topic: "Applications of AI in Finance"
- "AI use cases in banking and fintech 2025"
- "Algorithmic trading using machine learning"
- "Fraud detection with AI in banking"
- "Statistics on AI reducing financial fraud and risk"
- "Future of AI in finance and fintech""#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{ScriptedModel, StaticSearch, context_with};

    #[test]
    fn test_dedupe_queries_case_insensitive() {
        let queries = dedupe_queries(
            vec![
                "Solar power growth".to_string(),
                "  solar POWER   growth ".to_string(),
                "".to_string(),
                "Wind energy statistics".to_string(),
            ],
            5,
        );
        let texts: Vec<_> = queries.iter().map(|q| q.as_str()).collect();
        assert_eq!(texts, vec!["Solar power growth", "Wind energy statistics"]);
    }

    #[test]
    fn test_dedupe_queries_caps_count() {
        let raw = (0..9).map(|i| format!("query {}", i)).collect();
        assert_eq!(dedupe_queries(raw, 5).len(), 5);
    }

    #[tokio::test]
    async fn test_expand_parses_structured_output() {
        let model = ScriptedModel::new().on(
            "search queries",
            r#"{"queries": ["Renewable energy growth 2024", "renewable energy growth 2024", "Solar cost statistics"]}"#,
        );
        let ctx = context_with(model, StaticSearch::default());
        let topic = crate::types::GenerationRequest::new("Renewable Energy Trends")
            .validate()
            .unwrap();

        let queries = QueryPlanner::new(&ctx)
            .expand(&topic, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].as_str(), "Renewable energy growth 2024");
    }

    #[tokio::test]
    async fn test_expand_keeps_submitted_values_verbatim() {
        let model = ScriptedModel::new().on(
            "search queries",
            r#"{"queries": ["Queries for {Renewable Energy Trends}: solar growth 2024", "wind cost statistics"]}"#,
        );
        let ctx = context_with(model, StaticSearch::default());
        let topic = crate::types::GenerationRequest::new("Renewable Energy Trends")
            .validate()
            .unwrap();

        let queries = QueryPlanner::new(&ctx)
            .expand(&topic, &CancellationToken::new())
            .await
            .unwrap();
        let texts: Vec<_> = queries.iter().map(|q| q.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Queries for {Renewable Energy Trends}: solar growth 2024",
                "wind cost statistics"
            ]
        );
    }

    #[tokio::test]
    async fn test_expand_fails_on_unparsable_output() {
        let model = ScriptedModel::new().on("search queries", "I cannot help with that.");
        let ctx = context_with(model, StaticSearch::default());
        let topic = crate::types::GenerationRequest::new("Rust").validate().unwrap();

        let err = QueryPlanner::new(&ctx)
            .expand(&topic, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Planning(_)));
    }

    #[tokio::test]
    async fn test_expand_fails_on_empty_list() {
        let model = ScriptedModel::new().on("search queries", r#"{"queries": ["  ", ""]}"#);
        let ctx = context_with(model, StaticSearch::default());
        let topic = crate::types::GenerationRequest::new("Rust").validate().unwrap();

        let err = QueryPlanner::new(&ctx)
            .expand(&topic, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Planning(_)));
    }
}
