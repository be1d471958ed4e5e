//! 调研阶段：逐条执行查询，汇总并去重上下文片段

use crate::generator::cancellation::CancellationToken;
use crate::generator::context::GeneratorContext;
use crate::generator::error::PipelineError;
use crate::llm::LanguageModel;
use crate::types::{ResearchContext, SearchQuery, Snippet};
use crate::utils::threads::do_parallel_with_limit;

/// 调研结果与每条查询的结局统计
#[derive(Debug, Default)]
pub struct ResearchReport {
    pub context: ResearchContext,
    pub succeeded: usize,
    pub empty: usize,
    pub failed: usize,
}

impl ResearchReport {
    pub fn summary(&self) -> String {
        format!(
            "Collected {} unique snippets ({} queries ok, {} empty, {} failed)",
            self.context.len(),
            self.succeeded,
            self.empty,
            self.failed
        )
    }
}

pub struct Researcher<'a, M> {
    context: &'a GeneratorContext<M>,
}

impl<'a, M: LanguageModel> Researcher<'a, M> {
    pub fn new(context: &'a GeneratorContext<M>) -> Self {
        Self { context }
    }

    /// 执行全部查询；单条失败只记录并跳过，全部失败才返回 `Research` 错误
    pub async fn gather(
        &self,
        queries: &[SearchQuery],
        cancel: &CancellationToken,
    ) -> Result<ResearchReport, PipelineError> {
        let ctx = self.context;
        let searches = queries
            .iter()
            .map(|query| async move {
                let result = ctx
                    .guarded(cancel, ctx.search.search(query.as_str()))
                    .await;
                (query, result)
            })
            .collect::<Vec<_>>();

        let outcomes = do_parallel_with_limit(searches, ctx.config.max_parallels).await;

        let mut report = ResearchReport::default();
        for (query, outcome) in outcomes {
            match outcome {
                Ok(hits) if hits.is_empty() => {
                    tracing::warn!(query = %query, "search returned no results");
                    report.empty += 1;
                }
                Ok(hits) => {
                    let total = hits.len();
                    let added = report.context.extend(hits.into_iter().map(|hit| Snippet {
                        content: hit.content.trim().to_string(),
                        reference: hit.url,
                        title: hit.title,
                        query: Some(query.to_string()),
                        score: hit.score,
                    }));
                    tracing::debug!(query = %query, total, added, "search results merged");
                    report.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "search failed, skipping query");
                    report.failed += 1;
                }
            }
        }

        if report.succeeded == 0 {
            return Err(PipelineError::Research(format!(
                "all {} queries failed ({} empty, {} errors)",
                queries.len(),
                report.empty,
                report.failed
            )));
        }
        if report.context.is_empty() {
            return Err(PipelineError::Research(
                "search results contained no usable text".to_string(),
            ));
        }

        tracing::info!(
            snippets = report.context.len(),
            ok = report.succeeded,
            empty = report.empty,
            failed = report.failed,
            "research finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{ScriptedModel, StaticSearch, context_with, hit};

    fn queries(texts: &[&str]) -> Vec<SearchQuery> {
        texts.iter().map(|t| SearchQuery::new(*t)).collect()
    }

    #[tokio::test]
    async fn test_identical_snippets_from_different_queries_stored_once() {
        let search = StaticSearch::default()
            .on(
                "solar",
                vec![hit("Solar capacity doubled in 2023.", "https://a.example")],
            )
            .on(
                "wind",
                vec![
                    hit("solar capacity doubled in 2023.", "https://b.example"),
                    hit("Offshore wind reached 75 GW.", "https://c.example"),
                ],
            );
        let ctx = context_with(ScriptedModel::new(), search);

        let report = Researcher::new(&ctx)
            .gather(&queries(&["solar growth", "wind growth"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.context.len(), 2);
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test]
    async fn test_single_failure_is_skipped() {
        let search = StaticSearch::default()
            .fail_on("policy", "HTTP 500")
            .on("solar", vec![hit("Solar is cheap.", "https://a.example")]);
        let ctx = context_with(ScriptedModel::new(), search);

        let report = Researcher::new(&ctx)
            .gather(&queries(&["energy policy", "solar cost"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.context.len(), 1);
        assert!(report.summary().contains("1 failed"));
    }

    #[tokio::test]
    async fn test_search_score_is_kept_on_snippet() {
        let scored = crate::search::SearchHit {
            score: Some(0.87),
            ..hit("Solar module prices fell 40% in 2023.", "https://a.example")
        };
        let search = StaticSearch::default().on("solar", vec![scored]);
        let ctx = context_with(ScriptedModel::new(), search);

        let report = Researcher::new(&ctx)
            .gather(&queries(&["solar prices"]), &CancellationToken::new())
            .await
            .unwrap();
        let snippet = &report.context.snippets()[0];
        assert_eq!(snippet.score, Some(0.87));
        assert_eq!(snippet.query.as_deref(), Some("solar prices"));
    }

    #[tokio::test]
    async fn test_all_queries_failing_is_research_error() {
        let search = StaticSearch::default().on("empty", Vec::new());
        let ctx = context_with(ScriptedModel::new(), search);

        let err = Researcher::new(&ctx)
            .gather(&queries(&["a", "b", "empty one"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Research(_)));
    }

    #[tokio::test]
    async fn test_cancelled_run_issues_no_searches() {
        let search = std::sync::Arc::new(
            StaticSearch::default().fallback(vec![hit("x", "https://x.example")]),
        );
        let ctx = context_with(ScriptedModel::new(), search.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Researcher::new(&ctx).gather(&queries(&["a", "b"]), &cancel).await;
        assert!(result.is_err());
        assert_eq!(search.calls(), 0);
    }
}
