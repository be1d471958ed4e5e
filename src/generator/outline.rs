//! 大纲规划：根据调研上下文给出固定形态的 7 页大纲

use anyhow::{Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generator::cancellation::CancellationToken;
use crate::generator::context::GeneratorContext;
use crate::generator::error::PipelineError;
use crate::llm::LanguageModel;
use crate::types::slide::KEY_POINT_COUNT;
use crate::types::{OUTLINE_SHAPE, ResearchContext, SlideKind, SlideSpec, Topic};
use crate::utils::text::cap_chars;

const SYSTEM_PROMPT: &str =
    "You are an expert presentation designer who turns raw research into a logical slide plan.";

/// 提示词中上下文的字符上限
const CONTEXT_BUDGET_CHARS: usize = 12_000;
const SNIPPET_CHARS: usize = 600;

/// 模型输出的演示计划
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SlidePlan {
    /// Engaging main title of the presentation
    pub title: String,
    /// Title of the overview slide, e.g. "Our Roadmap"
    pub overview_title: String,
    /// Exactly four key point slide titles, in "Main Title - Subtitle" form
    pub key_points: Vec<String>,
    /// Title of the closing slide, in "Main Title - Subtitle" form
    pub conclusion_title: String,
}

pub struct OutlinePlanner<'a, M> {
    context: &'a GeneratorContext<M>,
}

impl<'a, M: LanguageModel> OutlinePlanner<'a, M> {
    pub fn new(context: &'a GeneratorContext<M>) -> Self {
        Self { context }
    }

    pub async fn plan(
        &self,
        topic: &Topic,
        research: &ResearchContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<SlideSpec>, PipelineError> {
        self.plan_with(topic, research, cancel, |_, _| {}).await
    }

    /// 规划大纲；形态不合法时带上纠正说明重试，每次重试前回调 `on_retry(attempt, reason)`
    pub async fn plan_with<F>(
        &self,
        topic: &Topic,
        research: &ResearchContext,
        cancel: &CancellationToken,
        mut on_retry: F,
    ) -> Result<Vec<SlideSpec>, PipelineError>
    where
        F: FnMut(u32, &str),
    {
        if research.is_empty() {
            return Err(PipelineError::Outline(
                "cannot plan an outline without research context".to_string(),
            ));
        }

        let config = &self.context.config;
        let attempts = config.outline_retries + 1;
        let mut correction: Option<String> = None;

        for attempt in 1..=attempts {
            if let Some(reason) = &correction {
                on_retry(attempt, reason);
            }

            let prompt = build_prompt(topic.text(), research, correction.as_deref());
            let llm = self.context.llm.as_ref();
            let result = self
                .context
                .guarded(cancel, llm.extract::<SlidePlan>(SYSTEM_PROMPT, &prompt))
                .await
                .and_then(|plan| into_specs(plan, config.max_title_chars));

            match result {
                Ok(specs) => return Ok(specs),
                Err(e) => {
                    tracing::warn!(attempt, max_attempts = attempts, error = %e, "outline rejected");
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    correction = Some(e.to_string());
                }
            }
        }

        Err(PipelineError::Outline(format!(
            "no valid outline after {} attempts: {}",
            attempts,
            correction.unwrap_or_default()
        )))
    }
}

/// 校验大纲形态：恰好 7 页，类型序列固定，位置从 1 连续编号，标题非空
pub fn validate_outline(specs: &[SlideSpec]) -> Result<()> {
    if specs.len() != OUTLINE_SHAPE.len() {
        bail!(
            "outline has {} slides, expected {}",
            specs.len(),
            OUTLINE_SHAPE.len()
        );
    }
    for (index, (spec, expected)) in specs.iter().zip(OUTLINE_SHAPE).enumerate() {
        if spec.kind != expected {
            bail!(
                "slide {} is {}, expected {}",
                index + 1,
                spec.kind,
                expected
            );
        }
        if spec.position != index + 1 {
            bail!("slide {} has position {}", index + 1, spec.position);
        }
        if spec.title.trim().is_empty() {
            bail!("slide {} has an empty title", index + 1);
        }
    }
    Ok(())
}

/// 把演示计划转换为 SlideSpec 序列
pub fn into_specs(plan: SlidePlan, max_title_chars: usize) -> Result<Vec<SlideSpec>> {
    if plan.key_points.len() != KEY_POINT_COUNT {
        bail!(
            "plan has {} key points, expected exactly {}",
            plan.key_points.len(),
            KEY_POINT_COUNT
        );
    }

    let clean = |title: &str| cap_chars(title.trim().trim_matches('"').trim(), max_title_chars);
    let key_points: Vec<String> = plan.key_points.iter().map(|t| clean(t)).collect();

    let mut specs = Vec::with_capacity(OUTLINE_SHAPE.len());
    specs.push(SlideSpec::new(SlideKind::Title, 1, clean(&plan.title)));
    specs.push(
        SlideSpec::new(SlideKind::Agenda, 2, clean(&plan.overview_title))
            .with_talking_points(key_points.clone()),
    );
    for (offset, title) in key_points.into_iter().enumerate() {
        specs.push(SlideSpec::new(SlideKind::KeyPoint, offset + 3, title));
    }
    specs.push(SlideSpec::new(
        SlideKind::Conclusion,
        7,
        clean(&plan.conclusion_title),
    ));

    validate_outline(&specs)?;
    Ok(specs)
}

/// 以 `- 片段 [Source: 引用]` 的形式列出上下文，总长度受限
pub fn format_context(research: &ResearchContext, budget_chars: usize) -> String {
    let mut out = String::new();
    for snippet in research.snippets() {
        let line = format!(
            "- {} [Source: {}]\n",
            cap_chars(&snippet.content, SNIPPET_CHARS),
            snippet.reference
        );
        if out.len() + line.len() > budget_chars {
            break;
        }
        out.push_str(&line);
    }
    out
}

fn build_prompt(topic: &str, research: &ResearchContext, correction: Option<&str>) -> String {
    let mut prompt = format!(
        r#"Transform the research below into a compelling and logical 7-slide plan for a content-rich presentation on "{topic}".

Slide guide:
- Slide 1 (main title): engaging, captures the core theme.
- Slide 2 (overview): a straightforward title such as "Our Roadmap". Its content is the four key point titles.
- Slides 3-6 (four key points): the core concept or problem, the key factors or causes, the most significant impacts or challenges, then solutions, future trends or legacy.
- Slide 7 (conclusion): a conclusive title such as "The Path Forward".

Rules for titles:
- Be descriptive and specific enough to support 4-6 bullet points.
- Never use generic one-word titles like "Introduction", "Impact" or "Conclusion".
- Key point and conclusion titles use the "Main Title - Subtitle" form and stay under 7 words.
- Return exactly 4 key points.

Context:
{}"#,
        format_context(research, CONTEXT_BUDGET_CHARS)
    );

    if let Some(reason) = correction {
        prompt.push_str(&format!(
            "\n\nYour previous plan was rejected: {}. Fix this and return exactly 4 key points with non-empty titles.",
            reason
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{ScriptedModel, StaticSearch, context_with};
    use crate::types::{GenerationRequest, Snippet};

    const VALID_PLAN: &str = r#"{
        "title": "Powering Tomorrow",
        "overview_title": "Our Roadmap",
        "key_points": [
            "Why It Matters - The Climate Clock",
            "Market Forces - Falling Costs",
            "Grid Impacts - Storage Challenges",
            "What Comes Next - Policy Outlook"
        ],
        "conclusion_title": "The Path Forward - Key Takeaways"
    }"#;

    const THREE_POINT_PLAN: &str = r#"{
        "title": "Powering Tomorrow",
        "overview_title": "Our Roadmap",
        "key_points": ["A - a", "B - b", "C - c"],
        "conclusion_title": "Done - Wrap Up"
    }"#;

    fn research() -> ResearchContext {
        let mut context = ResearchContext::new();
        context.insert(Snippet {
            content: "Solar capacity doubled between 2020 and 2024.".to_string(),
            reference: "https://iea.example/solar".to_string(),
            title: None,
            query: None,
            score: None,
        });
        context
    }

    fn topic() -> Topic {
        GenerationRequest::new("Renewable Energy Trends")
            .validate()
            .unwrap()
    }

    #[test]
    fn test_into_specs_has_fixed_shape() {
        let plan: SlidePlan = serde_json::from_str(VALID_PLAN).unwrap();
        let specs = into_specs(plan, 80).unwrap();

        let kinds: Vec<_> = specs.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, OUTLINE_SHAPE.to_vec());
        assert_eq!(specs[1].talking_points.len(), 4);
        assert_eq!(specs[1].talking_points[0], "Why It Matters - The Climate Clock");
        assert_eq!(specs[6].position, 7);
    }

    #[test]
    fn test_into_specs_rejects_wrong_key_point_count() {
        let plan: SlidePlan = serde_json::from_str(THREE_POINT_PLAN).unwrap();
        assert!(into_specs(plan, 80).is_err());
    }

    #[test]
    fn test_into_specs_rejects_blank_title() {
        let mut plan: SlidePlan = serde_json::from_str(VALID_PLAN).unwrap();
        plan.conclusion_title = "   ".to_string();
        assert!(into_specs(plan, 80).is_err());
    }

    #[test]
    fn test_into_specs_caps_titles() {
        let mut plan: SlidePlan = serde_json::from_str(VALID_PLAN).unwrap();
        plan.title = "A very long presentation title that keeps going and going".to_string();
        let specs = into_specs(plan, 20).unwrap();
        assert!(specs[0].title.chars().count() <= 20);
    }

    #[test]
    fn test_validate_outline_rejects_reordered_kinds() {
        let plan: SlidePlan = serde_json::from_str(VALID_PLAN).unwrap();
        let mut specs = into_specs(plan, 80).unwrap();
        specs.swap(0, 1);
        assert!(validate_outline(&specs).is_err());
    }

    #[test]
    fn test_format_context_respects_budget() {
        let mut context = ResearchContext::new();
        for i in 0..50 {
            context.insert(Snippet {
                content: format!("Fact number {} about renewable energy adoption.", i),
                reference: format!("https://example.com/{}", i),
                title: None,
                query: None,
                score: None,
            });
        }
        let text = format_context(&context, 500);
        assert!(text.len() <= 500);
        assert!(text.starts_with("- Fact number 0"));
    }

    #[tokio::test]
    async fn test_plan_retries_once_with_correction() {
        let model = std::sync::Arc::new(
            ScriptedModel::new()
                .on("7-slide plan", THREE_POINT_PLAN)
                .on("7-slide plan", VALID_PLAN),
        );
        let ctx = context_with(model.clone(), StaticSearch::default());

        let mut retries = Vec::new();
        let specs = OutlinePlanner::new(&ctx)
            .plan_with(&topic(), &research(), &CancellationToken::new(), |attempt, _| {
                retries.push(attempt)
            })
            .await
            .unwrap();

        assert_eq!(specs.len(), 7);
        assert_eq!(retries, vec![2]);
        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].contains("previous plan was rejected"));
    }

    #[tokio::test]
    async fn test_plan_fails_after_retry() {
        let model = ScriptedModel::new().on("7-slide plan", THREE_POINT_PLAN);
        let ctx = context_with(model, StaticSearch::default());

        let err = OutlinePlanner::new(&ctx)
            .plan(&topic(), &research(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Outline(_)));
    }

    #[tokio::test]
    async fn test_plan_requires_context() {
        let ctx = context_with(ScriptedModel::new(), StaticSearch::default());
        let err = OutlinePlanner::new(&ctx)
            .plan(&topic(), &ResearchContext::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Outline(_)));
    }
}
