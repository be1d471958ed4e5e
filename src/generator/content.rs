//! 逐页内容生成

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::config::PipelineConfig;
use crate::generator::cancellation::CancellationToken;
use crate::generator::context::GeneratorContext;
use crate::generator::error::ContentError;
use crate::llm::LanguageModel;
use crate::types::{ResearchContext, SlideContent, SlideKind, SlideSpec, Snippet, Topic};
use crate::utils::text::{cap_chars, keywords};

const SYSTEM_PROMPT: &str =
    "You write concise, fact-based presentation slides. Use only the facts you are given.";

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+•](?:\s+|$)|\d{1,2}[.)](?:\s+|$))").expect("list marker pattern is valid")
});

/// 模型输出的单页内容
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct GeneratedSlide {
    /// Bullet points; indent a line with two spaces to make it a sub-point
    pub bullets: Vec<String>,
    /// 1-2 source URLs taken from the context
    #[serde(default)]
    pub references: Vec<String>,
}

pub struct ContentGenerator<'a, M> {
    context: &'a GeneratorContext<M>,
}

impl<'a, M: LanguageModel> ContentGenerator<'a, M> {
    pub fn new(context: &'a GeneratorContext<M>) -> Self {
        Self { context }
    }

    /// 为一页生成内容；失败只影响这一页
    pub async fn generate(
        &self,
        topic: &Topic,
        spec: &SlideSpec,
        research: &ResearchContext,
        cancel: &CancellationToken,
    ) -> Result<SlideContent, ContentError> {
        let config = &self.context.config;

        if spec.kind == SlideKind::Agenda
            && let Some(content) = agenda_from_talking_points(spec, config)
        {
            return Ok(content);
        }

        let snippets = select_snippets(spec, research, config.snippets_per_slide);
        let prompt = build_prompt(topic.text(), spec, &snippets, config);
        let attempts = config.content_retries + 1;
        let mut reason = String::new();

        for attempt in 1..=attempts {
            let llm = self.context.llm.as_ref();
            let result = self
                .context
                .guarded(cancel, llm.extract::<GeneratedSlide>(SYSTEM_PROMPT, &prompt))
                .await;

            match result {
                Ok(generated) => {
                    let bullets =
                        clean_bullets(&generated.bullets, config.max_bullet_chars, config.max_bullets);
                    if bullets.len() >= config.min_bullets {
                        let references = choose_references(
                            &generated.references,
                            &snippets,
                            research,
                            config.max_references,
                        );
                        return Ok(SlideContent {
                            spec: spec.clone(),
                            bullets,
                            references,
                            degraded: false,
                        });
                    }
                    reason = format!(
                        "only {} usable bullets, need at least {}",
                        bullets.len(),
                        config.min_bullets
                    );
                }
                Err(e) => reason = e.to_string(),
            }

            tracing::warn!(position = spec.position, attempt, reason = %reason, "slide generation rejected");
            if cancel.is_cancelled() {
                break;
            }
        }

        Err(ContentError {
            position: spec.position,
            title: spec.title.clone(),
            reason,
        })
    }
}

/// 议程页直接由各要点标题组成，不调用模型
fn agenda_from_talking_points(spec: &SlideSpec, config: &PipelineConfig) -> Option<SlideContent> {
    let bullets = clean_bullets(&spec.talking_points, config.max_bullet_chars, config.max_bullets);
    if bullets.len() < config.min_bullets || bullets.len() != spec.talking_points.len() {
        return None;
    }
    Some(SlideContent {
        spec: spec.clone(),
        bullets,
        references: Vec::new(),
        degraded: false,
    })
}

/// 清理单条要点：去掉列表符号与首尾空白并截断；两个空格缩进的子要点保留缩进
pub fn clean_bullet(raw: &str, max_chars: usize) -> Option<String> {
    let is_sub_point = raw.starts_with("  ") || raw.starts_with('\t');
    let text = raw.trim();
    let text = LIST_MARKER.replace(text, "");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if is_sub_point {
        Some(format!("  {}", cap_chars(text, max_chars.saturating_sub(2))))
    } else {
        Some(cap_chars(text, max_chars))
    }
}

/// 清理全部要点，多行要点按行拆开，最多保留 `max_bullets` 条
pub fn clean_bullets(raw: &[String], max_chars: usize, max_bullets: usize) -> Vec<String> {
    let mut bullets: Vec<String> = raw
        .iter()
        .flat_map(|bullet| bullet.lines())
        .filter_map(|line| clean_bullet(line, max_chars))
        .take(max_bullets)
        .collect();

    // 子要点不能打头
    if let Some(first) = bullets.first_mut()
        && first.starts_with("  ")
    {
        *first = first.trim_start().to_string();
    }
    bullets
}

/// 为一页挑选上下文片段
///
/// 要点页按与标题的关键词重合度排序，同分时按搜索相关度；封面与结论页轮流取各查询的结果以覆盖面优先。
pub fn select_snippets<'c>(
    spec: &SlideSpec,
    research: &'c ResearchContext,
    limit: usize,
) -> Vec<&'c Snippet> {
    match spec.kind {
        SlideKind::KeyPoint | SlideKind::Agenda => {
            let wanted = keywords(&spec.title);
            let mut scored: Vec<(usize, &Snippet)> = research
                .snippets()
                .iter()
                .map(|snippet| {
                    let mut words = keywords(&snippet.content);
                    if let Some(title) = &snippet.title {
                        words.extend(keywords(title));
                    }
                    (wanted.intersection(&words).count(), snippet)
                })
                .collect();
            // 稳定排序，重合度与相关度都相同时保持原顺序
            scored.sort_by(|a, b| {
                b.0.cmp(&a.0)
                    .then_with(|| relevance(b.1).total_cmp(&relevance(a.1)))
            });
            scored.into_iter().take(limit).map(|(_, s)| s).collect()
        }
        SlideKind::Title | SlideKind::Conclusion => broadest(research, limit),
    }
}

fn relevance(snippet: &Snippet) -> f64 {
    snippet.score.unwrap_or(0.0)
}

fn broadest(research: &ResearchContext, limit: usize) -> Vec<&Snippet> {
    let mut order: Vec<Option<&str>> = Vec::new();
    let mut groups: HashMap<Option<&str>, Vec<&Snippet>> = HashMap::new();
    for snippet in research.snippets() {
        let key = snippet.query.as_deref();
        if !groups.contains_key(&key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(snippet);
    }

    let mut picked = Vec::with_capacity(limit);
    let mut round = 0;
    while picked.len() < limit {
        let mut any = false;
        for key in &order {
            if let Some(snippet) = groups.get(key).and_then(|g| g.get(round)) {
                any = true;
                if picked.len() < limit {
                    picked.push(*snippet);
                }
            }
        }
        if !any {
            break;
        }
        round += 1;
    }
    picked
}

/// 只保留确实出现在调研上下文中的来源；模型未给出时退回到所用片段的来源
pub fn choose_references(
    proposed: &[String],
    snippets: &[&Snippet],
    research: &ResearchContext,
    max_references: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut references: Vec<String> = proposed
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| research.contains_reference(r))
        .filter(|r| seen.insert(r.clone()))
        .take(max_references)
        .collect();

    if references.is_empty() {
        references = snippets
            .iter()
            .map(|s| s.reference.trim().to_string())
            .filter(|r| !r.is_empty())
            .filter(|r| seen.insert(r.clone()))
            .take(max_references)
            .collect();
    }
    references
}

fn build_prompt(
    topic: &str,
    spec: &SlideSpec,
    snippets: &[&Snippet],
    config: &PipelineConfig,
) -> String {
    let facts = if snippets.is_empty() {
        "(no facts available)".to_string()
    } else {
        snippets
            .iter()
            .map(|s| format!("- {} [Source: {}]", cap_chars(&s.content, 600), s.reference))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let (min, max) = (config.min_bullets, config.max_bullets);
    let title = &spec.title;

    let task = match spec.kind {
        SlideKind::Title => format!(
            "Write {min}-{max} short framing lines for the opening slide: what the audience will learn and why it matters now."
        ),
        SlideKind::Agenda => {
            format!("Write {min}-{max} bullet points listing the sections of the presentation.")
        }
        SlideKind::KeyPoint => format!(
            "Write {min}-{max} bullet points based only on the facts below.\n\
             - Synthesize: combine related facts into one insightful bullet instead of listing them.\n\
             - Use the \"main phrase - clarifying detail\" form, 15-20 words per bullet.\n\
             - Wrap the main phrase in **bold** and important names or terms in __underline__.\n\
             - Indent a line with two spaces to make it a sub-point of the previous bullet."
        ),
        SlideKind::Conclusion => format!(
            "Write {min}-{max} declarative summary statements of 13-16 words each that capture the main findings.\n\
             - Do not give instructions, suggestions or calls to action.\n\
             - Wrap key terms in **bold** and important names in __underline__."
        ),
    };

    let role = match spec.kind {
        SlideKind::Title => "opening",
        SlideKind::Agenda => "overview",
        SlideKind::KeyPoint => "key point",
        SlideKind::Conclusion => "closing",
    };

    format!(
        "You are creating the {role} slide titled \"{title}\" for a presentation on \"{topic}\".\n\n{task}\n\
         Each bullet must stay under {} characters. Select the 1-2 most relevant source URLs from the facts as references.\n\n\
         Facts:\n{facts}",
        config.max_bullet_chars
    )
}
