//! 单元测试用的脚本化协作方

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::generator::context::GeneratorContext;
use crate::generator::outlet::{ArtifactRef, Assembler};
use crate::llm::LanguageModel;
use crate::search::{SearchHit, SearchProvider};
use crate::types::PresentationContent;

#[derive(Clone)]
enum Reply {
    Text(String),
    Fail(String),
    Hang,
}

struct Rule {
    needle: String,
    replies: Mutex<VecDeque<Reply>>,
}

/// 按用户提示词中的片段匹配脚本化回复
///
/// 回复是模型提交的 JSON 参数，按目标类型反序列化，不合法时与真实 Extractor 一样报错。
/// 同一片段注册多次时按顺序回复，最后一条会被重复使用。
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<Rule>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, reply: &str) -> Self {
        self.push(needle, Reply::Text(reply.to_string()))
    }

    pub fn fail(self, needle: &str, reason: &str) -> Self {
        self.push(needle, Reply::Fail(reason.to_string()))
    }

    /// 调用永不返回，用于超时与取消
    pub fn hang(self, needle: &str) -> Self {
        self.push(needle, Reply::Hang)
    }

    fn push(mut self, needle: &str, reply: Reply) -> Self {
        if let Some(index) = self.rules.iter().position(|rule| rule.needle == needle) {
            self.rules[index].replies.lock().unwrap().push_back(reply);
        } else {
            self.rules.push(Rule {
                needle: needle.to_string(),
                replies: Mutex::new(VecDeque::from([reply])),
            });
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn extract<T>(&self, _system_prompt: &str, user_prompt: &str) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        self.calls.lock().unwrap().push(user_prompt.to_string());

        let reply = self
            .rules
            .iter()
            .find(|rule| user_prompt.contains(&rule.needle))
            .map(|rule| {
                let mut replies = rule.replies.lock().unwrap();
                if replies.len() > 1 {
                    replies.pop_front().unwrap()
                } else {
                    replies.front().cloned().unwrap()
                }
            });

        match reply {
            Some(Reply::Text(text)) => serde_json::from_str(&text)
                .map_err(|e| anyhow!("extraction failed: {}", e)),
            Some(Reply::Fail(reason)) => Err(anyhow!(reason)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(anyhow!("hung call returned"))
            }
            None => Err(anyhow!("no scripted reply for prompt")),
        }
    }
}

/// 固定结果的搜索协作方，按查询中的片段匹配
#[derive(Default)]
pub struct StaticSearch {
    responses: Vec<(String, Result<Vec<SearchHit>, String>)>,
    fallback: Option<Vec<SearchHit>>,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn on(mut self, needle: &str, hits: Vec<SearchHit>) -> Self {
        self.responses.push((needle.to_lowercase(), Ok(hits)));
        self
    }

    pub fn fail_on(mut self, needle: &str, reason: &str) -> Self {
        self.responses
            .push((needle.to_lowercase(), Err(reason.to_string())));
        self
    }

    pub fn fallback(mut self, hits: Vec<SearchHit>) -> Self {
        self.fallback = Some(hits);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query = query.to_lowercase();

        if let Some((_, response)) = self
            .responses
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
        {
            return response.clone().map_err(|reason| anyhow!(reason));
        }

        self.fallback
            .clone()
            .ok_or_else(|| anyhow!("search backend unavailable"))
    }
}

/// 记录收到的内容，不落盘
#[derive(Default)]
pub struct MemoryAssembler {
    pub received: Mutex<Option<PresentationContent>>,
    pub fail: bool,
}

#[async_trait]
impl Assembler for MemoryAssembler {
    async fn assemble(&self, content: &PresentationContent) -> Result<ArtifactRef> {
        if self.fail {
            return Err(anyhow!("disk full"));
        }
        *self.received.lock().unwrap() = Some(content.clone());
        Ok(ArtifactRef {
            path: PathBuf::from("memory/deck.md"),
            file_name: "deck.md".to_string(),
        })
    }
}

pub fn hit(content: &str, url: &str) -> SearchHit {
    SearchHit::new(content, url)
}

pub fn context_with(
    model: impl Into<Arc<ScriptedModel>>,
    search: impl Into<Arc<StaticSearch>>,
) -> GeneratorContext<ScriptedModel> {
    let model: Arc<ScriptedModel> = model.into();
    let search: Arc<StaticSearch> = search.into();
    GeneratorContext::new(
        model,
        search,
        Arc::new(MemoryAssembler::default()),
        PipelineConfig::default(),
    )
}
