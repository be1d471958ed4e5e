use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::utils::text::normalize;

/// 由主题推导出的一条搜索查询
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 检索得到的一段上下文片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub content: String,
    /// 来源引用，通常是URL
    pub reference: String,
    #[serde(default)]
    pub title: Option<String>,
    /// 产生该片段的查询
    #[serde(default)]
    pub query: Option<String>,
    /// 搜索服务给出的相关度，越大越相关
    #[serde(default)]
    pub score: Option<f64>,
}

/// 一次运行内去重后的调研上下文
///
/// 只允许追加；按规范化文本去重，同一来源引用也只保留首个片段。
/// 插入顺序不具备语义，成员关系才是。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchContext {
    snippets: Vec<Snippet>,
    #[serde(skip)]
    seen_text: HashSet<String>,
    #[serde(skip)]
    seen_references: HashSet<String>,
}

impl ResearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入片段，若已存在等价片段则返回false
    pub fn insert(&mut self, snippet: Snippet) -> bool {
        let key = normalize(&snippet.content);
        if key.is_empty() || self.seen_text.contains(&key) {
            return false;
        }

        let reference = snippet.reference.trim().to_string();
        if !reference.is_empty() && self.seen_references.contains(&reference) {
            return false;
        }

        self.seen_text.insert(key);
        if !reference.is_empty() {
            self.seen_references.insert(reference);
        }
        self.snippets.push(snippet);
        true
    }

    pub fn extend<I: IntoIterator<Item = Snippet>>(&mut self, snippets: I) -> usize {
        snippets
            .into_iter()
            .filter(|snippet| self.insert(snippet.clone()))
            .count()
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn contains_reference(&self, reference: &str) -> bool {
        self.seen_references.contains(reference.trim())
    }
}
