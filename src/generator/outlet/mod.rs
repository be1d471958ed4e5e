//! 组装协作方：把演示内容写成可下载的文件

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{OutputConfig, OutputFormat};
use crate::types::{PresentationContent, SlideContent, SlideKind};
use crate::utils::text::safe_file_stem;

/// 组装结果的下载引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub file_name: String,
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// 组装协作方接口
#[async_trait]
pub trait Assembler: Send + Sync {
    async fn assemble(&self, content: &PresentationContent) -> Result<ArtifactRef>;
}

/// 写入本地目录的组装实现
pub struct DiskOutlet {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl DiskOutlet {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            format: config.format,
        }
    }

    /// `{safe_topic}_{theme}.{ext}`
    pub fn file_name(&self, content: &PresentationContent) -> String {
        format!(
            "{}_{}.{}",
            safe_file_stem(&content.topic),
            content.theme.identifier(),
            self.format.extension()
        )
    }
}

#[async_trait]
impl Assembler for DiskOutlet {
    async fn assemble(&self, content: &PresentationContent) -> Result<ArtifactRef> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context(format!(
                "Failed to create output directory {:?}",
                self.output_dir
            ))?;

        let file_name = self.file_name(content);
        let path = self.output_dir.join(&file_name);
        let body = match self.format {
            OutputFormat::Markdown => render_markdown(content),
            OutputFormat::Json => serde_json::to_string_pretty(content)?,
        };

        tokio::fs::write(&path, body)
            .await
            .context(format!("Failed to write deck to {:?}", path))?;
        tracing::info!(path = %path.display(), slides = content.slides.len(), "deck written");

        Ok(ArtifactRef { path, file_name })
    }
}

/// 渲染为以 `---` 分隔的 Markdown 幻灯片
pub fn render_markdown(content: &PresentationContent) -> String {
    let mut sections = Vec::with_capacity(content.slides.len() + 2);

    let mut cover = format!("# {}\n", content.topic);
    if let Some(author) = &content.author {
        cover.push_str(&format!("\nPresented by {}\n", author));
    }
    cover.push_str(&format!("\n<!-- theme: {} -->\n", content.theme.identifier()));
    sections.push(cover);

    for slide in &content.slides {
        sections.push(render_slide(slide));
    }

    sections.push("# Thank You\n\nQuestions & Discussion\n".to_string());
    sections.join("\n---\n\n")
}

fn render_slide(slide: &SlideContent) -> String {
    let heading = match slide.spec.kind {
        SlideKind::Title => "#",
        _ => "##",
    };
    let mut section = format!("{} {}\n\n", heading, slide.spec.title);

    for bullet in &slide.bullets {
        // 两个空格缩进的是子要点
        match bullet.strip_prefix("  ") {
            Some(sub) => section.push_str(&format!("  - {}\n", sub.trim_start())),
            None => section.push_str(&format!("- {}\n", bullet)),
        }
    }

    if !slide.references.is_empty() {
        section.push_str("\nSources:\n");
        for reference in &slide.references {
            section.push_str(&format!("- <{}>\n", reference));
        }
    }
    section
}
