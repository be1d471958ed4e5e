//! 流水线错误分类
//!
//! 协作方接口统一返回 `anyhow::Result`，进入流水线后再归入这里的分类。
//! `Display` 文本包含内部细节，只写日志；面向用户的文本使用 [`PipelineError::user_message`]。

use thiserror::Error;

use crate::generator::workflow::state::PipelineStage;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 请求不合法，流水线尚未启动
    #[error("invalid request: {0}")]
    Validation(String),

    /// 查询扩展失败
    #[error("query planning failed: {0}")]
    Planning(String),

    /// 所有查询都失败
    #[error("research failed: {0}")]
    Research(String),

    /// 纠正重试后大纲形态仍不合法
    #[error("outline planning failed: {0}")]
    Outline(String),

    /// 组装方未能生成文件
    #[error("assembly failed: {0}")]
    Assembly(String),

    /// 阶段或整次运行超时
    #[error("{stage} exceeded its deadline")]
    Timeout { stage: PipelineStage },

    /// 调用方取消
    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation_error",
            PipelineError::Planning(_) => "planning_error",
            PipelineError::Research(_) => "research_error",
            PipelineError::Outline(_) => "outline_error",
            PipelineError::Assembly(_) => "assembly_error",
            PipelineError::Timeout { .. } => "timeout_error",
            PipelineError::Cancelled => "cancelled_error",
        }
    }

    /// 面向用户的说明，不含协作方的原始错误
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(reason) => format!("The request was rejected: {}", reason),
            PipelineError::Planning(_) => {
                "Could not turn the topic into search queries.".to_string()
            }
            PipelineError::Research(_) => {
                "No web research could be gathered for this topic.".to_string()
            }
            PipelineError::Outline(_) => {
                "Could not plan a valid slide outline for this topic.".to_string()
            }
            PipelineError::Assembly(_) => "The slide deck file could not be created.".to_string(),
            PipelineError::Timeout { stage } => {
                format!("The run took too long and was stopped during {}.", stage)
            }
            PipelineError::Cancelled => "The run was cancelled.".to_string(),
        }
    }
}

/// 单页内容生成失败，只影响该页，由编排器降级处理
#[derive(Debug, Error)]
#[error("slide {position} ({title}): {reason}")]
pub struct ContentError {
    pub position: usize,
    pub title: String,
    pub reason: String,
}
