//! 流水线状态机与单次运行的状态

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::generator::events::{EventEmitter, EventKind};
use crate::types::{ResearchContext, SlideContent};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    /// 主题扩展为查询
    Planning,
    /// 执行搜索、汇总上下文
    Researching,
    /// 规划大纲，允许一次自循环用于纠正重试
    Outlining,
    /// 逐页生成内容
    GeneratingContent,
    /// 交给组装方生成文件
    Assembling,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    /// 在前进方向上的序号，用于校验事件顺序
    pub fn ordinal(&self) -> u8 {
        match self {
            PipelineStage::Idle => 0,
            PipelineStage::Planning => 1,
            PipelineStage::Researching => 2,
            PipelineStage::Outlining => 3,
            PipelineStage::GeneratingContent => 4,
            PipelineStage::Assembling => 5,
            PipelineStage::Completed | PipelineStage::Failed => 6,
        }
    }

    /// 状态迁移函数：只允许向前，`Outlining` 可以回到自身，任何非终态都可以失败
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Planning)
            | (Planning, Researching)
            | (Researching, Outlining)
            | (Outlining, Outlining)
            | (Outlining, GeneratingContent)
            | (GeneratingContent, Assembling)
            | (Assembling, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Planning => "planning",
            PipelineStage::Researching => "researching",
            PipelineStage::Outlining => "outlining",
            PipelineStage::GeneratingContent => "generating_content",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{}", str)
    }
}

/// 存活运行计数
///
/// 每个 [`RunState`] 创建时加一、析构时减一，用于观察运行结束后状态是否被释放。
#[derive(Debug, Default)]
pub struct RunRegistry {
    live: AtomicUsize,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_runs(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct RegistryGuard(Arc<RunRegistry>);

impl RegistryGuard {
    fn acquire(registry: Arc<RunRegistry>) -> Self {
        registry.live.fetch_add(1, Ordering::SeqCst);
        Self(registry)
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 单次运行独占的状态
pub struct RunState {
    pub run_id: Uuid,
    stage: PipelineStage,
    outline_attempts: u32,
    /// 调研结束后只读
    pub context: Arc<ResearchContext>,
    pub slides: Vec<SlideContent>,
    pub(crate) emitter: EventEmitter,
    _guard: RegistryGuard,
}

impl RunState {
    pub fn new(emitter: EventEmitter, registry: Arc<RunRegistry>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stage: PipelineStage::Idle,
            outline_attempts: 0,
            context: Arc::new(ResearchContext::new()),
            slides: Vec::new(),
            emitter,
            _guard: RegistryGuard::acquire(registry),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn outline_attempts(&self) -> u32 {
        self.outline_attempts
    }

    /// 迁移到下一阶段并发出迁移事件
    pub fn advance(&mut self, next: PipelineStage, message: impl Into<String>) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        if !self.stage.can_advance_to(next) {
            tracing::error!(run_id = %self.run_id, from = %self.stage, to = %next, "illegal stage transition");
            return;
        }

        if next == PipelineStage::Outlining {
            self.outline_attempts += 1;
        }
        tracing::info!(run_id = %self.run_id, from = %self.stage, to = %next, "stage transition");
        self.stage = next;
        self.emitter.emit(next, EventKind::Transition, message);
    }

    /// 当前阶段内的进展
    pub fn progress(&mut self, message: impl Into<String>) {
        self.emitter.emit(self.stage, EventKind::Progress, message);
    }

    /// 某页已降级为占位内容
    pub fn degraded(&mut self, message: impl Into<String>) {
        self.emitter.emit(self.stage, EventKind::Degraded, message);
    }

    pub fn complete(&mut self, message: impl Into<String>, download: String) {
        if !self.stage.can_advance_to(PipelineStage::Completed) {
            tracing::error!(run_id = %self.run_id, from = %self.stage, "cannot complete from this stage");
            return;
        }
        self.stage = PipelineStage::Completed;
        self.emitter.completed(message, download);
    }

    pub fn fail(&mut self, message: impl Into<String>, error_code: &str) {
        if self.stage.is_terminal() {
            return;
        }
        tracing::warn!(run_id = %self.run_id, stage = %self.stage, error_code, "run failed");
        self.stage = PipelineStage::Failed;
        self.emitter.failed(message, error_code);
    }
}
