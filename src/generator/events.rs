//! # Progress Events
//!
//! 每次运行推送给订阅方的进度事件。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::generator::cancellation::CancellationToken;
use crate::generator::workflow::state::PipelineStage;

/// 事件类别，用于区分“进行中”、“某页降级”和终态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 状态迁移
    Transition,
    /// 阶段内部的进展
    Progress,
    /// 某页内容已降级为占位内容
    Degraded,
    /// 运行成功，携带下载引用
    Completed,
    /// 运行失败，携带错误原因
    Failed,
}

/// 一条进度事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub sequence_number: u64,
    pub stage: PipelineStage,
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// 成功事件的下载引用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    /// 失败事件的错误码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Completed | EventKind::Failed)
    }
}

/// 单次运行的事件发送端
///
/// 序号只在这里递增；所有事件都由运行所在的任务依次发出，
/// 因而与状态迁移顺序一致。取消之后不再投递任何事件。
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancellationToken,
    next_sequence: u64,
}

impl EventEmitter {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            next_sequence: 1,
        }
    }

    /// 已发出的事件数
    pub fn emitted(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn emit(&mut self, stage: PipelineStage, kind: EventKind, message: impl Into<String>) {
        self.emit_with(stage, kind, message.into(), None, None);
    }

    pub fn completed(&mut self, message: impl Into<String>, download: String) {
        self.emit_with(
            PipelineStage::Completed,
            EventKind::Completed,
            message.into(),
            Some(download),
            None,
        );
    }

    pub fn failed(&mut self, message: impl Into<String>, error_code: &str) {
        self.emit_with(
            PipelineStage::Failed,
            EventKind::Failed,
            message.into(),
            None,
            Some(error_code.to_string()),
        );
    }

    fn emit_with(
        &mut self,
        stage: PipelineStage,
        kind: EventKind,
        message: String,
        download: Option<String>,
        error_code: Option<String>,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }

        let event = ProgressEvent {
            sequence_number: self.next_sequence,
            stage,
            kind,
            message,
            timestamp: Utc::now(),
            download,
            error_code,
        };
        self.next_sequence += 1;

        if self.tx.send(event).is_err() {
            // 订阅方已断开，视同取消
            tracing::debug!("progress subscriber disconnected, cancelling run");
            self.cancel.cancel();
        }
    }
}
