use std::future::Future;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::config::PipelineConfig;
use crate::generator::cancellation::CancellationToken;
use crate::generator::outlet::Assembler;
use crate::llm::{LLMClient, LanguageModel};
use crate::search::SearchProvider;

/// 协作方调用被取消时的错误文本
pub const CALL_CANCELLED: &str = "call skipped because the run was cancelled";

/// 生成器上下文，持有注入的协作方与流水线参数，可被多个运行共享
///
/// 语言模型以类型参数注入，结构化输出需要按目标类型单态化。
pub struct GeneratorContext<M = LLMClient> {
    /// 语言模型协作方
    pub llm: Arc<M>,
    /// 搜索协作方
    pub search: Arc<dyn SearchProvider>,
    /// 组装协作方
    pub assembler: Arc<dyn Assembler>,
    /// 流水线参数
    pub config: PipelineConfig,
}

impl<M> Clone for GeneratorContext<M> {
    fn clone(&self) -> Self {
        Self {
            llm: self.llm.clone(),
            search: self.search.clone(),
            assembler: self.assembler.clone(),
            config: self.config.clone(),
        }
    }
}

impl<M: LanguageModel> GeneratorContext<M> {
    pub fn new(
        llm: Arc<M>,
        search: Arc<dyn SearchProvider>,
        assembler: Arc<dyn Assembler>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            search,
            assembler,
            config,
        }
    }

    /// 在超时与取消的约束下执行一次协作方调用
    ///
    /// 已取消时不再发起调用；调用途中被取消则丢弃其结果。
    pub async fn guarded<T, F>(&self, cancel: &CancellationToken, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(anyhow!(CALL_CANCELLED));
        }

        let timeout = self.config.call_timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(anyhow!(CALL_CANCELLED)),
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(anyhow!("call timed out after {}s", timeout.as_secs())),
            },
        }
    }
}
