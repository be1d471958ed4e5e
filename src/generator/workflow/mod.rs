use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::generator::cancellation::CancellationToken;
use crate::generator::content::ContentGenerator;
use crate::generator::context::GeneratorContext;
use crate::generator::error::PipelineError;
use crate::generator::events::{EventEmitter, EventKind, ProgressEvent};
use crate::generator::outlet::{ArtifactRef, DiskOutlet};
use crate::generator::outline::OutlinePlanner;
use crate::generator::query_planner::QueryPlanner;
use crate::generator::research::Researcher;
use crate::llm::{LLMClient, LanguageModel};
use crate::search::TavilyClient;
use crate::types::{GenerationRequest, PresentationContent, SlideContent, Topic};
use crate::utils::text::cap_chars;
use crate::utils::threads::do_parallel_with_limit;

pub mod state;

pub use state::{PipelineStage, RunRegistry, RunState};

/// 各阶段耗时
#[derive(Debug, Clone)]
pub struct StageTimings {
    start_time: Instant,
    phase_start_times: HashMap<PipelineStage, Instant>,
    phase_durations: Vec<(PipelineStage, Duration)>,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimings {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, stage: PipelineStage) {
        self.phase_start_times.insert(stage, Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, stage: PipelineStage) -> Option<Duration> {
        let duration = self.phase_start_times.remove(&stage)?.elapsed();
        self.phase_durations.push((stage, duration));
        Some(duration)
    }

    pub fn total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 按结束顺序排列的阶段耗时
    pub fn phase_durations(&self) -> &[(PipelineStage, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.total_duration().as_secs_f64()
        );

        if !self.phase_durations.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (stage, duration) in &self.phase_durations {
                report.push_str(&format!("- {}: {:.3}秒\n", stage, duration.as_secs_f64()));
            }
        }

        report
    }
}

/// 一次成功运行的结果
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub content: PresentationContent,
    pub artifact: ArtifactRef,
    /// 使用了占位内容的页码
    pub degraded: Vec<usize>,
    pub timings: StageTimings,
}

/// 流水线编排器
///
/// 按 `Planning → Researching → Outlining → GeneratingContent → Assembling` 推进，
/// 每次迁移都发出进度事件。编排器本身可在多个运行之间共享。
pub struct PipelineOrchestrator<M = LLMClient> {
    context: GeneratorContext<M>,
    registry: Arc<RunRegistry>,
}

impl<M: LanguageModel> PipelineOrchestrator<M> {
    pub fn new(context: GeneratorContext<M>) -> Self {
        Self {
            context,
            registry: Arc::new(RunRegistry::new()),
        }
    }

    pub fn registry(&self) -> Arc<RunRegistry> {
        self.registry.clone()
    }

    /// 执行一次生成
    ///
    /// 请求在流水线启动前校验，不合法时直接返回 `Validation` 错误且不发事件。
    /// 取消后不再发出任何事件，返回 `Cancelled`。
    pub async fn run(
        &self,
        request: &GenerationRequest,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let topic = request.validate()?;

        let mut state = RunState::new(
            EventEmitter::new(events, cancel.clone()),
            self.registry.clone(),
        );
        let mut timings = StageTimings::new();
        tracing::info!(run_id = %state.run_id, topic = topic.text(), theme = %topic.theme(), "run started");

        let run_timeout = self.context.config.run_timeout();
        let driven = tokio::time::timeout(
            run_timeout,
            self.drive(&topic, &mut state, &mut timings, &cancel),
        )
        .await;
        let result = match driven {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                stage: state.stage(),
            }),
        };

        if cancel.is_cancelled() {
            tracing::info!(run_id = %state.run_id, stage = %state.stage(), "run cancelled");
            return Err(PipelineError::Cancelled);
        }

        match result {
            Ok((content, artifact)) => {
                state.complete(
                    format!("Presentation ready: {}", artifact.file_name),
                    artifact.path.display().to_string(),
                );
                tracing::info!(
                    run_id = %state.run_id,
                    elapsed_ms = timings.total_duration().as_millis() as u64,
                    "run completed"
                );
                Ok(RunOutcome {
                    run_id: state.run_id,
                    degraded: content.degraded_positions(),
                    content,
                    artifact,
                    timings,
                })
            }
            Err(err) => {
                tracing::error!(run_id = %state.run_id, stage = %state.stage(), error = %err, "run failed");
                state.fail(err.user_message(), err.code());
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        topic: &Topic,
        state: &mut RunState,
        timings: &mut StageTimings,
        cancel: &CancellationToken,
    ) -> Result<(PresentationContent, ArtifactRef), PipelineError> {
        let ctx = &self.context;

        // 查询扩展
        ensure_active(cancel)?;
        state.advance(
            PipelineStage::Planning,
            format!("Expanding \"{}\" into search queries", topic.text()),
        );
        timings.start_phase(PipelineStage::Planning);
        let queries = QueryPlanner::new(ctx).expand(topic, cancel).await?;
        timings.end_phase(PipelineStage::Planning);

        // 调研
        ensure_active(cancel)?;
        state.advance(
            PipelineStage::Researching,
            format!("Searching the web with {} queries", queries.len()),
        );
        timings.start_phase(PipelineStage::Researching);
        let report = Researcher::new(ctx).gather(&queries, cancel).await?;
        timings.end_phase(PipelineStage::Researching);
        ensure_active(cancel)?;
        state.progress(report.summary());
        state.context = Arc::new(report.context);

        // 大纲，形态不合法时回到自身重试
        state.advance(PipelineStage::Outlining, "Planning the slide outline");
        timings.start_phase(PipelineStage::Outlining);
        let research = state.context.clone();
        let specs = OutlinePlanner::new(ctx)
            .plan_with(topic, &research, cancel, |_, reason| {
                let attempt = state.outline_attempts() + 1;
                state.advance(
                    PipelineStage::Outlining,
                    format!(
                        "Outline rejected ({}), retrying (attempt {})",
                        cap_chars(reason, 120),
                        attempt
                    ),
                );
            })
            .await?;
        tracing::debug!(run_id = %state.run_id, attempts = state.outline_attempts(), "outline accepted");
        timings.end_phase(PipelineStage::Outlining);

        // 逐页生成，全部完成或降级后才进入下一阶段
        ensure_active(cancel)?;
        state.advance(
            PipelineStage::GeneratingContent,
            format!("Writing content for {} slides", specs.len()),
        );
        timings.start_phase(PipelineStage::GeneratingContent);
        let generator = ContentGenerator::new(ctx);
        let generations = specs
            .iter()
            .map(|spec| generator.generate(topic, spec, &research, cancel))
            .collect::<Vec<_>>();
        let results = do_parallel_with_limit(generations, ctx.config.max_parallels).await;
        ensure_active(cancel)?;

        for (spec, result) in specs.iter().zip(results) {
            match result {
                Ok(content) => state.slides.push(content),
                Err(e) => {
                    tracing::warn!(run_id = %state.run_id, error = %e, "slide degraded to placeholder");
                    state.degraded(format!(
                        "Slide {} \"{}\" could not be generated and uses placeholder content",
                        spec.position, spec.title
                    ));
                    state.slides.push(SlideContent::placeholder(spec.clone()));
                }
            }
        }
        let degraded = state.slides.iter().filter(|s| s.degraded).count();
        state.progress(format!(
            "Generated {} of {} slides",
            state.slides.len() - degraded,
            state.slides.len()
        ));
        timings.end_phase(PipelineStage::GeneratingContent);

        // 组装
        ensure_active(cancel)?;
        state.advance(PipelineStage::Assembling, "Assembling the presentation");
        timings.start_phase(PipelineStage::Assembling);
        let content = PresentationContent {
            topic: topic.text().to_string(),
            author: topic.author().map(str::to_string),
            theme: topic.theme(),
            slides: state.slides.clone(),
        };
        let artifact = ctx
            .guarded(cancel, ctx.assembler.assemble(&content))
            .await
            .map_err(|e| PipelineError::Assembly(e.to_string()))?;
        timings.end_phase(PipelineStage::Assembling);

        Ok((content, artifact))
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// 组装生产协作方并执行一次生成，Ctrl-C 视为取消
pub async fn launch(config: &Config, request: GenerationRequest) -> Result<RunOutcome> {
    // 请求不合法时不必连接任何服务
    request.validate()?;

    let llm_client = LLMClient::new(config.llm.clone())?;
    // 启动时检查模型连接
    llm_client.check_connection().await?;
    let search = TavilyClient::new(config.search.clone())?;
    let outlet = DiskOutlet::new(&config.output);

    let context = GeneratorContext::new(
        Arc::new(llm_client),
        Arc::new(search),
        Arc::new(outlet),
        config.pipeline.clone(),
    );
    let orchestrator = Arc::new(PipelineOrchestrator::new(context));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let mut run = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(&request, tx, cancel).await })
    };
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let joined = tokio::select! {
        joined = &mut run => joined,
        _ = tokio::signal::ctrl_c() => {
            println!("\n⚠️ 收到中断信号，正在取消本次生成...");
            cancel.cancel();
            run.await
        }
    };
    let _ = printer.await;

    let outcome = joined.map_err(|e| anyhow!("generation task aborted: {}", e))??;
    if !outcome.degraded.is_empty() {
        println!(
            "⚠️ 以下页面使用了占位内容: {:?}",
            outcome.degraded
        );
    }
    if config.verbose {
        println!("\n{}", outcome.timings.generate_timing_report());
    }
    Ok(outcome)
}

fn print_event(event: &ProgressEvent) {
    match event.kind {
        EventKind::Transition => println!("\n🔄 [{}] {}", event.stage, event.message),
        EventKind::Progress => println!("   ↳ {}", event.message),
        EventKind::Degraded => println!("⚠️ {}", event.message),
        EventKind::Completed => {
            println!("\n✅ {}", event.message);
            if let Some(download) = &event.download {
                println!("💾 {}", download);
            }
        }
        EventKind::Failed => println!(
            "\n❌ {} ({})",
            event.message,
            event.error_code.as_deref().unwrap_or("unknown_error")
        ),
    }
}
