//! Staged, streaming orchestration of a repository analysis.
//!
//! A run moves through `Source → Metrics → StaticScan → AssistedScan → Enrich → Rank`.
//! Every stage's blocking work runs on a worker while the coordinator keeps emitting
//! events; the stream always ends with exactly one `Result` or `Error`.

use crate::analyzer::report::{AnalysisReport, Finding, Metrics};
use crate::analyzer::{self, metrics, RuleContext, StopFlag};
use crate::assisted;
use crate::config::{AnalysisConfig, RankingOrder};
use crate::enricher::Enricher;
use crate::error::{Result, ScanError};
use crate::gateway::{ContentGenerator, Gateway};
use crate::guidelines::Guidelines;
use crate::source::{SourceProvider, SourceTree};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Progress message emitted when a stage runs longer than the heartbeat interval.
pub const KEEPALIVE_MESSAGE: &str = "Analysis in progress...";

const EVENT_BUFFER: usize = 64;

/// One item of the analysis event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { message: String },
    Metrics { data: Metrics },
    Finding { data: Finding },
    Result { report: AnalysisReport },
    Error { message: String },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Result { .. } | PipelineEvent::Error { .. })
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Source,
    Metrics,
    StaticScan,
    AssistedScan,
    Enrich,
    Rank,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Source => "source",
            Stage::Metrics => "metrics",
            Stage::StaticScan => "static scan",
            Stage::AssistedScan => "assisted scan",
            Stage::Enrich => "enrichment",
            Stage::Rank => "ranking",
        }
    }
}

/// Order findings by descending weight, then by severity per `order`.
///
/// The sort is stable: findings equal on both keys keep their input order.
pub fn rank(mut findings: Vec<Finding>, order: RankingOrder) -> Vec<Finding> {
    findings.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| compare_severity(a, b, order))
    });
    findings
}

fn compare_severity(a: &Finding, b: &Finding, order: RankingOrder) -> Ordering {
    match order {
        RankingOrder::Urgency => b.severity.cmp(&a.severity),
        RankingOrder::Lexical => a.severity.as_str().cmp(b.severity.as_str()),
    }
}

/// Receiving end of a pipeline run. Dropping it cancels the run.
pub struct EventStream {
    rx: mpsc::Receiver<PipelineEvent>,
}

impl EventStream {
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        self.rx.recv().await
    }

    /// Drain the stream until it terminates.
    pub async fn collect(mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

/// Why a run stopped before producing a result.
enum Halt {
    Cancelled,
    Failed(ScanError),
}

impl From<ScanError> for Halt {
    fn from(e: ScanError) -> Self {
        Halt::Failed(e)
    }
}

enum Step<T> {
    Finished(std::result::Result<Result<T>, tokio::task::JoinError>),
    Heartbeat,
    Closed,
}

/// Owns the sending side and the heartbeat clock.
struct Coordinator {
    tx: mpsc::Sender<PipelineEvent>,
    heartbeat: Duration,
    last_progress: Instant,
}

impl Coordinator {
    fn new(tx: mpsc::Sender<PipelineEvent>, heartbeat: Duration) -> Self {
        Self {
            tx,
            heartbeat,
            last_progress: Instant::now(),
        }
    }

    async fn emit(&mut self, event: PipelineEvent) -> std::result::Result<(), Halt> {
        if matches!(event, PipelineEvent::Progress { .. }) {
            self.last_progress = Instant::now();
        }
        self.tx.send(event).await.map_err(|_| Halt::Cancelled)
    }

    async fn progress(&mut self, message: impl Into<String>) -> std::result::Result<(), Halt> {
        let message = message.into();
        tracing::info!(%message, "progress");
        self.emit(PipelineEvent::Progress { message }).await
    }

    /// Wait for a stage's worker, emitting keepalives while it runs.
    async fn await_stage<T>(
        &mut self,
        stage: Stage,
        mut handle: JoinHandle<Result<T>>,
    ) -> std::result::Result<T, Halt> {
        loop {
            let deadline = self.last_progress + self.heartbeat;
            let step = tokio::select! {
                biased;
                joined = &mut handle => Step::Finished(joined),
                _ = self.tx.closed() => Step::Closed,
                _ = tokio::time::sleep_until(deadline) => Step::Heartbeat,
            };

            match step {
                Step::Finished(Ok(result)) => return result.map_err(Halt::Failed),
                Step::Finished(Err(join)) => {
                    return Err(Halt::Failed(ScanError::Stage {
                        stage: stage.label(),
                        message: join.to_string(),
                    }))
                }
                Step::Heartbeat => self.progress(KEEPALIVE_MESSAGE).await?,
                Step::Closed => {
                    tracing::info!(stage = stage.label(), "event stream closed, cancelling");
                    handle.abort();
                    return Err(Halt::Cancelled);
                }
            }
        }
    }
}

/// A configured analysis pipeline; `run` may be called once per source tree.
#[derive(Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
    guidelines: Arc<Guidelines>,
    ctx: Arc<RuleContext>,
    gateway: Gateway,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig, generator: Arc<dyn ContentGenerator>) -> Self {
        let guidelines = config.guidelines();
        let ctx = RuleContext::from_config(&config, guidelines.clone());
        let gateway = Gateway::new(
            generator,
            config.gateway.max_attempts,
            config.gateway.temperature,
        );
        Self {
            guidelines: Arc::new(guidelines),
            ctx: Arc::new(ctx),
            gateway,
            config,
        }
    }

    /// Start analyzing `source`; events arrive on the returned stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run<S: SourceProvider>(&self, source: S) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.drive(source, tx).await });
        EventStream { rx }
    }

    async fn drive<S: SourceProvider>(self, source: S, tx: mpsc::Sender<PipelineEvent>) {
        let mut co = Coordinator::new(tx, self.config.pipeline.heartbeat());
        let stop = StopFlag::default();
        let outcome = self.execute(&mut co, source, &stop).await;
        // Release any blocking worker still walking the tree.
        stop.raise();
        match outcome {
            Ok(()) => tracing::info!("analysis complete"),
            Err(Halt::Cancelled) => tracing::info!("analysis cancelled"),
            Err(Halt::Failed(e)) => {
                tracing::error!(error = %e, "analysis failed");
                let message = format!("Analysis failed: {}", e);
                let _ = co.emit(PipelineEvent::Error { message }).await;
            }
        }
    }

    async fn execute<S: SourceProvider>(
        &self,
        co: &mut Coordinator,
        source: S,
        stop: &StopFlag,
    ) -> std::result::Result<(), Halt> {
        co.progress(format!("Preparing source {}...", source.describe()))
            .await?;
        let tree: Arc<SourceTree> = Arc::new(
            co.await_stage(
                Stage::Source,
                tokio::task::spawn_blocking(move || source.materialize()),
            )
            .await?,
        );

        // Metrics and the static scan share nothing, so both start now.
        co.progress("Calculating repository metrics...").await?;
        let metrics_task = {
            let tree = tree.clone();
            let thresholds = self.ctx.thresholds.clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                metrics::compute_metrics(tree.root(), &thresholds, &stop)
            })
        };
        let static_task = {
            let tree = tree.clone();
            let ctx = self.ctx.clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || analyzer::scan(tree.root(), &ctx, &stop))
        };

        let metrics = co.await_stage(Stage::Metrics, metrics_task).await?;
        co.emit(PipelineEvent::Metrics {
            data: metrics.clone(),
        })
        .await?;

        co.progress("Running static analysis...").await?;
        let static_findings = co.await_stage(Stage::StaticScan, static_task).await?;
        for finding in &static_findings {
            co.emit(PipelineEvent::Finding {
                data: finding.clone(),
            })
            .await?;
        }

        co.progress("Analyzing with AI...").await?;
        let assisted_task = {
            let tree = tree.clone();
            let gateway = self.gateway.clone();
            let ctx = self.ctx.clone();
            let sampling = self.config.sampling.clone();
            tokio::spawn(async move {
                let root = tree.root().to_path_buf();
                let result = assisted::run_assisted_checks(root, gateway, ctx, sampling).await;
                drop(tree);
                result
            })
        };
        let assisted_findings = co.await_stage(Stage::AssistedScan, assisted_task).await?;
        for finding in &assisted_findings {
            co.emit(PipelineEvent::Finding {
                data: finding.clone(),
            })
            .await?;
        }

        let all: Vec<Finding> = static_findings
            .into_iter()
            .chain(assisted_findings)
            .collect();
        let enriched = self.enrich_all(co, &all).await?;

        tracing::info!(stage = Stage::Rank.label(), count = enriched.len(), "ranking");
        let report = AnalysisReport {
            metrics,
            findings: rank(enriched, self.config.pipeline.ranking),
            generated_at: Utc::now(),
        };
        co.emit(PipelineEvent::Result { report }).await?;
        Ok(())
    }

    async fn enrich_all(
        &self,
        co: &mut Coordinator,
        findings: &[Finding],
    ) -> std::result::Result<Vec<Finding>, Halt> {
        co.progress("Enriching findings...").await?;
        let enricher = Enricher::new(
            self.gateway.clone(),
            self.guidelines.clone(),
            self.config.pipeline.enrich_budget(),
        );

        let total = findings.len();
        let mut enriched = Vec::with_capacity(total);
        for (index, chunk) in findings.chunks(self.config.pipeline.chunk_size).enumerate() {
            if enricher.is_exhausted() {
                tracing::warn!(
                    chunk = index,
                    remaining = total - enriched.len(),
                    "enrichment budget exhausted, keeping partial results"
                );
                break;
            }
            let worker = enricher.clone();
            let chunk = chunk.to_vec();
            let task =
                tokio::spawn(async move { Ok::<_, ScanError>(worker.enrich(&chunk).await) });
            let out = co.await_stage(Stage::Enrich, task).await?;
            enriched.extend(out);
            co.progress(format!("Enriched {}/{} findings", enriched.len(), total))
                .await?;
        }
        Ok(enriched)
    }
}
