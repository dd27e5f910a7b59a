use crate::aggregator::ResultAggregator;
use crate::archive::Archive;
use crate::config::{AppConfig, Backend};
use crate::detector::{Detector, FlagPolicy, LocalDetector, RemoteDetector};
use crate::models::FileTask;
use crate::pool::{CancelFlag, WorkerPool};
use crate::report::ReportStore;
use crate::resume::ResumeIndex;
use crate::scanner::{self, Pruned};
use crate::video::{FfmpegSampler, VideoSampling};
use anyhow::Context;
use providers::command::{CommandModel, CommandModelConfig};
use providers::deepstack::{DeepStackClient, DeepStackConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub discovered: usize,
    pub unsupported: usize,
    pub skipped_resumed: usize,
    pub queued: usize,
    pub recorded: usize,
    pub flagged: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub archive_errors: usize,
    /// Recorded rows that could not be written to the report.
    pub unflushed: usize,
}

/// Tasks that survived kind and resume filtering, plus the counts of what
/// was filtered out.
#[derive(Debug, Default)]
pub struct DispatchPlan {
    pub tasks: Vec<FileTask>,
    pub discovered: usize,
    pub unsupported: usize,
    pub skipped_resumed: usize,
}

/// Enumerates `root` and drops unsupported and already-reported files.
/// Nothing under `pruned` is enumerated.
pub fn plan_dispatch(
    root: &Path,
    excludes: &globset::GlobSet,
    pruned: &Pruned,
    resume: &ResumeIndex,
) -> DispatchPlan {
    let mut plan = DispatchPlan::default();
    for task in scanner::enumerate(root, excludes, pruned) {
        plan.discovered += 1;
        if !scanner::is_supported(&task) {
            info!("Skipping unsupported file: {}", task.path.display());
            plan.unsupported += 1;
            continue;
        }
        if resume.should_skip(&task) {
            debug!("Skipping already scanned file: {}", task.path.display());
            plan.skipped_resumed += 1;
            continue;
        }
        plan.tasks.push(task);
    }
    plan
}

pub async fn run(
    config: &AppConfig,
    detector: Arc<dyn Detector>,
    cancel: CancelFlag,
) -> anyhow::Result<PipelineSummary> {
    let root = config
        .scan
        .root
        .as_deref()
        .context("no root directory configured")?;
    let root = scanner::validate_root(Path::new(root))?;
    let report_path = PathBuf::from(&config.report.path);
    let excludes = scanner::build_globset(&config.scan.exclude).context("scan.exclude")?;

    info!("Starting classification in folder: {}", root.display());
    let plan = {
        let report_path = report_path.clone();
        let archive_dir = PathBuf::from(&config.report.archive_dir);
        task::spawn_blocking(move || {
            let resume = ResumeIndex::load(&report_path);
            let pruned = Pruned::new([archive_dir.as_path(), report_path.as_path()]);
            plan_dispatch(&root, &excludes, &pruned, &resume)
        })
        .await
        .context("enumeration task")?
    };
    info!(
        "Discovered {} files: {} queued, {} already reported, {} unsupported",
        plan.discovered,
        plan.tasks.len(),
        plan.skipped_resumed,
        plan.unsupported
    );

    let mut summary = PipelineSummary {
        discovered: plan.discovered,
        unsupported: plan.unsupported,
        skipped_resumed: plan.skipped_resumed,
        queued: plan.tasks.len(),
        ..Default::default()
    };

    detector.check_ready().await;
    let aggregator = Arc::new(ResultAggregator::new(
        ReportStore::new(report_path.clone(), config.report.checkpoint_every),
        Archive::new(&config.report.archive_dir),
        detector.label_format(),
    ));
    let pool = WorkerPool::new(config.workers.count, plan.tasks);
    let pool_report = pool.run(detector, aggregator.clone(), cancel).await;
    let stats = aggregator.finish().await;

    summary.recorded = stats.recorded;
    summary.flagged = stats.flagged;
    summary.failed = stats.failed;
    summary.cancelled = pool_report.cancelled;
    summary.archive_errors = stats.archive_errors;
    summary.unflushed = stats.unflushed;
    info!(
        "Classification complete: {} recorded, {} flagged, {} failed, {} cancelled",
        summary.recorded, summary.flagged, summary.failed, summary.cancelled
    );
    if summary.unflushed > 0 {
        warn!(
            "{} recorded rows were not saved to {}",
            summary.unflushed,
            report_path.display()
        );
    }
    Ok(summary)
}

pub fn build_detector(config: &AppConfig) -> anyhow::Result<Arc<dyn Detector>> {
    let video = VideoSampling::new(
        Arc::new(FfmpegSampler::new(config.video.ffmpeg.clone())),
        config.video.stride,
    );
    let detector: Arc<dyn Detector> = match config.detector.backend {
        Backend::Local => {
            let model = CommandModel::new(CommandModelConfig {
                program: config.detector.command.clone(),
                args: config.detector.command_args.clone(),
            });
            let policy = FlagPolicy::new(
                config.detector.flag_classes.iter().cloned(),
                config.detector.threshold,
            );
            Arc::new(LocalDetector::new(Arc::new(model), policy, video))
        }
        Backend::Remote => {
            let client = DeepStackClient::new(DeepStackConfig {
                url: config.detector.url.clone(),
                timeout: Duration::from_secs(config.detector.timeout_secs),
            })
            .context("remote detector")?;
            Arc::new(RemoteDetector::new(
                client,
                config.detector.threshold,
                video,
                config.detector.remote_video_upload,
            ))
        }
    };
    Ok(detector)
}
