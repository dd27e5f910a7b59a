//! Video classification by frame sampling.
//!
//! Frames are written to a per-video temporary directory that is removed on
//! every exit path, including sampling errors and an early hit.

use crate::detector::{DetectError, ImageClassifier};
use crate::models::Outcome;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// Decodes a video and writes every `stride`th frame as an image into
/// `out_dir`, returning the frame paths in decode order.
#[async_trait::async_trait]
pub trait FrameSampler: Send + Sync {
    async fn sample(
        &self,
        video: &Path,
        stride: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, DetectError>;
}

/// Samples frames with an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    program: String,
}

impl FfmpegSampler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait::async_trait]
impl FrameSampler for FfmpegSampler {
    async fn sample(
        &self,
        video: &Path,
        stride: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, DetectError> {
        let output = Command::new(&self.program)
            .arg("-nostdin")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("select=not(mod(n\\,{}))", stride))
            .args(["-vsync", "vfr"])
            .arg(out_dir.join("frame_%06d.jpg"))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DetectError::Sampling {
                path: video.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        list_frames(out_dir).await
    }
}

async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, DetectError> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            frames.push(entry.path());
        }
    }
    // zero-padded names sort in decode order
    frames.sort();
    Ok(frames)
}

#[derive(Clone)]
pub struct VideoSampling {
    sampler: Arc<dyn FrameSampler>,
    stride: u32,
}

impl VideoSampling {
    pub fn new(sampler: Arc<dyn FrameSampler>, stride: u32) -> Self {
        Self {
            sampler,
            stride: stride.max(1),
        }
    }

    /// Classifies sampled frames in order and stops at the first flagged one.
    ///
    /// Frame errors are logged and skipped; the video fails only when no
    /// frame could be classified.
    pub async fn classify(
        &self,
        video: &Path,
        frames: &dyn ImageClassifier,
    ) -> Result<Outcome, DetectError> {
        let scratch = tempfile::Builder::new()
            .prefix("nudescan-frames-")
            .tempdir()?;
        let result = self.classify_in(video, scratch.path(), frames).await;
        if let Err(e) = scratch.close() {
            warn!("Failed to remove frame directory for {:?}: {}", video, e);
        }
        result
    }

    async fn classify_in(
        &self,
        video: &Path,
        scratch: &Path,
        frames: &dyn ImageClassifier,
    ) -> Result<Outcome, DetectError> {
        let sampled = self.sampler.sample(video, self.stride, scratch).await?;
        debug!("Sampled {} frames from {:?}", sampled.len(), video);

        let mut outcome = Outcome::default();
        let mut classified = 0usize;
        for frame in &sampled {
            match frames.classify_image(frame).await {
                Ok(frame_outcome) => {
                    classified += 1;
                    outcome.labels.extend(frame_outcome.labels);
                    if frame_outcome.flagged {
                        debug!("Frame {:?} of {:?} flagged, stopping", frame, video);
                        outcome.flagged = true;
                        break;
                    }
                }
                Err(e) => warn!("Error classifying frame {:?} of {:?}: {}", frame, video, e),
            }
        }

        if classified == 0 {
            return Err(DetectError::NoFrames(video.to_path_buf()));
        }
        Ok(outcome)
    }
}
