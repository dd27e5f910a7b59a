//! Detector capability: turns a file into an [`Outcome`].
//!
//! Two variants are selected by configuration. [`LocalDetector`] runs an
//! in-process [`DetectionModel`] and applies the flag policy itself;
//! [`RemoteDetector`] uploads to a DeepStack-compatible service and reads its
//! `unsafe` score. Both route videos through [`VideoSampling`] unless the
//! remote service is configured to receive whole videos.

use crate::models::{FileKind, FileTask, Label, LabelFormat, Outcome};
use crate::video::VideoSampling;
use providers::deepstack::{DeepStackClient, UploadField};
use providers::{Detection, DetectionModel, ProviderError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("unsupported file {0}")]
    Unsupported(PathBuf),
    #[error("frame sampling failed for {path}: {reason}")]
    Sampling { path: PathBuf, reason: String },
    #[error("no frame of {0} could be classified")]
    NoFrames(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    async fn classify(&self, task: &FileTask) -> Result<Outcome, DetectError>;

    /// Rendering used for this backend's labels in the report.
    fn label_format(&self) -> LabelFormat;

    /// Called once before workers start.
    async fn check_ready(&self) {}
}

/// Single-image classification, shared by the image path and video frames.
#[async_trait::async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify_image(&self, path: &Path) -> Result<Outcome, DetectError>;
}

/// Which detections count as flagged.
#[derive(Debug, Clone)]
pub struct FlagPolicy {
    classes: HashSet<String>,
    threshold: f32,
}

impl FlagPolicy {
    pub fn new<I, S>(classes: I, threshold: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            threshold,
        }
    }

    /// Flagged when any tracked class scores strictly above the threshold.
    /// Only tracked classes are kept as labels.
    pub fn evaluate(&self, detections: Vec<Detection>) -> Outcome {
        let labels: Vec<Label> = detections
            .into_iter()
            .filter(|d| self.classes.contains(&d.class))
            .map(Label::from)
            .collect();
        let flagged = labels.iter().any(|l| l.score > self.threshold);
        Outcome { flagged, labels }
    }
}

pub struct LocalDetector {
    model: Arc<dyn DetectionModel>,
    policy: FlagPolicy,
    video: VideoSampling,
}

impl LocalDetector {
    pub fn new(model: Arc<dyn DetectionModel>, policy: FlagPolicy, video: VideoSampling) -> Self {
        Self {
            model,
            policy,
            video,
        }
    }
}

#[async_trait::async_trait]
impl ImageClassifier for LocalDetector {
    async fn classify_image(&self, path: &Path) -> Result<Outcome, DetectError> {
        let detections = self.model.detect(path).await?;
        debug!("Image classification result for {:?}: {:?}", path, detections);
        Ok(self.policy.evaluate(detections))
    }
}

#[async_trait::async_trait]
impl Detector for LocalDetector {
    async fn classify(&self, task: &FileTask) -> Result<Outcome, DetectError> {
        match task.kind {
            FileKind::Image => self.classify_image(&task.path).await,
            FileKind::Video => self.video.classify(&task.path, self).await,
            FileKind::Unsupported => Err(DetectError::Unsupported(task.path.clone())),
        }
    }

    fn label_format(&self) -> LabelFormat {
        LabelFormat::Json
    }
}

pub struct RemoteDetector {
    client: DeepStackClient,
    threshold: f32,
    video: VideoSampling,
    upload_videos: bool,
}

impl RemoteDetector {
    pub fn new(
        client: DeepStackClient,
        threshold: f32,
        video: VideoSampling,
        upload_videos: bool,
    ) -> Self {
        Self {
            client,
            threshold,
            video,
            upload_videos,
        }
    }

    async fn classify_upload(&self, path: &Path, field: UploadField) -> Result<Outcome, DetectError> {
        let scores = self.client.nudity(path, field).await?;
        Ok(score_outcome(scores.unsafe_score, self.threshold))
    }
}

/// Outcome for a single `unsafe` score. The label is only kept when flagged.
pub fn score_outcome(unsafe_score: f32, threshold: f32) -> Outcome {
    let flagged = unsafe_score > threshold;
    let labels = if flagged {
        vec![Label {
            class: "unsafe".to_string(),
            score: unsafe_score,
        }]
    } else {
        Vec::new()
    };
    Outcome { flagged, labels }
}

#[async_trait::async_trait]
impl ImageClassifier for RemoteDetector {
    async fn classify_image(&self, path: &Path) -> Result<Outcome, DetectError> {
        self.classify_upload(path, UploadField::Image).await
    }
}

#[async_trait::async_trait]
impl Detector for RemoteDetector {
    async fn classify(&self, task: &FileTask) -> Result<Outcome, DetectError> {
        match task.kind {
            FileKind::Image => self.classify_image(&task.path).await,
            FileKind::Video if self.upload_videos => {
                self.classify_upload(&task.path, UploadField::Video).await
            }
            FileKind::Video => self.video.classify(&task.path, self).await,
            FileKind::Unsupported => Err(DetectError::Unsupported(task.path.clone())),
        }
    }

    fn label_format(&self) -> LabelFormat {
        LabelFormat::ClassList
    }

    async fn check_ready(&self) {
        match self.client.health().await {
            Ok(()) => info!("Detection server is reachable"),
            Err(e) => warn!("Detection server is not reachable, files will fail: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::FrameSampler;
    use std::sync::Mutex;

    struct ScriptedModel {
        detections: Vec<Detection>,
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait::async_trait]
    impl DetectionModel for ScriptedModel {
        async fn detect(&self, path: &Path) -> Result<Vec<Detection>, ProviderError> {
            self.calls.lock().unwrap().push(path.to_path_buf());
            Ok(self.detections.clone())
        }
    }

    struct NoFrames;

    #[async_trait::async_trait]
    impl FrameSampler for NoFrames {
        async fn sample(
            &self,
            _video: &Path,
            _stride: u32,
            _out_dir: &Path,
        ) -> Result<Vec<PathBuf>, DetectError> {
            Ok(Vec::new())
        }
    }

    fn detection(class: &str, score: f32) -> Detection {
        Detection {
            class: class.to_string(),
            score,
        }
    }

    fn policy() -> FlagPolicy {
        FlagPolicy::new(crate::config::DEFAULT_FLAG_CLASSES.iter().copied(), 0.6)
    }

    #[test]
    fn flags_tracked_class_above_threshold() {
        let outcome = policy().evaluate(vec![
            detection("FACE_FEMALE", 0.99),
            detection("FEMALE_BREAST_EXPOSED", 0.61),
        ]);
        assert!(outcome.flagged);
        assert_eq!(outcome.labels.len(), 1);
        assert_eq!(outcome.labels[0].class, "FEMALE_BREAST_EXPOSED");
    }

    #[test]
    fn threshold_is_exclusive() {
        let outcome = policy().evaluate(vec![detection("ANUS_EXPOSED", 0.6)]);
        assert!(!outcome.flagged);
        assert_eq!(outcome.labels.len(), 1);
    }

    #[test]
    fn untracked_classes_never_flag() {
        let outcome = policy().evaluate(vec![detection("FACE_MALE", 0.95)]);
        assert!(!outcome.flagged);
        assert!(outcome.labels.is_empty());
    }

    #[test]
    fn unsafe_score_outcome() {
        let hit = score_outcome(0.87, 0.6);
        assert!(hit.flagged);
        assert_eq!(hit.labels[0].class, "unsafe");
        let miss = score_outcome(0.2, 0.6);
        assert!(!miss.flagged);
        assert!(miss.labels.is_empty());
    }

    #[tokio::test]
    async fn local_detector_dispatches_by_kind() {
        let model = Arc::new(ScriptedModel {
            detections: vec![detection("BUTTOCKS_EXPOSED", 0.8)],
            calls: Mutex::new(Vec::new()),
        });
        let detector = LocalDetector::new(
            model.clone(),
            policy(),
            VideoSampling::new(Arc::new(NoFrames), 5),
        );

        let image = FileTask::new(PathBuf::from("/m/a.jpg"));
        assert!(detector.classify(&image).await.unwrap().flagged);

        let other = FileTask::new(PathBuf::from("/m/a.txt"));
        assert!(matches!(
            detector.classify(&other).await,
            Err(DetectError::Unsupported(_))
        ));

        let video = FileTask::new(PathBuf::from("/m/empty.mp4"));
        assert!(matches!(
            detector.classify(&video).await,
            Err(DetectError::NoFrames(_))
        ));
        assert_eq!(model.calls.lock().unwrap().len(), 1);
    }
}
