use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_FLAG_CLASSES: &[&str] = &[
    "ANUS_EXPOSED",
    "FEMALE_BREAST_EXPOSED",
    "FEMALE_GENITALIA_EXPOSED",
    "MALE_GENITALIA_EXPOSED",
    "BUTTOCKS_EXPOSED",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub workers: WorkerConfig,
    pub report: ReportConfig,
    pub detector: DetectorConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub root: Option<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { count: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: String,
    pub archive_dir: String,
    /// Pending rows that trigger a checkpoint flush.
    pub checkpoint_every: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: "exposed/nudity_report.csv".to_string(),
            archive_dir: "exposed".to_string(),
            checkpoint_every: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    Remote,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "nudenet" => Ok(Backend::Local),
            "remote" | "deepstack" => Ok(Backend::Remote),
            other => anyhow::bail!("unknown detector backend: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub backend: Backend,
    pub threshold: f32,
    pub flag_classes: Vec<String>,
    /// Detector program used by the local backend.
    pub command: String,
    pub command_args: Vec<String>,
    pub url: String,
    pub timeout_secs: u64,
    /// Upload whole videos to the remote service instead of sampled frames.
    pub remote_video_upload: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            threshold: 0.6,
            flag_classes: DEFAULT_FLAG_CLASSES.iter().map(|c| c.to_string()).collect(),
            command: "nudenet-detect".to_string(),
            command_args: Vec::new(),
            url: providers::deepstack::DEFAULT_URL.to_string(),
            timeout_secs: 30,
            remote_video_upload: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Every `stride`th decoded frame is classified.
    pub stride: u32,
    pub ffmpeg: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            stride: 5,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("NUDESCAN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg: AppConfig = settings.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.workers.count > 0, "workers.count must be at least 1");
        anyhow::ensure!(
            self.report.checkpoint_every > 0,
            "report.checkpoint_every must be at least 1"
        );
        anyhow::ensure!(self.video.stride > 0, "video.stride must be at least 1");
        Ok(())
    }
}
