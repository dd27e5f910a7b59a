use clap::Parser;
use nudescan_core::config::{AppConfig, Backend};

#[derive(Parser, Debug)]
#[command(name = "nudescan")]
#[command(about = "Scan a folder for nudity, archive flagged files and report results", long_about = None)]
pub struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    pub config: Option<String>,

    /// Folder to scan; prompted for when omitted
    #[arg(short, long)]
    pub root: Option<String>,

    /// Detector backend: local|remote
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output JSON summary
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Command-line values win over the config file.
    pub fn apply(&self, cfg: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(root) = &self.root {
            cfg.scan.root = Some(root.clone());
        }
        if let Some(backend) = self.backend {
            cfg.detector.backend = backend;
        }
        if let Some(workers) = self.workers {
            cfg.workers.count = workers;
        }
        cfg.validate()
    }
}
