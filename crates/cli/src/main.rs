use anyhow::Result;
use clap::Parser;
use cli::args::Cli;
use cli::{output, prompt};
use nudescan_core::config;
use nudescan_core::pipeline;
use nudescan_core::pool::CancelFlag;
use std::io;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    cli.apply(&mut cfg)?;

    if cfg.scan.root.is_none() {
        let root = prompt::read_root(io::stdin().lock(), io::stdout())?;
        info!("User input folder: {}", root);
        cfg.scan.root = Some(root);
    }

    let detector = pipeline::build_detector(&cfg)?;

    let cancel = CancelFlag::default();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Stop requested, finishing files in progress");
                cancel.cancel();
            }
        });
    }

    let summary = pipeline::run(&cfg, detector, cancel).await?;
    println!("{}", output::render(&summary, &cfg.report.path, cli.json)?);
    Ok(())
}
