use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stitchline::{
    CancelToken, Feed, FrameSource, RecordConfig, StitchConfig, StopReason, StreamConfig,
    build_cycle, init_logging,
};

#[derive(Parser, Debug)]
#[command(name = "stitchline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stitch the configured sources until they run out or the run is interrupted.
    Run(RunArgs),
    /// Validate a config and probe every source, without stitching.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Pipeline config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Record the composite to this MP4 (overrides the config).
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stream the composite to this address (overrides the config).
    #[arg(long)]
    stream: Option<String>,

    /// Output width (requires --height).
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Output height (requires --width).
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Disable the preview snapshot.
    #[arg(long)]
    no_preview: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Pipeline config JSON.
    #[arg(long)]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<StitchConfig> {
    StitchConfig::from_path(path).with_context(|| format!("load config '{}'", path.display()))
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(path) = args.record {
        config.record = Some(RecordConfig {
            path,
            overwrite: true,
        });
    }
    if let Some(address) = args.stream {
        config.stream = Some(match config.stream.take() {
            Some(existing) => StreamConfig {
                address,
                ..existing
            },
            None => serde_json::from_value(serde_json::json!({ "address": address }))
                .context("build stream config")?,
        });
    }
    if let (Some(w), Some(h)) = (args.width, args.height) {
        config.output.width = Some(w);
        config.output.height = Some(h);
    }
    if args.no_preview {
        config.preview.enabled = false;
    }
    config.validate().context("config after command-line overrides")?;
    init_logging(&config.logging);

    let cancel = CancelToken::new();
    cancel
        .register_signals()
        .context("install SIGINT/SIGTERM handlers")?;
    let cycle = build_cycle(&config, cancel).context("assemble pipeline")?;
    let report = cycle.run();

    tracing::info!(
        ticks = report.ticks,
        composites = report.composites,
        skipped = report.skipped,
        reason = ?report.stop_reason,
        "run finished"
    );
    for err in &report.cleanup_errors {
        eprintln!("cleanup error: {err}");
    }
    match report.stop_reason {
        StopReason::FeedsInvalid => anyhow::bail!("one or more sources could not be opened"),
        StopReason::Failed(why) => anyhow::bail!("pipeline failed: {why}"),
        StopReason::FeedExhausted | StopReason::Cancelled | StopReason::QuitRequested => Ok(()),
    }
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    init_logging(&config.logging);

    let mut all_ok = true;
    for (idx, desc) in config.sources.iter().enumerate() {
        let mut feed = Feed::from_descriptor(idx, desc)?;
        let ok = feed.probe().unwrap_or(false);
        println!("[{idx}] {}: {}", feed.describe(), if ok { "ok" } else { "UNAVAILABLE" });
        feed.close()?;
        all_ok &= ok;
    }
    anyhow::ensure!(all_ok, "not every source is available");
    println!("config ok: {} sources", config.sources.len());
    Ok(())
}
