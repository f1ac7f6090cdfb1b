use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use instanexus_contracts::events::EventWriter;
use instanexus_contracts::runs::summary::write_summary;
use instanexus_engine::content::DEFAULT_BATCH_SIZE;
use instanexus_engine::quality::{select_best_bytes, QualityMetrics};
use instanexus_engine::{Engine, EngineConfig};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "instanexus",
    version,
    about = "AI image generation and content batches for Instagram"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one image from a prompt.
    Generate(GenerateArgs),
    /// Generate a paced batch of content packages.
    Batch(BatchArgs),
    /// Score local images with the quality heuristic.
    Score(ScoreArgs),
    /// Pick the best cell of a local 2x2 grid image.
    Select(SelectArgs),
    /// Show configured capabilities.
    Status(StatusArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct BatchArgs {
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    count: u32,
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    summary: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ScoreArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
struct SelectArgs {
    #[arg(long)]
    grid: PathBuf,
}

#[derive(Debug, Parser)]
struct StatusArgs {
    /// Verify the caption key against the remote API.
    #[arg(long)]
    probe: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("instanexus error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Score(args) => run_score(args),
        Command::Select(args) => run_select(args),
        command => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(run_remote(command))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_remote(command: Command) -> Result<i32> {
    let mut config = EngineConfig::from_env().context("invalid configuration")?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });

    match command {
        Command::Generate(args) => {
            apply_out_dir(&mut config, args.out);
            let events = event_writer(&config, args.events);
            let engine = Engine::from_config(config, Some(events))?;
            let asset = engine
                .orchestrator()
                .generate_image_with_cancel(&args.prompt, &cancel)
                .await?;
            print_json(&serde_json::to_value(&asset)?)?;
            Ok(0)
        }
        Command::Batch(args) => {
            apply_out_dir(&mut config, args.out);
            let events = event_writer(&config, args.events);
            let mut engine = Engine::from_config(config, Some(events))?;
            engine.probe_captions().await;
            let summary = engine
                .content()
                .run_batch(args.count, args.theme.as_deref(), &cancel)
                .await;
            if let Some(path) = &args.summary {
                write_summary(path, &summary, None)
                    .with_context(|| format!("failed to write summary {}", path.display()))?;
                info!(path = %path.display(), "batch summary written");
            }
            print_json(&serde_json::to_value(&summary)?)?;
            Ok(batch_exit_code(summary.requested, summary.succeeded()))
        }
        Command::Status(args) => {
            let mut capabilities = config.capabilities();
            if args.probe && config.task_api_key.is_some() {
                let mut engine = Engine::from_config(config.clone(), None)?;
                capabilities = engine.probe_captions().await;
            } else if args.probe {
                warn!("no task api key configured, skipping caption probe");
            }
            print_json(&json!({
                "capabilities": capabilities,
                "task_api_base": config.task_api_base,
                "openai_api_base": config.openai_api_base,
                "caption_model": config.caption_model,
                "output_dir": config.output_dir.to_string_lossy(),
                "poll_interval_secs": config.poll.interval.as_secs(),
                "poll_max_attempts": config.poll.max_attempts,
                "grid_retention": config.grid_retention,
            }))?;
            Ok(if capabilities.any() { 0 } else { 2 })
        }
        Command::Score(_) | Command::Select(_) => bail!("local commands do not need the runtime"),
    }
}

fn run_score(args: ScoreArgs) -> Result<i32> {
    for path in &args.paths {
        let bytes = read_image(path)?;
        let metrics = image::load_from_memory(&bytes)
            .ok()
            .and_then(|image| QualityMetrics::measure(&image));
        let score = metrics.map(|metrics| metrics.score()).unwrap_or(0.0);
        print_json(&json!({
            "path": path.to_string_lossy(),
            "score": score,
            "metrics": metrics,
            "normalized": metrics.map(|metrics| metrics.normalized()),
        }))?;
    }
    Ok(0)
}

fn run_select(args: SelectArgs) -> Result<i32> {
    let bytes = read_image(&args.grid)?;
    let selection = select_best_bytes(&bytes);
    print_json(&json!({
        "grid": args.grid.to_string_lossy(),
        "index": selection.index,
        "upscale_index": (selection.index + 1).to_string(),
        "score": selection.score,
        "scores": selection.scores,
    }))?;
    Ok(0)
}

fn apply_out_dir(config: &mut EngineConfig, out: Option<PathBuf>) {
    if let Some(out) = out {
        config.output_dir = out;
    }
}

fn event_writer(config: &EngineConfig, events: Option<PathBuf>) -> EventWriter {
    let path = events.unwrap_or_else(|| config.output_dir.join("events.jsonl"));
    EventWriter::new(path, uuid::Uuid::new_v4().to_string())
}

/// Non-zero only when nothing in a non-empty batch succeeded.
fn batch_exit_code(requested: u64, succeeded: u64) -> i32 {
    if requested > 0 && succeeded == 0 {
        1
    } else {
        0
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
