//! # Ink Replay
//!
//! Replays a JSON input script against a headless ink canvas and writes the
//! resulting page raster and composited view as PNG.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod script;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ink_renderer::raster::encode_png;
use ink_renderer::{NotebookId, PageStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::script::{Replayer, Script};

/// Command-line arguments for ink-replay.
#[derive(Debug, Clone, Parser)]
#[command(name = "ink-replay")]
#[command(about = "Replay an ink canvas input script headlessly")]
#[command(version)]
struct CliArgs {
    /// Replay script (JSON)
    script: PathBuf,

    /// Where to write the page raster
    #[arg(long, default_value = "page.png")]
    raster: PathBuf,

    /// Where to write the composited view
    #[arg(long)]
    view: Option<PathBuf>,

    /// Also save the page into this page store directory
    #[arg(long, env = "INK_STORE_DIR")]
    store: Option<PathBuf>,

    /// Notebook id used with --store (generated if absent)
    #[arg(long, requires = "store")]
    notebook: Option<String>,

    /// Print emitted canvas events as JSON lines
    #[arg(long)]
    events: bool,
}

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: `info,ink_renderer=debug`).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ink_renderer=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let json = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read {}", args.script.display()))?;
    let script = Script::from_json(&json)?;
    let base_dir = args
        .script
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    tracing::info!(steps = script.steps.len(), "Replaying {}", args.script.display());

    let mut replay = Replayer::new(&script, base_dir)?;
    replay.run(&script.steps)?;
    replay.canvas_mut().settle().await;

    if let Some(dir) = &args.store {
        let store = PageStore::with_data_dir(dir).context("Failed to open page store")?;
        let notebook = match &args.notebook {
            Some(id) => id.parse::<NotebookId>()?,
            None => NotebookId::generate(),
        };
        let canvas = replay.canvas_mut();
        canvas.attach_store(store, notebook);
        canvas.save_current_page()?;
        canvas.settle().await;
        tracing::info!(%notebook, "Page stored");
    }

    let raster = replay.canvas_mut().save_page_raster()?;
    std::fs::write(&args.raster, raster)
        .with_context(|| format!("Failed to write {}", args.raster.display()))?;
    tracing::info!("Page raster written to {}", args.raster.display());

    if let Some(path) = &args.view {
        let frame = replay.canvas().render_view()?;
        std::fs::write(path, encode_png(&frame)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("View written to {}", path.display());
    }

    if args.events {
        for event in replay.events() {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    Ok(())
}
