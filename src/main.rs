use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use socialgen::batch::BatchJob;
use socialgen::data::SessionTable;
use socialgen::{load_config, ImageRequest, Renderer};

#[derive(Parser, Debug)]
#[command(name = "socialgen")]
#[command(about = "Generate social media images from JSON layouts", long_about = None)]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the output directory
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Override the assets directory
    #[arg(long, global = true)]
    assets: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one image per request file
    Render {
        #[arg(required = true)]
        requests: Vec<PathBuf>,
    },
    /// Render a card for every session in a CSV or JSON export
    Batch {
        #[arg(long)]
        sessions: PathBuf,
        /// Layout template with $variables (built-in session card when omitted)
        #[arg(long)]
        layout: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(assets) = args.assets {
        config.assets_path = assets;
    }

    match args.command {
        Command::Render { requests } => {
            let renderer = Renderer::new(config);
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for path in requests {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read request file '{}'", path.display()))?;
                let request = ImageRequest::from_json(&json)
                    .with_context(|| format!("Invalid request in '{}'", path.display()))?;
                let written = renderer
                    .create_image(&request)
                    .with_context(|| format!("Failed to render '{}'", path.display()))?;
                writeln!(handle, "{}", written.display()).context("Failed to write to stdout")?;
            }
            handle.flush().context("Failed to flush stdout")?;
        }
        Command::Batch { sessions, layout } => {
            let table = SessionTable::load(&sessions)?;
            let job = match layout {
                Some(path) => {
                    let layout = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read layout file '{}'", path.display()))?;
                    BatchJob::from_layout_str(config.clone(), &layout)?
                }
                None => BatchJob::with_default_layout(config.clone())?,
            };

            let report = job.run(&Renderer::new(config), &table);
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for path in &report.written {
                writeln!(handle, "{}", path.display()).context("Failed to write to stdout")?;
            }
            handle.flush().context("Failed to flush stdout")?;

            if !report.is_success() {
                for (session_id, error) in &report.failed {
                    eprintln!("{session_id}: {error}");
                }
                anyhow::bail!(
                    "{} of {} sessions failed",
                    report.failed.len(),
                    table.len()
                );
            }
        }
    }

    Ok(())
}
