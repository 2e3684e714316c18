use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vercel_prep::console::Console;
use vercel_prep::engine::Engine;
use vercel_prep::history::HistoryLog;
use vercel_prep::models::{Policy, HISTORY_LOG};
use vercel_prep::runner::SystemRunner;
use vercel_prep::Error;

#[derive(Parser)]
#[command(name = "vprep")]
#[command(about = "Prepare a Django project for Vercel, and undo it again")]
struct Cli {
    /// Directory containing the Django project
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Policy file (defaults to <root>/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Skip the pause between progress dots
    #[arg(long, global = true)]
    no_delay: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the deployment changes enabled in the policy file
    Apply,
    /// Undo every change recorded in the deployment history log
    Reverse,
    /// Show the recorded deployment history
    History,
}

/// Initialize tracing on stderr; stdout carries operator output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "vercel_prep=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let console = if cli.no_delay {
        Console::instant()
    } else {
        Console::default()
    };
    let config = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join("config.yaml"));

    let result = match cli.command {
        Commands::Apply => {
            let policy = Policy::load(&config)?;
            let runner = SystemRunner::new(&cli.root);
            Engine::resolve(&cli.root, &policy, &runner, console)
                .and_then(|engine| engine.apply(&policy))
                .map(|report| {
                    tracing::info!(
                        "{} change(s) applied, {} already in place",
                        report.applied.len(),
                        report.unchanged.len()
                    );
                })
        }
        Commands::Reverse => {
            let policy = Policy::load(&config)?;
            let runner = SystemRunner::new(&cli.root);
            Engine::resolve(&cli.root, &policy, &runner, console)
                .and_then(|engine| engine.reverse())
                .map(|report| {
                    tracing::info!(
                        "{} change(s) reversed, {} log entries skipped",
                        report.reversed.len(),
                        report.skipped.len()
                    );
                })
        }
        Commands::History => {
            let log = HistoryLog::new(cli.root.join(HISTORY_LOG));
            log.entries().map(|entries| {
                for entry in entries {
                    println!("{}  {}", entry.timestamp, entry.message());
                }
            })
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(Error::NothingToReverse { .. }) if matches!(cli.command, Commands::History) => {
            println!("No deployment history recorded.");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_precondition() => {
            println!("{e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
