mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nexa")]
#[command(about = "Nexa scheduler CLI", long_about = None)]
struct Cli {
    /// Log filter, e.g. `nexa_scheduler=debug` (defaults to RUST_LOG or `info`)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-render a synthetic component tree through the scheduler
    Simulate {
        /// Levels in the component tree
        #[arg(long, default_value_t = 4)]
        depth: usize,
        /// Children per component
        #[arg(long, default_value_t = 3)]
        fanout: usize,
        /// Input events to feed, one frame each
        #[arg(long, default_value_t = 10)]
        frames: usize,
        /// Host-loop turns allowed per frame before giving up
        #[arg(long, default_value_t = 64)]
        max_turns: usize,
        /// Print the final scheduler snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    match cli.command {
        Commands::Simulate {
            depth,
            fanout,
            frames,
            max_turns,
            json,
        } => {
            if depth == 0 {
                anyhow::bail!("--depth must be at least 1");
            }
            let report = simulate::run(simulate::SimulationConfig {
                depth,
                fanout,
                frames,
                max_turns,
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
            } else {
                println!(
                    "{} components, {} frames: {} renders, {} measures, {} commits",
                    report.components, frames, report.renders, report.measures, report.commits
                );
                println!(
                    "clock {} after {} host turns ({:.2} ms)",
                    report.snapshot.clock, report.turns, report.elapsed_ms
                );
            }
        }
    }

    Ok(())
}
