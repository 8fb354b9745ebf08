use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chatwatch::cli::{config as config_cmd, replay, timestamp};
use chatwatch::config::Config;
use chatwatch::logging::init_tracing;

#[derive(Parser)]
#[command(name = "chatwatch")]
#[command(about = "Capture, deduplicate and export messages from a live conversation view")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "chatwatch.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded host trace through the capture pipeline
    Replay {
        /// Trace file (YAML, or JSON with a .json extension)
        trace: PathBuf,

        /// Export everything captured once the trace has settled
        #[arg(long)]
        export: bool,

        /// Print exports to stdout instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Override the export directory
        #[arg(short, long)]
        out_dir: Option<String>,
    },

    /// Normalize a raw timestamp label
    Timestamp {
        /// Label as shown by the host, e.g. "[10:15, 05/06/2024] Alice:"
        label: String,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let mut config = Config::load(&cli.config)?;
    init_tracing(&config.logging.level);

    match cli.command {
        Commands::Replay {
            trace,
            export,
            stdout,
            out_dir,
        } => {
            if let Some(dir) = out_dir {
                config.export.output_dir = dir;
            }
            replay::run(&config, &trace, export, stdout)?;
        }
        Commands::Timestamp { label } => {
            timestamp::run(&label)?;
        }
        Commands::Config => {
            config_cmd::run(&config)?;
        }
    }

    Ok(())
}
