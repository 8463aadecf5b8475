use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pcrflow::config::PipelineConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "pcrflow")]
#[command(version, about = "PCR primer design (primer3) and specificity search (primersearch) pipeline")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to pcrflow.toml. Defaults to ./pcrflow.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding one workspace per sequence. Overrides pcrflow.toml and env.
    #[arg(long, global = true)]
    pub upload_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the web flow and JSON API
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Enable dev mode (permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Run both stages for a sequence, reusing cached artifacts
    Run {
        /// Sequence text (any case, non-ACGNT characters are dropped)
        sequence: Option<String>,

        /// Read the sequence from a file ("-" for stdin); FASTA headers are skipped
        #[arg(short, long, conflicts_with = "sequence")]
        file: Option<PathBuf>,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which artifacts exist for a sequence without running anything
    Status {
        sequence: Option<String>,

        #[arg(short, long, conflicts_with = "sequence")]
        file: Option<PathBuf>,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default pcrflow.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "pcrflow=debug" } else { "pcrflow=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&std::path::Path>, upload_root: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::resolve(path)?;
    if let Some(root) = upload_root {
        config.paths.upload_root = root;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let Cli {
        verbose,
        log_json,
        config: config_path,
        upload_root,
        command,
    } = Cli::parse();
    init_tracing(verbose, log_json);

    match command {
        Commands::Serve { port, host, dev } => {
            let config = load_config(config_path.as_deref(), upload_root)?;
            cmd::cmd_serve(config, port, host, dev).await?;
        }
        Commands::Run {
            sequence,
            file,
            json,
        } => {
            let config = load_config(config_path.as_deref(), upload_root)?;
            let raw = cmd::read_sequence(sequence.as_deref(), file.as_deref())?;
            cmd::cmd_run(config, &raw, json).await?;
        }
        Commands::Status { sequence, file } => {
            let config = load_config(config_path.as_deref(), upload_root)?;
            let raw = cmd::read_sequence(sequence.as_deref(), file.as_deref())?;
            cmd::cmd_status(config, &raw)?;
        }
        Commands::Config { command } => cmd::cmd_config(config_path.as_deref(), command)?,
    }

    Ok(())
}
