mod cmd;
mod output;
mod setup;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "synth",
    about = "Twin synthesiser: follow sensor feeds and switch one actuator on their condition",
    version,
    propagate_version = true
)]
struct Cli {
    /// Agent configuration file
    #[arg(long, global = true, env = "SYNTH_CONFIG", default_value = "synth.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the configured streams and drive the actuator until interrupted
    Run {
        /// Print commands to stdout instead of delivering them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration for common mistakes
    Validate,

    /// Resolve search queries and show the streams and actuator they match
    Discover,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run { dry_run } => cmd::run::run(&cli.config, dry_run, cli.json),
        Commands::Validate => cmd::validate::run(&cli.config, cli.json),
        Commands::Discover => cmd::discover::run(&cli.config, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
