//! gaitid CLI - enroll and identify gait embeddings from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{
    ConfigCommand, EnrollCommand, ListCommand, MatchCommand, ShowCommand, StressCommand,
};

/// gaitid CLI - gait identification against a local gallery.
///
/// Embeddings are produced upstream and passed in as vector files
/// (a JSON or YAML list of numbers). The gallery is a redb database,
/// by default ~/.giztoy/gaitid/data/gallery.redb.
///
/// Configuration is stored in ~/.giztoy/gaitid/config.yaml.
#[derive(Parser)]
#[command(name = "gaitid")]
#[command(about = "Gait identification matching engine")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.giztoy/gaitid/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Gallery database (overrides the config file)
    #[arg(long, global = true)]
    pub gallery: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Enroll or re-enroll an identity
    Enroll(EnrollCommand),
    /// Identify the closest enrolled identity
    Match(MatchCommand),
    /// Show one enrolled identity
    Show(ShowCommand),
    /// List enrolled identities
    List(ListCommand),
    /// Run concurrent matching against an in-memory gallery
    Stress(StressCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Enroll(cmd) => cmd.run(&cli).await,
        Commands::Match(cmd) => cmd.run(&cli).await,
        Commands::Show(cmd) => cmd.run(&cli).await,
        Commands::List(cmd) => cmd.run(&cli).await,
        Commands::Stress(cmd) => cmd.run(&cli).await,
    }
}
