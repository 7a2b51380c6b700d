//! Configuration management commands.

use clap::{Args, Subcommand};

use giztoy_gaitid::RebuildPolicy;

use super::{get_config, output_result, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Configuration is stored in ~/.giztoy/gaitid/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// View the effective configuration
    View,
    /// Write a configuration file
    Init {
        /// Embedding dimension
        #[arg(long)]
        dim: Option<usize>,
        /// Match threshold in [0, 1]
        #[arg(long)]
        threshold: Option<f32>,
        /// Index refresh on enrollment (rebuild, insert)
        #[arg(long)]
        rebuild: Option<RebuildPolicy>,
        /// Gallery database path
        #[arg(long = "gallery-path")]
        gallery_path: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;
                let gallery = cfg.gallery_path(cli.gallery.as_deref())?;
                let view = serde_json::json!({
                    "path": cfg.path().display().to_string(),
                    "dim": cfg.engine.dim,
                    "threshold": cfg.engine.threshold,
                    "rebuild": cfg.engine.rebuild,
                    "gallery": gallery.display().to_string(),
                });
                output_result(&view, cli.output.as_deref(), cli.json)
            }

            ConfigSubcommand::Init {
                dim,
                threshold,
                rebuild,
                gallery_path,
                force,
            } => {
                let mut cfg = get_config(cli)?;
                if cfg.path().exists() && !force {
                    anyhow::bail!(
                        "{} already exists, use --force to overwrite",
                        cfg.path().display()
                    );
                }

                if let Some(d) = dim {
                    cfg.engine.dim = *d;
                }
                if let Some(t) = threshold {
                    cfg.engine.threshold = *t;
                }
                if let Some(r) = rebuild {
                    cfg.engine.rebuild = *r;
                }
                if let Some(g) = gallery_path {
                    cfg.gallery = Some(g.clone());
                }
                cfg.engine.validate()?;
                cfg.save()?;

                print_success(&format!("Config written to {}", cfg.path().display()));
                Ok(())
            }
        }
    }
}
