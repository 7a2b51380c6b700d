//! Utility functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use giztoy_gaitid::{EnrollmentService, MatchingEngine, SimilarityIndex};
use giztoy_gallery::RedbGallery;

use crate::config::{load_config, CliConfig};
use crate::Cli;

/// Gets the CLI configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<CliConfig> {
    load_config(cli.config.as_deref())
}

/// The gallery with an index loaded from it.
pub struct Services {
    pub enrollment: EnrollmentService,
    pub engine: MatchingEngine,
}

/// Opens the redb gallery and builds the index from it.
///
/// Blocking: call from `spawn_blocking`.
pub fn open_services(cfg: &CliConfig, gallery: &Path) -> anyhow::Result<Services> {
    if let Some(parent) = gallery.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dim = cfg.engine.dim;
    let store = Arc::new(RedbGallery::open(gallery, dim)?);
    let index = Arc::new(SimilarityIndex::new(dim));
    let enrollment = EnrollmentService::new(store, index.clone(), cfg.engine.rebuild)?;
    enrollment.sync()?;
    let engine = MatchingEngine::new(index, cfg.engine.threshold)?;
    Ok(Services { enrollment, engine })
}

/// Runs `f` against the configured gallery on the blocking pool.
pub async fn with_services<T, F>(cli: &Cli, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(Services) -> anyhow::Result<T> + Send + 'static,
{
    let cfg = get_config(cli)?;
    let gallery = cfg.gallery_path(cli.gallery.as_deref())?;
    print_verbose(cli, &format!("gallery: {}", gallery.display()));

    tokio::task::spawn_blocking(move || f(open_services(&cfg, &gallery)?)).await?
}

/// Loads a vector from a JSON or YAML list of numbers.
pub fn load_vector(path: &str) -> anyhow::Result<Vec<f32>> {
    let content = std::fs::read_to_string(path)?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("yaml");

    let v: Vec<f32> = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    if v.is_empty() {
        anyhow::bail!("{path}: vector is empty");
    }
    Ok(v)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    if cli.verbose {
        eprintln!("[verbose] {}", msg);
    }
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}
