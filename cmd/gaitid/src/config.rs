//! CLI configuration stored in ~/.giztoy/gaitid/config.yaml.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use giztoy_gaitid::Config as EngineConfig;

pub const APP_NAME: &str = "gaitid";

const BASE_DIR: &str = ".giztoy";
const CONFIG_FILE: &str = "config.yaml";
const GALLERY_FILE: &str = "gallery.redb";

/// On-disk configuration: the engine settings plus where the gallery lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,

    /// Path of the redb gallery. Empty means the default data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery: Option<String>,

    #[serde(skip)]
    path: PathBuf,
}

impl CliConfig {
    /// Returns ~/.giztoy/gaitid.
    pub fn app_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(BASE_DIR).join(APP_NAME))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::app_dir().map(|d| d.join(CONFIG_FILE))
    }

    /// Path this configuration was loaded from (or will be saved to).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the gallery path: `override_path`, then the config file,
    /// then ~/.giztoy/gaitid/data/gallery.redb.
    pub fn gallery_path(&self, override_path: Option<&str>) -> anyhow::Result<PathBuf> {
        if let Some(p) = override_path.or(self.gallery.as_deref()) {
            return Ok(PathBuf::from(p));
        }
        Self::app_dir()
            .map(|d| d.join("data").join(GALLERY_FILE))
            .ok_or_else(|| anyhow::anyhow!("cannot determine gallery path"))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Loads the configuration, falling back to defaults if the file is absent.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<CliConfig> {
    let path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => CliConfig::default_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    let mut cfg: CliConfig = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("parse {}", path.display()))?
    } else {
        CliConfig::default()
    };
    cfg.engine.validate()?;
    cfg.path = path;
    Ok(cfg)
}
