use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::segment::TrailerPolicy;

const CONFIG_FILE_NAME: &str = "meta-swap.json";

/// Options for replacing or stripping metadata.
///
/// # Loading
///
/// ```rust,no_run
/// use meta_swap::config::Config;
/// use meta_swap::segment::TrailerPolicy;
///
/// // From a JSON file
/// let config = Config::load(Some("meta-swap.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.trailer = TrailerPolicy::Strip;
/// config.keep_backup = true;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to do with data after EOI, in both the source and the destination.
    ///
    /// Note that under `reject` a metadata source with a trailer fails the
    /// run even though only its metadata segments are used.
    pub trailer: TrailerPolicy,
    /// Appended to the destination file name to form the backup path.
    pub backup_suffix: String,
    /// Keep the backup after a successful run.
    pub keep_backup: bool,
    /// Only check that the inputs can be merged; write nothing.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trailer: TrailerPolicy::Reject,
            backup_suffix: "~".to_string(),
            keep_backup: false,
            dry_run: false,
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join(CONFIG_FILE_NAME))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// The backup must sit next to the destination under a different name.
    pub fn validate(&self) -> Result<()> {
        if self.backup_suffix.is_empty() {
            anyhow::bail!("backup_suffix must not be empty");
        }
        if self.backup_suffix.contains(['/', '\\']) {
            anyhow::bail!(
                "backup_suffix must not contain a path separator: {:?}",
                self.backup_suffix
            );
        }
        Ok(())
    }

    /// Where `destination` is moved while it is being rewritten.
    pub fn backup_path(&self, destination: &Path) -> PathBuf {
        let mut name = destination.as_os_str().to_os_string();
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }
}
