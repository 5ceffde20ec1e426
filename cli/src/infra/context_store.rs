//! Infrastructure implementation of the `ContextStore` port.
//!
//! Contexts live in `contexts.yaml` under `DSH_CONFIG_DIRECTORY`, or the
//! platform config directory when that is unset. Saves go through a temp
//! file and a rename so a crash never leaves a truncated file behind.

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::application::ports::ContextStore;
use crate::domain::context::ContextSettings;

/// Overrides the directory holding `contexts.yaml`.
pub const CONFIG_DIR_ENV: &str = "DSH_CONFIG_DIRECTORY";

/// Production implementation of `ContextStore` that uses a YAML file on disk.
#[derive(Debug, Default)]
pub struct YamlContextStore {
    path: Option<PathBuf>,
}

impl YamlContextStore {
    /// Store at an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }
}

impl ContextStore for YamlContextStore {
    fn load(&self) -> Result<ContextSettings> {
        let path = self.path()?;
        if !path.exists() {
            return Ok(ContextSettings::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let mut settings: ContextSettings = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        settings.attach_keys();
        Ok(settings)
    }

    fn save(&self, settings: &ContextSettings) -> Result<()> {
        let path = self.path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(settings).context("cannot serialize contexts")?;

        let temp_path = path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, content)
            .with_context(|| format!("cannot write {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("cannot set permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("cannot finalize {}", path.display()))?;
        tracing::debug!(path = %path.display(), "saved contexts");
        Ok(())
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir).join(ContextSettings::FILENAME));
        }
        let config = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config directory"))?;
        Ok(config.join("dsh").join(ContextSettings::FILENAME))
    }
}
