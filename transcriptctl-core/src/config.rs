use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::selectors::SelectorRegistry;

/// Settings for an export run.
///
/// Every field has a default, so an empty or partial file is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub delays: DelayConfig,
    pub capture: CaptureConfig,
    pub images: ImageConfig,
    /// Registry entry name -> replacement selector
    pub selectors: BTreeMap<String, String>,
    /// Where `export` writes when `--out` is not given
    pub output_dir: Option<PathBuf>,
}

/// Pauses that let the page's UI react to synthetic events. All values
/// in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub start_ms: u64,
    pub hover_ms: u64,
    pub edit_ms: u64,
    pub copy_ms: u64,
    pub phase_ms: u64,
    pub linger_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            start_ms: 1000,
            hover_ms: 50,
            edit_ms: 150,
            copy_ms: 100,
            phase_ms: 200,
            linger_ms: 5000,
        }
    }
}

impl DelayConfig {
    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    pub fn hover(&self) -> Duration {
        Duration::from_millis(self.hover_ms)
    }

    pub fn edit(&self) -> Duration {
        Duration::from_millis(self.edit_ms)
    }

    pub fn copy(&self) -> Duration {
        Duration::from_millis(self.copy_ms)
    }

    pub fn phase(&self) -> Duration {
        Duration::from_millis(self.phase_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Upper bound on waiting for copied responses to arrive
    pub wait_budget_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            wait_budget_ms: 2000,
        }
    }
}

impl CaptureConfig {
    pub fn wait_budget(&self) -> Duration {
        Duration::from_millis(self.wait_budget_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Image sources containing any of these substrings are skipped
    pub exclude: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["icon".into(), "avatar".into(), "logo".into()],
        }
    }
}

impl ImageConfig {
    pub fn is_excluded(&self, src: &str) -> bool {
        self.exclude.iter().any(|needle| src.contains(needle.as_str()))
    }
}

impl ExportConfig {
    /// Load config from `path`, or from ~/.transcriptctl/config.toml
    ///
    /// An explicit path must exist; the default location falls back to
    /// built-in defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        if !config_path.exists() {
            if required {
                anyhow::bail!("Config not found at {:?}", config_path);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&content)
            .context(format!("Failed to load config file: {:?}", config_path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).context("Failed to parse config file (invalid TOML)")?;

        config.expand_variables();
        config
            .selector_registry()
            .context("Invalid [selectors] entry")?;

        Ok(config)
    }

    /// Get config file path: ~/.transcriptctl/config.toml
    pub fn config_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Default save location: ~/.transcriptctl/exports
    pub fn default_output_dir() -> PathBuf {
        Self::home_dir().join("exports")
    }

    fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".transcriptctl")
    }

    /// Built-in selectors with this config's overrides applied.
    pub fn selector_registry(&self) -> Result<SelectorRegistry> {
        Ok(SelectorRegistry::with_overrides(&self.selectors)?)
    }

    /// Configured output directory, else the default one.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(Self::default_output_dir)
    }

    /// Expand ${var} references in paths
    fn expand_variables(&mut self) {
        let mut vars = HashMap::new();
        vars.insert("HOME".to_string(), env::var("HOME").unwrap_or_default());

        if let Some(ref dir) = self.output_dir {
            self.output_dir = Some(Self::expand_path(dir, &vars));
        }
    }

    fn expand_path(path: &Path, vars: &HashMap<String, String>) -> PathBuf {
        let mut result = path.display().to_string();
        for (key, value) in vars {
            let pattern = format!("${{{}}}", key);
            result = result.replace(&pattern, value);
        }
        PathBuf::from(result)
    }
}
