//! Configuration (layered: defaults < config file < environment).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SluiceError};
use crate::provider::openai_responses::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Orchestrator settings.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SluiceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Completion/tool rounds allowed per user turn.
    pub max_iterations: u32,
    /// Overall HTTP timeout. Unset means completion streams may run as long
    /// as the service keeps them open.
    pub request_timeout_secs: Option<u64>,
    pub instructions: Option<String>,
}

impl Default for SluiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_timeout_secs: None,
            instructions: None,
        }
    }
}

impl fmt::Debug for SluiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SluiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("instructions", &self.instructions)
            .finish()
    }
}

impl SluiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| SluiceError::Configuration(format!("invalid config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| SluiceError::Configuration(format!("{}: {e}", path.display())))
    }

    /// `<platform config dir>/sluice/config.toml`, when a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sluice")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the full stack: `.env`, then the config file at `path` (or the
    /// default path when it exists), then process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        let mut config = match file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults plus environment, no config file.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(model) = lookup("SLUICE_MODEL").filter(|v| !v.is_empty()) {
            self.model = model;
        }
        if let Some(raw) = lookup("SLUICE_MAX_ITERATIONS") {
            self.max_iterations = parse_env("SLUICE_MAX_ITERATIONS", &raw)?;
        }
        if let Some(raw) = lookup("SLUICE_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(parse_env("SLUICE_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(SluiceError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| SluiceError::Configuration(format!("{key}={raw:?}: {e}")))
}
