//! TOML configuration for the Restock binary.
//!
//! Every field has a default so a missing config file just means "run
//! with defaults". `${ENV_VAR}` references are expanded before parsing
//! and fail loudly when the variable is unset; `~` in paths is expanded
//! lazily at use.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub order: OrderConfig,

    /// Per-item stock minimums, e.g. `milk = 2`.
    #[serde(default)]
    pub baseline: BTreeMap<String, u32>,

    #[serde(default)]
    pub storefronts: StorefrontsConfig,
}

/// Where the journal, session blobs and browser profiles live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.restock".to_string()
}

/// Decision-engine model settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ModelConfig {
    /// API key; falls back to the OPENROUTER_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model id; the engine's default is used when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Chat-completions endpoint for OpenAI-compatible services.
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Browser launch settings shared by every storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BrowserConfig {
    /// Run Chrome headless. Login always forces a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Base remote-debugging port; each provider gets its own offset so
    /// two providers never share a Chrome instance.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            debug_port: default_debug_port(),
        }
    }
}

fn default_debug_port() -> u16 {
    9222
}

/// Ordering-run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct OrderConfig {
    /// Empty the cart before the first add of a run.
    #[serde(default)]
    pub clear_cart_first: bool,

    /// Leave the cart page open after a run that added anything.
    #[serde(default = "default_open_cart_after")]
    pub open_cart_after: bool,

    /// Cap on scraped candidates handed to the model per search.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            clear_cart_first: false,
            open_cart_after: default_open_cart_after(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_open_cart_after() -> bool {
    true
}

fn default_max_candidates() -> usize {
    10
}

/// Per-storefront overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StorefrontsConfig {
    #[serde(default)]
    pub getir: StorefrontOverride,

    #[serde(default)]
    pub migros: StorefrontOverride,

    #[serde(default)]
    pub akbal: StorefrontOverride,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StorefrontOverride {
    /// Base URL override, mostly for tests against a local fixture.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise run with defaults.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.data_dir).to_string())
    }
}

/// Expand environment variables in the format `${VAR}`.
fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value =
            std::env::var(var_name).map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
        result = result.replace(&cap[0], &var_value);
    }

    Ok(result)
}
