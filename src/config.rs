//! TOML configuration.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:3000/api/v1"
//! token = "ak1_..."        # or set KARAKEEP_API_TOKEN
//! timeout_secs = 30
//!
//! [crawl]
//! concurrency = 4
//! page_size = 100
//!
//! [storage]
//! path = "./data/kktriage.json"
//! ```
//!
//! Every section is optional; missing values take the defaults above.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.token`.
pub const TOKEN_ENV: &str = "KARAKEEP_API_TOKEN";

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    /// Maximum number of per-list membership fetches in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            page_size: default_page_size(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/kktriage.json")
}

impl Config {
    /// Defaults for every section; used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

impl ApiConfig {
    /// The bearer token, preferring the environment over the file.
    pub fn resolved_token(&self) -> Result<String> {
        self.token_with_override(std::env::var(TOKEN_ENV).ok().as_deref())
    }

    /// Pick the token from `env_token` (the value of [`TOKEN_ENV`], if set)
    /// or the file. Blank values count as unset.
    pub fn token_with_override(&self, env_token: Option<&str>) -> Result<String> {
        let env_token = env_token.map(str::trim).filter(|t| !t.is_empty());
        let file_token = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
        match env_token.or(file_token) {
            Some(token) => Ok(token.to_string()),
            None => bail!(
                "No API token configured. Set api.token in the config file or {}.",
                TOKEN_ENV
            ),
        }
    }
}

/// Check value ranges. Called by [`load_config`]; exposed for configs built
/// in code.
pub fn validate(config: &Config) -> Result<()> {
    let base = config.api.base_url.trim();
    if base.is_empty() {
        bail!("api.base_url must not be empty");
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        bail!("api.base_url must start with http:// or https:// (got '{}')", base);
    }
    if config.api.timeout_secs == 0 {
        bail!("api.timeout_secs must be > 0");
    }
    if config.crawl.concurrency == 0 {
        bail!("crawl.concurrency must be >= 1");
    }
    if config.crawl.page_size == 0 || config.crawl.page_size > MAX_PAGE_SIZE {
        bail!("crawl.page_size must be in 1..={}", MAX_PAGE_SIZE);
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}
