/// `load_config` module: reads the optional YAML config for the `sync` command and maps it
/// onto the core [`PublishConfig`].
///
/// The file holds no secrets. The API key is resolved separately by [`crate::credentials`],
/// from the secrets file named under `credentials.keys_file`.
///
/// ```yaml
/// publish:
///   site_url: https://example.com
///   api_url: https://dev.to/api   # optional
///   timeout_secs: 30              # optional
///   published: true               # optional
/// credentials:
///   keys_file: keys.json          # optional, relative to this file
/// ```
///
/// Without a config file, `site_url` is taken from `POST_BUCKET_SITE_URL` and every other
/// setting keeps its default.
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use anyhow::Result;
use post_bucket_core::config::PublishConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const ENV_SITE_URL: &str = "POST_BUCKET_SITE_URL";
pub const DEFAULT_API_URL: &str = "https://dev.to/api";
pub const DEFAULT_KEYS_FILE: &str = "keys.json";

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub publish: PublishSection,
    #[serde(default)]
    pub credentials: CredentialsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishSection {
    pub site_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_published")]
    pub published: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsSection {
    #[serde(default = "default_keys_file")]
    pub keys_file: PathBuf,
}

impl Default for CredentialsSection {
    fn default() -> Self {
        Self {
            keys_file: default_keys_file(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_published() -> bool {
    true
}

fn default_keys_file() -> PathBuf {
    PathBuf::from(DEFAULT_KEYS_FILE)
}

impl CliConfig {
    /// Core pipeline config for the given articles directory.
    pub fn publish_config(&self, articles_dir: PathBuf) -> PublishConfig {
        PublishConfig {
            articles_dir,
            site_url: self.publish.site_url.clone(),
            published: self.publish.published,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.publish.timeout_secs)
    }
}

/// Loads the YAML config file. A relative `keys_file` is resolved against the directory
/// holding the config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    validate(&config)?;

    if config.credentials.keys_file.is_relative() {
        if let Some(dir) = path_ref.parent() {
            config.credentials.keys_file = dir.join(&config.credentials.keys_file);
        }
    }
    Ok(config)
}

/// Builds the config from the environment alone, for runs without `--config`.
pub fn config_from_env() -> Result<CliConfig> {
    config_from_lookup(|key| std::env::var(key).ok())
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<CliConfig> {
    let site_url = lookup(ENV_SITE_URL).unwrap_or_default();
    let config = CliConfig {
        publish: PublishSection {
            site_url,
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            published: default_published(),
        },
        credentials: CredentialsSection::default(),
    };
    validate(&config).map_err(|e| {
        error!(var = ENV_SITE_URL, "No config file given and site URL not set");
        e.context(format!("pass --config or set {ENV_SITE_URL}"))
    })?;
    info!("Configuration built from environment");
    Ok(config)
}

fn validate(config: &CliConfig) -> Result<()> {
    let site_url = config.publish.site_url.trim();
    if site_url.is_empty() {
        return Err(anyhow::anyhow!("publish.site_url must not be empty"));
    }
    if !(site_url.starts_with("http://") || site_url.starts_with("https://")) {
        return Err(anyhow::anyhow!(
            "publish.site_url must be an http(s) URL, got {site_url:?}"
        ));
    }
    if config.publish.timeout_secs == 0 {
        return Err(anyhow::anyhow!("publish.timeout_secs must be at least 1"));
    }
    Ok(())
}
