use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `cluster.password` is not set.
pub const PASSWORD_ENV: &str = "DB_PASS";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub host: String,
    /// Node answering the REST topology check. Defaults to `host`.
    #[serde(default)]
    pub data_host: Option<String>,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    pub bucket: String,
    pub scope: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub admin_port: Option<u16>,
    #[serde(default)]
    pub query_port: Option<u16>,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_kv_timeout_secs")]
    pub kv_timeout_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
}

fn default_accept_invalid_certs() -> bool {
    true
}
fn default_kv_timeout_secs() -> u64 {
    30
}
fn default_ready_timeout_secs() -> u64 {
    5
}
fn default_settle_delay_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,
    /// File names that are always imported, whatever the sample picked.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_type")]
    pub default_type: String,
    #[serde(default = "default_create_primary_index")]
    pub create_primary_index: bool,
}

fn default_pattern() -> String {
    "*.json".to_string()
}
fn default_parallel() -> bool {
    true
}
fn default_sample_seed() -> u64 {
    42
}
fn default_type() -> String {
    "_default".to_string()
}
fn default_create_primary_index() -> bool {
    true
}

impl ClusterConfig {
    fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    pub fn admin_port(&self) -> u16 {
        self.admin_port.unwrap_or(if self.tls { 18091 } else { 8091 })
    }

    pub fn query_port(&self) -> u16 {
        self.query_port.unwrap_or(if self.tls { 18093 } else { 8093 })
    }

    /// Base URL of the cluster management REST API.
    pub fn admin_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.admin_port())
    }

    /// Base URL of the node queried for scope/collection topology.
    pub fn data_url(&self) -> String {
        let host = self.data_host.as_deref().unwrap_or(&self.host);
        format!("{}://{}:{}", self.scheme(), host, self.admin_port())
    }

    /// Base URL of the SQL++ query service.
    pub fn query_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.query_port())
    }

    /// Password from the config file, falling back to `DB_PASS`.
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(ref password) = self.password {
            return Ok(password.clone());
        }
        std::env::var(PASSWORD_ENV).map_err(|_| {
            anyhow::anyhow!(
                "cluster.password not set and {} is not in the environment",
                PASSWORD_ENV
            )
        })
    }

    pub fn kv_timeout(&self) -> Duration {
        Duration::from_secs(self.kv_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let cluster = &config.cluster;
    if cluster.host.trim().is_empty() {
        bail!("cluster.host must not be empty");
    }
    if cluster.username.trim().is_empty() {
        bail!("cluster.username must not be empty");
    }
    if cluster.bucket.trim().is_empty() {
        bail!("cluster.bucket must not be empty");
    }
    if cluster.scope.trim().is_empty() {
        bail!("cluster.scope must not be empty");
    }

    let import = &config.import;
    Glob::new(&import.pattern)
        .with_context(|| format!("import.pattern is not a valid glob: '{}'", import.pattern))?;

    if import.sample_size == Some(0) {
        bail!("import.sample_size must be > 0 when set");
    }
    if import.default_type.trim().is_empty() {
        bail!("import.default_type must not be empty");
    }

    Ok(())
}
