//! TOML configuration.
//!
//! ```toml
//! [portal]
//! url = "https://www.arcgis.com"
//! username = "archiver"
//! user_id = "0123456789abcdef0123456789abcdef"
//!
//! [inventory]
//! path = "./inventory.csv"
//!
//! [archive]
//! output_root = "./data_dmp"
//! ```
//!
//! The portal password is never stored in the file; it is read from the
//! environment variable named by `portal.password_env`
//! (default `GIS_ARCHIVE_PASSWORD`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub portal: PortalConfig,
    pub inventory: InventoryConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    /// Portal or ArcGIS Online organization URL.
    pub url: String,
    pub username: String,
    /// Expected user id; the authenticated user must match it.
    pub user_id: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_true")]
    pub verify_cert: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_token_expiration")]
    pub token_expiration_minutes: u64,
}

fn default_password_env() -> String {
    "GIS_ARCHIVE_PASSWORD".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_token_expiration() -> u64 {
    9999
}

impl PortalConfig {
    /// `<url>/sharing/rest`, without a trailing slash.
    pub fn rest_url(&self) -> String {
        format!("{}/sharing/rest", self.url.trim_end_matches('/'))
    }

    pub fn password(&self) -> Result<String> {
        std::env::var(&self.password_env)
            .map_err(|_| anyhow::anyhow!("{} not set", self.password_env))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_path")]
    pub path: PathBuf,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_owner_column")]
    pub owner_column: String,
    #[serde(default = "default_type_column")]
    pub type_column: String,
    #[serde(default = "default_title_column")]
    pub title_column: Option<String>,
    #[serde(default = "default_archive_column")]
    pub archive_column: String,
    #[serde(default = "default_delete_column")]
    pub delete_column: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: default_inventory_path(),
            id_column: default_id_column(),
            owner_column: default_owner_column(),
            type_column: default_type_column(),
            title_column: default_title_column(),
            archive_column: default_archive_column(),
            delete_column: default_delete_column(),
        }
    }
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("./inventory.csv")
}
fn default_id_column() -> String {
    "id".to_string()
}
fn default_owner_column() -> String {
    "owner".to_string()
}
fn default_type_column() -> String {
    "type".to_string()
}
fn default_title_column() -> Option<String> {
    Some("title".to_string())
}
fn default_archive_column() -> String {
    "archiveFlag".to_string()
}
fn default_delete_column() -> String {
    "deleteFlag".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Existing directory that receives `<owner>/<item_id>/` folders.
    pub output_root: PathBuf,
    #[serde(default = "default_export_format")]
    pub export_format: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_export_format() -> String {
    "File Geodatabase".to_string()
}
fn default_poll_interval() -> u64 {
    5
}
fn default_export_timeout() -> u64 {
    1800
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for a per-run log file. Stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate portal
    let url = config.portal.url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        bail!("portal.url must start with http:// or https://");
    }
    if config.portal.username.trim().is_empty() {
        bail!("portal.username must not be empty");
    }
    if config.portal.user_id.trim().is_empty() {
        bail!("portal.user_id must not be empty");
    }
    if config.portal.timeout_secs == 0 {
        bail!("portal.timeout_secs must be > 0");
    }

    // Validate archive
    if config.archive.concurrency == 0 {
        bail!("archive.concurrency must be >= 1");
    }
    if config.archive.poll_interval_secs == 0 {
        bail!("archive.poll_interval_secs must be > 0");
    }
    if config.archive.export_timeout_secs < config.archive.poll_interval_secs {
        bail!("archive.export_timeout_secs must be >= archive.poll_interval_secs");
    }
    if !config.archive.output_root.is_dir() {
        bail!(
            "archive.output_root does not exist or is not a directory: {}",
            config.archive.output_root.display()
        );
    }

    Ok(())
}
