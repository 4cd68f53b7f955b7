mod file_config;

pub use file_config::FileConfig;

use crate::radio::DEFAULT_MAX_RECENT;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that participate in config resolution. Mirrors the clap
/// arguments in `main.rs`; TOML file values override these.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub catalog_db: Option<PathBuf>,
    pub audio_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub cache_ttl_sec: u64,
    pub max_recent: usize,
    pub frontend_dir_path: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            catalog_db: None,
            audio_dir: None,
            port: 8080,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::default(),
            cache_ttl_sec: 300,
            max_recent: DEFAULT_MAX_RECENT,
            frontend_dir_path: None,
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog_db: PathBuf,
    pub audio_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub cache_ttl: Duration,
    pub max_recent: usize,
    pub frontend_dir_path: Option<String>,
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    match s.to_lowercase().as_str() {
        "none" => Some(RequestsLoggingLevel::None),
        "path" => Some(RequestsLoggingLevel::Path),
        "headers" => Some(RequestsLoggingLevel::Headers),
        "body" => Some(RequestsLoggingLevel::Body),
        _ => None,
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let catalog_db = file
            .catalog_db
            .map(PathBuf::from)
            .or_else(|| cli.catalog_db.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("catalog_db must be specified on the CLI or in the config file")
            })?;

        let audio_dir = file
            .audio_dir
            .map(PathBuf::from)
            .or_else(|| cli.audio_dir.clone())
            .unwrap_or_else(|| PathBuf::from("audio"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let cache_ttl_sec = file.cache_ttl_sec.unwrap_or(cli.cache_ttl_sec);
        if cache_ttl_sec == 0 {
            bail!("cache_ttl_sec must be at least 1");
        }

        let max_recent = file.max_recent.unwrap_or(cli.max_recent);
        if max_recent == 0 {
            bail!("max_recent must be at least 1");
        }

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        Ok(AppConfig {
            catalog_db,
            audio_dir,
            port,
            metrics_port,
            logging_level,
            cache_ttl: Duration::from_secs(cache_ttl_sec),
            max_recent,
            frontend_dir_path,
        })
    }
}
