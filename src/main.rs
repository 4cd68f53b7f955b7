use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use umore_server::audio::LocalAudioResolver;
use umore_server::cache::{ResponseCache, SWEEP_INTERVAL};
use umore_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use umore_server::config::{AppConfig, CliConfig, FileConfig};
use umore_server::radio::{RadioManager, DEFAULT_MAX_RECENT};
use umore_server::server::{self, metrics, RequestsLoggingLevel, ServerConfig, ServerState};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite catalog database file. May instead be given in
    /// the config file.
    pub catalog_db: Option<PathBuf>,

    /// Path to a TOML config file; its values override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory the audio files are served from.
    #[clap(long)]
    pub audio_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// How long cached playlist and mood-list responses stay fresh.
    #[clap(long, default_value_t = 300)]
    pub cache_ttl_sec: u64,

    /// How many recently played tracks each mood remembers.
    #[clap(long, default_value_t = DEFAULT_MAX_RECENT)]
    pub max_recent: usize,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;

    let cli = CliConfig {
        catalog_db: cli_args.catalog_db,
        audio_dir: cli_args.audio_dir,
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        logging_level: cli_args.logging_level,
        cache_ttl_sec: cli_args.cache_ttl_sec,
        max_recent: cli_args.max_recent,
        frontend_dir_path: cli_args.frontend_dir_path,
    };
    let config = AppConfig::resolve(&cli, file_config)?;

    info!("Opening catalog database at {:?}...", config.catalog_db);
    let catalog_store: Arc<dyn CatalogStore> =
        Arc::new(SqliteCatalogStore::new(&config.catalog_db)?);

    info!("Initializing metrics...");
    metrics::init_metrics();
    match catalog_store.get_mood_stats() {
        Ok(stats) => metrics::init_catalog_metrics(&stats),
        Err(err) => error!("Failed to read mood stats for metrics: {}", err),
    }

    let cache = Arc::new(ResponseCache::new(config.cache_ttl));

    // Periodic sweep keeps cache memory bounded even without read traffic.
    {
        let sweep_cache = cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = sweep_cache.sweep_expired();
                if removed > 0 {
                    debug!("Swept {} expired cache entries", removed);
                }
            }
        });
    }

    let radio_manager = Arc::new(RadioManager::new(catalog_store.clone(), config.max_recent));
    let audio_resolver = Arc::new(LocalAudioResolver::new("audio"));

    let metrics_cache = cache.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(err) = metrics::run_metrics_server(metrics_port, metrics_cache).await {
            error!("Metrics server error: {}", err);
        }
    });

    let state = ServerState {
        config: ServerConfig {
            port: config.port,
            requests_logging_level: config.logging_level,
            audio_dir: config.audio_dir,
            frontend_dir_path: config.frontend_dir_path,
        },
        start_time: Instant::now(),
        catalog_store,
        radio_manager,
        cache,
        audio_resolver,
    };

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    server::run_server(state).await
}
