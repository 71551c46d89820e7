use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{debug, error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jinglepress_server::config::{AppConfig, CliConfig, FileConfig};
use jinglepress_server::library::SqliteLibraryStore;
use jinglepress_server::media::FfmpegEngine;
use jinglepress_server::server::metrics;
use jinglepress_server::source::YtDlpEngine;
use jinglepress_server::staging::{FileHandler, SqliteStagingStore};
use jinglepress_server::tagging::Id3TagContainer;
use jinglepress_server::{run_server, Pipeline, PipelineDeps, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the database, scratch and uploads directories.
    #[clap(long, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Scratch directory for staged and temporary files (default: <data-dir>/scratch).
    #[clap(long, value_parser = parse_path)]
    pub scratch_dir: Option<PathBuf>,

    /// Directory of published files (default: <data-dir>/uploads).
    #[clap(long, value_parser = parse_path)]
    pub uploads_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Prefix of the public URLs of published files.
    #[clap(long)]
    pub public_base_url: Option<String>,

    #[clap(long)]
    pub ffmpeg_path: Option<PathBuf>,

    #[clap(long)]
    pub ffprobe_path: Option<PathBuf>,

    #[clap(long)]
    pub ytdlp_path: Option<PathBuf>,

    /// Timeout in seconds for external downloads.
    #[clap(long, default_value_t = 300)]
    pub download_timeout_sec: u64,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            data_dir: args.data_dir.clone(),
            scratch_dir: args.scratch_dir.clone(),
            uploads_dir: args.uploads_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            public_base_url: args.public_base_url.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            ffprobe_path: args.ffprobe_path.clone(),
            ytdlp_path: args.ytdlp_path.clone(),
            download_timeout_sec: args.download_timeout_sec,
        }
    }
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
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let files = Arc::new(FileHandler::new(
        config.scratch_dir.clone(),
        config.uploads_dir.clone(),
        config.pipeline.max_payload_bytes(),
    ));
    files
        .init()
        .await
        .context("Failed to create scratch and uploads directories")?;

    let db_path = config.db_path();
    info!("Opening SQLite database at {:?}...", db_path);
    let staging_store = Arc::new(SqliteStagingStore::open(&db_path)?);
    let library = Arc::new(SqliteLibraryStore::open(&db_path)?);

    let http = reqwest::Client::builder()
        .timeout(config.engines.download_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let engines = &config.engines;
    info!(
        "Using ffmpeg {:?}, ffprobe {:?}, yt-dlp {:?}",
        engines.ffmpeg_path, engines.ffprobe_path, engines.ytdlp_path
    );
    if config.audio_platform.api_token.is_none() {
        info!("No audio platform API token configured, signed requests disabled");
    }

    let pipeline = Arc::new(Pipeline::assemble(
        PipelineDeps {
            files: files.clone(),
            staging_store,
            library,
            media: Arc::new(FfmpegEngine::new(&engines.ffmpeg_path, &engines.ffprobe_path)),
            video_engine: Arc::new(YtDlpEngine::new(
                &engines.ytdlp_path,
                engines.download_timeout,
            )),
            tag_container: Arc::new(Id3TagContainer),
            http,
        },
        &config.pipeline,
        config.audio_platform.clone(),
        &config.public_base_url,
    ));

    // Reclaim scratch files left behind by requests that never finalized
    let ttl = config.pipeline.staging_ttl;
    let sweep_files = files.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sweep_files.sweep_orphans(ttl).await {
                Ok(0) => {}
                Ok(count) => info!("Swept {} expired scratch files", count),
                Err(e) => error!("Scratch sweep failed: {}", e),
            }
        }
    });
    debug!("Scratch sweep scheduled every {:?}", ttl);

    run_server(
        ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            metrics_port: config.metrics_port,
            uploads_dir: config.uploads_dir.clone(),
            max_body_bytes: config.pipeline.max_payload_bytes() as usize + 1024 * 1024,
        },
        pipeline,
    )
    .await
}
