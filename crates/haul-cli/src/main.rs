use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use haul_core::provider::is_valid_url;
use haul_core::{
    ArtifactDir, CredentialStore, GroupingMode, JobState, MemoryJobStore, Orchestrator,
    PacedEngine, PlatformClassifier, Provider, Quality, RetentionSweeper,
    ServiceConfig, SharedEngine, StrategyRegistry, SubmitRequest, validate_credential,
};
use haul_engine::YtDlpEngine;

#[derive(Parser)]
#[command(name = "haul", version, about = "Media acquisition with per-platform fallback strategies")]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `HAUL_*` configuration.
#[derive(Args)]
struct ServiceArgs {
    /// Directory artifacts are written to
    #[arg(long, global = true, env = "HAUL_DOWNLOADS_DIR")]
    downloads_dir: Option<PathBuf>,

    /// Directory holding `{provider}.com_cookies.txt` credential files
    #[arg(long, global = true, env = "HAUL_COOKIES_DIR")]
    cookies_dir: Option<PathBuf>,

    /// Path to the yt-dlp executable
    #[arg(long, global = true, env = "HAUL_YTDLP_PATH")]
    ytdlp_path: Option<String>,

    /// Hours an artifact is kept after completion
    #[arg(long, global = true, env = "HAUL_RETENTION_HOURS")]
    retention_hours: Option<u64>,

    /// Time budget for a single extraction attempt
    #[arg(long, global = true, env = "HAUL_ATTEMPT_TIMEOUT_SECS")]
    attempt_timeout_secs: Option<u64>,

    /// Minimum delay between attempts against the same host (0 disables)
    #[arg(long, global = true, env = "HAUL_PACING_MS")]
    pacing_ms: Option<u64>,

    /// Upper bound of the random delay added to each paced attempt
    #[arg(long, global = true, env = "HAUL_PACING_JITTER_MS")]
    pacing_jitter_ms: Option<u64>,
}

impl ServiceArgs {
    fn apply(self, config: &mut ServiceConfig) -> Result<()> {
        if let Some(dir) = self.downloads_dir {
            config.downloads_dir = dir;
        }
        if let Some(dir) = self.cookies_dir {
            config.cookies_dir = dir;
        }
        if let Some(path) = self.ytdlp_path {
            config.ytdlp_path = path;
        }
        if let Some(hours) = self.retention_hours {
            anyhow::ensure!(hours > 0, "--retention-hours must be positive");
            let window = TimeDelta::hours(hours as i64);
            config.orchestrator.retention = window;
            config.retention.window = window;
        }
        if let Some(secs) = self.attempt_timeout_secs {
            anyhow::ensure!(secs > 0, "--attempt-timeout-secs must be positive");
            config.orchestrator.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.pacing_ms {
            config.pacing = Duration::from_millis(ms);
        }
        if let Some(ms) = self.pacing_jitter_ms {
            config.pacing_jitter = Duration::from_millis(ms);
        }
        Ok(())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download one URL and print the final job status as JSON
    Download {
        /// Media URL
        url: String,

        /// 360p, 480p, 720p, 1080p, 1440p or best
        #[arg(short, long, default_value = "720p")]
        quality: Quality,

        /// single or collection (playlist, album)
        #[arg(short, long, default_value = "single")]
        grouping: GroupingMode,

        /// Accept URLs of unrecognised providers
        #[arg(long, default_value_t = false)]
        lenient: bool,
    },

    /// Show the provider and strategy chain a URL would use
    Classify {
        /// Media URL
        url: String,
    },

    /// Validate or install credential (cookie) files
    Cookies {
        #[command(subcommand)]
        action: CookiesAction,
    },

    /// Delete artifacts older than the retention window
    Sweep,
}

#[derive(Subcommand)]
enum CookiesAction {
    /// Check that a file is a usable Netscape cookie file
    Check {
        /// Cookie file
        file: PathBuf,
    },

    /// Validate a cookie file and install it for a provider
    Install {
        /// youtube, instagram, tiktok, twitter, facebook or vimeo
        provider: Provider,

        /// Cookie file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("haul=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env().context("Invalid HAUL_* configuration")?;
    cli.service.apply(&mut config)?;

    match cli.command {
        Commands::Download {
            url,
            quality,
            grouping,
            lenient,
        } => cmd_download(&config, &url, quality, grouping, lenient).await?,
        Commands::Classify { url } => cmd_classify(&config, &url).await?,
        Commands::Cookies { action } => match action {
            CookiesAction::Check { file } => cmd_cookies_check(&file).await?,
            CookiesAction::Install { provider, file } => {
                cmd_cookies_install(&config, provider, &file).await?
            }
        },
        Commands::Sweep => cmd_sweep(&config).await?,
    }

    Ok(())
}

fn build_engine(config: &ServiceConfig) -> SharedEngine {
    let ytdlp = YtDlpEngine::new(&config.ytdlp_path);
    match config.pacing_config() {
        Some(pacing) => SharedEngine::new(PacedEngine::new(ytdlp, pacing)),
        None => SharedEngine::new(ytdlp),
    }
}

async fn cmd_download(
    config: &ServiceConfig,
    url: &str,
    quality: Quality,
    grouping: GroupingMode,
    lenient: bool,
) -> Result<()> {
    let artifacts = ArtifactDir::new(&config.downloads_dir);
    artifacts
        .ensure()
        .await
        .with_context(|| format!("Cannot use {}", config.downloads_dir.display()))?;

    let orchestrator = Orchestrator::new(
        MemoryJobStore::new(),
        build_engine(config),
        CredentialStore::new(&config.cookies_dir),
        artifacts,
        config.orchestrator.clone(),
    );

    let mut request = SubmitRequest::new(url)
        .with_quality(quality)
        .with_grouping(grouping);
    if lenient {
        request = request.with_strict(false);
    }

    let receipt = orchestrator.submit(request).await?;
    tracing::info!(job_id = %receipt.job_id, "{}", receipt.message);

    orchestrator.drain().await;

    let view = orchestrator.get_status(receipt.job_id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    if view.state != JobState::Completed {
        anyhow::bail!("{}", view.message);
    }
    Ok(())
}

async fn cmd_classify(config: &ServiceConfig, url: &str) -> Result<()> {
    let provider = PlatformClassifier::default().classify(url);
    let registry = StrategyRegistry::default();
    let profiles: Vec<&str> = registry
        .profiles_for(provider)
        .iter()
        .map(|p| p.name)
        .collect();
    let credential = CredentialStore::new(&config.cookies_dir)
        .resolve(provider)
        .await;

    let output = serde_json::json!({
        "url": url,
        "valid_url": is_valid_url(url),
        "provider": provider,
        "recognised": provider.is_known(),
        "profiles": profiles,
        "credential": credential.map(|p| p.display().to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_cookies_check(file: &Path) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    validate_credential(&content)?;
    println!("{}: valid Netscape cookie file", file.display());
    Ok(())
}

async fn cmd_cookies_install(config: &ServiceConfig, provider: Provider, file: &Path) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let installed = CredentialStore::new(&config.cookies_dir)
        .install(provider, &content)
        .await?;
    println!("Installed cookies for {provider} at {}", installed.display());
    Ok(())
}

async fn cmd_sweep(config: &ServiceConfig) -> Result<()> {
    let sweeper = RetentionSweeper::new(
        MemoryJobStore::new(),
        ArtifactDir::new(&config.downloads_dir),
        config.retention.clone(),
    );

    let report = sweeper.sweep_artifacts(Utc::now()).await;
    let stats = sweeper.stats().await;

    let output = serde_json::json!({
        "report": report,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if report.errors > 0 {
        anyhow::bail!("{} files could not be removed", report.errors);
    }
    Ok(())
}
