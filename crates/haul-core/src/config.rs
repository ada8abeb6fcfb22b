use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

use crate::error::AppError;
use crate::pacing::PacingConfig;

/// Engine knobs shared by every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub socket_timeout_secs: u64,
    pub max_retries: u32,
    pub chunk_size: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            socket_timeout_secs: 60,
            max_retries: 10,
            chunk_size: 10 * 1024 * 1024,
        }
    }
}

/// Orchestrator behaviour.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Lifetime of a job record and its artifact.
    pub retention: TimeDelta,
    pub max_concurrent_jobs: usize,
    /// Upper bound for a single engine invocation.
    pub attempt_timeout: Duration,
    /// Reject URLs no provider rule matches.
    pub strict_providers: bool,
    pub engine: EngineSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retention: TimeDelta::hours(5),
            max_concurrent_jobs: 4,
            attempt_timeout: Duration::from_secs(900),
            strict_providers: true,
            engine: EngineSettings::default(),
        }
    }
}

/// Retention sweeper schedule.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub window: TimeDelta,
    pub sweep_interval: Duration,
    pub deep_sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window: TimeDelta::hours(5),
            sweep_interval: Duration::from_secs(30 * 60),
            deep_sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub downloads_dir: PathBuf,
    pub cookies_dir: PathBuf,
    pub ytdlp_path: String,
    /// Minimum delay between attempts against the same host. Zero disables pacing.
    pub pacing: Duration,
    /// Upper bound of the random delay added on top of `pacing`.
    pub pacing_jitter: Duration,
    pub orchestrator: OrchestratorConfig,
    pub retention: RetentionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            cookies_dir: PathBuf::from("cookies"),
            ytdlp_path: "yt-dlp".to_string(),
            pacing: Duration::ZERO,
            pacing_jitter: Duration::ZERO,
            orchestrator: OrchestratorConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from `HAUL_*` environment variables.
    ///
    /// - `HAUL_DOWNLOADS_DIR` (default `downloads`)
    /// - `HAUL_COOKIES_DIR` (default `cookies`)
    /// - `HAUL_RETENTION_HOURS` (default 5)
    /// - `HAUL_SWEEP_INTERVAL_MINUTES` (default 30)
    /// - `HAUL_DEEP_SWEEP_INTERVAL_MINUTES` (default 60)
    /// - `HAUL_MAX_CONCURRENT_JOBS` (default 4)
    /// - `HAUL_SOCKET_TIMEOUT_SECS` (default 60)
    /// - `HAUL_ATTEMPT_TIMEOUT_SECS` (default 900)
    /// - `HAUL_MAX_RETRIES` (default 10)
    /// - `HAUL_CHUNK_SIZE` (default 10485760)
    /// - `HAUL_PACING_MS` (default 0)
    /// - `HAUL_PACING_JITTER_MS` (default 0)
    /// - `HAUL_STRICT_PROVIDERS` (default true)
    /// - `HAUL_YTDLP_PATH` (default `yt-dlp`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let retention_hours: u64 = parse_positive(&lookup, "HAUL_RETENTION_HOURS", 5)?;
        let retention = TimeDelta::hours(retention_hours as i64);

        let engine = EngineSettings {
            socket_timeout_secs: parse_positive(&lookup, "HAUL_SOCKET_TIMEOUT_SECS", 60)?,
            max_retries: parse_var(&lookup, "HAUL_MAX_RETRIES", 10)?,
            chunk_size: parse_positive(&lookup, "HAUL_CHUNK_SIZE", 10 * 1024 * 1024)?,
        };

        let orchestrator = OrchestratorConfig {
            retention,
            max_concurrent_jobs: parse_positive(&lookup, "HAUL_MAX_CONCURRENT_JOBS", 4)?,
            attempt_timeout: Duration::from_secs(parse_positive(
                &lookup,
                "HAUL_ATTEMPT_TIMEOUT_SECS",
                900,
            )?),
            strict_providers: parse_bool(&lookup, "HAUL_STRICT_PROVIDERS", true)?,
            engine,
        };

        let retention = RetentionConfig {
            window: retention,
            sweep_interval: Duration::from_secs(
                60 * parse_positive::<u64, _>(&lookup, "HAUL_SWEEP_INTERVAL_MINUTES", 30)?,
            ),
            deep_sweep_interval: Duration::from_secs(
                60 * parse_positive::<u64, _>(&lookup, "HAUL_DEEP_SWEEP_INTERVAL_MINUTES", 60)?,
            ),
        };

        Ok(Self {
            downloads_dir: lookup("HAUL_DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.downloads_dir),
            cookies_dir: lookup("HAUL_COOKIES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cookies_dir),
            ytdlp_path: lookup("HAUL_YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            pacing: Duration::from_millis(parse_var(&lookup, "HAUL_PACING_MS", 0)?),
            pacing_jitter: Duration::from_millis(parse_var(&lookup, "HAUL_PACING_JITTER_MS", 0)?),
            orchestrator,
            retention,
        })
    }

    /// Pacing settings for [`PacedEngine`](crate::pacing::PacedEngine), or `None` when disabled.
    pub fn pacing_config(&self) -> Option<PacingConfig> {
        if self.pacing.is_zero() && self.pacing_jitter.is_zero() {
            return None;
        }
        Some(PacingConfig::new(self.pacing).with_jitter(self.pacing_jitter))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}': expected a number"))
        }),
    }
}

fn parse_positive<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + PartialEq + Default,
    F: Fn(&str) -> Option<String>,
{
    let value = parse_var(lookup, key, default)?;
    if value == T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::ConfigError(format!(
                "Invalid {key} '{raw}': expected true or false"
            ))),
        },
    }
}
