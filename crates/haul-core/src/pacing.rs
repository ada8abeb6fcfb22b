//! Per-host pacing of extraction attempts.
//!
//! Wraps any [`ExtractionEngine`] so that consecutive attempts against the
//! same host are spaced at least `delay` apart, plus optional jitter.
//! Attempts against different hosts never wait on each other.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use haul_core::pacing::{PacedEngine, PacingConfig};
//! # use haul_core::engine::{EngineRequest, ExtractedMedia, ExtractionEngine};
//! # #[derive(Clone)] struct MyEngine;
//! # impl ExtractionEngine for MyEngine {
//! #     async fn acquire(&self, _: &EngineRequest) -> Result<ExtractedMedia, haul_core::AppError> { todo!() }
//! # }
//! let config = PacingConfig::new(Duration::from_secs(2)).with_jitter(Duration::from_millis(500));
//! let engine = PacedEngine::new(MyEngine, config);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::engine::{EngineRequest, ExtractedMedia, ExtractionEngine};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Minimum delay between attempts against the same host.
    pub delay: Duration,
    /// Maximum random jitter added on top of `delay` (uniform [0, jitter)).
    pub jitter: Duration,
}

impl PacingConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }
}

/// An [`ExtractionEngine`] wrapper that enforces per-host pacing.
#[derive(Clone)]
pub struct PacedEngine<E> {
    inner: E,
    config: PacingConfig,
    /// Last attempt start per host.
    last_attempt: Arc<Mutex<HashMap<String, Instant>>>,
}

impl<E: ExtractionEngine> PacedEngine<E> {
    pub fn new(inner: E, config: PacingConfig) -> Self {
        Self {
            inner,
            config,
            last_attempt: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn host_key(url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        Some(url.host_str()?.trim_start_matches("www.").to_lowercase())
    }

    async fn wait_for_host(&self, host: &str) {
        let sleep_for = {
            let mut map = self.last_attempt.lock().await;
            let now = Instant::now();
            // The stored instant may lie in the future when attempts are queued.
            let start = match map.get(host) {
                Some(&last) => (last + self.config.effective_delay()).max(now),
                None => now,
            };
            map.insert(host.to_string(), start);
            start.saturating_duration_since(now)
        };

        if !sleep_for.is_zero() {
            tracing::debug!(%host, sleep_ms = %sleep_for.as_millis(), "Pacing attempt");
            tokio::time::sleep(sleep_for).await;
        }
    }
}

impl<E: ExtractionEngine> ExtractionEngine for PacedEngine<E> {
    async fn acquire(&self, request: &EngineRequest) -> Result<ExtractedMedia, AppError> {
        if let Some(host) = Self::host_key(&request.url) {
            self.wait_for_host(&host).await;
        }
        self.inner.acquire(request).await
    }
}

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    (Uuid::new_v4().as_u128() % u128::from(max_ms)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockEngine, make_request};

    #[test]
    fn test_host_key_strips_www() {
        assert_eq!(
            PacedEngine::<MockEngine>::host_key("https://www.YouTube.com/watch?v=1"),
            Some("youtube.com".to_string())
        );
        assert_eq!(PacedEngine::<MockEngine>::host_key("not-a-url"), None);
    }

    #[test]
    fn test_effective_delay_with_jitter_is_bounded() {
        let config =
            PacingConfig::new(Duration::from_millis(100)).with_jitter(Duration::from_millis(50));
        for _ in 0..100 {
            let d = config.effective_delay();
            assert!(d >= Duration::from_millis(100));
            assert!(d < Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_pacing_delays_same_host() {
        let engine = PacedEngine::new(
            MockEngine::succeeding().without_files(),
            PacingConfig::new(Duration::from_millis(100)),
        );

        let start = Instant::now();
        engine.acquire(&make_request("https://vimeo.com/1")).await.unwrap();
        engine.acquire(&make_request("https://vimeo.com/2")).await.unwrap();
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(100),
            "second attempt should wait, elapsed: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_queued_attempts_are_each_spaced() {
        let engine = PacedEngine::new(
            MockEngine::succeeding().without_files(),
            PacingConfig::new(Duration::from_millis(150)),
        );

        let start = Instant::now();
        let started = |engine: PacedEngine<MockEngine>| async move {
            engine.wait_for_host("vimeo.com").await;
            start.elapsed()
        };
        let (a, b, c) = tokio::join!(
            started(engine.clone()),
            started(engine.clone()),
            started(engine.clone())
        );

        let mut starts = [a, b, c];
        starts.sort();
        assert!(starts[0] < Duration::from_millis(100), "starts: {starts:?}");
        assert!(starts[1] - starts[0] >= Duration::from_millis(140), "starts: {starts:?}");
        assert!(starts[2] - starts[1] >= Duration::from_millis(140), "starts: {starts:?}");
    }

    #[tokio::test]
    async fn test_pacing_ignores_other_hosts() {
        let engine = PacedEngine::new(
            MockEngine::succeeding().without_files(),
            PacingConfig::new(Duration::from_millis(300)),
        );

        let start = Instant::now();
        engine.acquire(&make_request("https://vimeo.com/1")).await.unwrap();
        engine.acquire(&make_request("https://www.twitch.tv/videos/1")).await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_pacing_passes_through_errors() {
        let engine = PacedEngine::new(
            MockEngine::with_outcomes(vec![Err(AppError::ExtractionFailed("HTTP Error 404".into()))]),
            PacingConfig::new(Duration::ZERO),
        );
        let err = engine
            .acquire(&make_request("https://vimeo.com/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed(_)));
    }
}
