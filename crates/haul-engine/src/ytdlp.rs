use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use haul_core::engine::{EngineRequest, ExtractedMedia, ExtractionEngine};
use haul_core::error::AppError;

use crate::args::build_args;

/// Lines of stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 8;

/// Extraction engine backed by the `yt-dlp` executable.
///
/// Each attempt spawns one child process. The child is killed if the
/// attempt future is dropped, e.g. when the orchestrator's timeout fires.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// `yt-dlp --version`, for health checks.
    pub async fn version(&self) -> Result<String, AppError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(AppError::ExtractionFailed(stderr_tail(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn spawn_error(&self, err: std::io::Error) -> AppError {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::ExtractionFailed(format!(
                "yt-dlp executable not found at '{}'",
                self.binary.display()
            ))
        } else {
            AppError::ExtractionFailed(format!("Failed to start yt-dlp: {err}"))
        }
    }
}

impl ExtractionEngine for YtDlpEngine {
    async fn acquire(&self, request: &EngineRequest) -> Result<ExtractedMedia, AppError> {
        let args = build_args(request);
        tracing::debug!(profile = request.profile, url = %request.url, "Invoking yt-dlp");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let tail = stderr_tail(&output.stderr);
            tracing::debug!(profile = request.profile, status = ?output.status.code(), "yt-dlp exited with failure");
            return Err(AppError::ExtractionFailed(if tail.is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                tail
            }));
        }

        parse_info(&output.stdout)
    }
}

#[derive(Debug, Default, Deserialize)]
struct InfoJson {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    ext: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    uploader: Option<String>,
    #[serde(default)]
    entries: Vec<Option<InfoJson>>,
}

/// Parse the JSON document `yt-dlp -J` prints on stdout.
pub(crate) fn parse_info(stdout: &[u8]) -> Result<ExtractedMedia, AppError> {
    let text = String::from_utf8_lossy(stdout);
    let info: InfoJson = match serde_json::from_str(text.trim()) {
        Ok(info) => info,
        // Stray output before the document: take the last line.
        Err(e) => {
            let last = text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            serde_json::from_str(last).map_err(|_| {
                AppError::ExtractionFailed(format!("Unreadable yt-dlp output: {e}"))
            })?
        }
    };

    let entries: Vec<&InfoJson> = info.entries.iter().flatten().collect();
    let is_collection = info.kind.as_deref() == Some("playlist") || !entries.is_empty();
    let first = entries.first().copied();

    let duration = if is_collection {
        entries.iter().filter_map(|e| e.duration).sum::<f64>()
    } else {
        info.duration.unwrap_or(0.0)
    };

    Ok(ExtractedMedia {
        title: info
            .title
            .clone()
            .or_else(|| first.and_then(|e| e.title.clone()))
            .unwrap_or_else(|| "Unknown Video".to_string()),
        duration_secs: duration.max(0.0).round() as u64,
        format: info
            .ext
            .clone()
            .or_else(|| first.and_then(|e| e.ext.clone()))
            .unwrap_or_else(|| "mp4".to_string()),
        thumbnail: info
            .thumbnail
            .clone()
            .or_else(|| first.and_then(|e| e.thumbnail.clone())),
        source_url: info.webpage_url.clone().or_else(|| info.original_url.clone()),
        uploader: info.uploader.clone(),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use haul_core::failure::{ErrorCategory, classify_failure};
    use haul_core::testutil::make_request;

    use super::*;

    #[test]
    fn test_parse_single_video() {
        let json = br#"{"title":"Clip","duration":61.6,"ext":"mp4","thumbnail":"https://i.ytimg.com/x.jpg","webpage_url":"https://www.youtube.com/watch?v=1","uploader":"Someone"}"#;
        let media = parse_info(json).unwrap();
        assert_eq!(media.title, "Clip");
        assert_eq!(media.duration_secs, 62);
        assert_eq!(media.format, "mp4");
        assert_eq!(media.source_url.as_deref(), Some("https://www.youtube.com/watch?v=1"));
        assert_eq!(media.uploader.as_deref(), Some("Someone"));
    }

    #[test]
    fn test_parse_playlist() {
        let json = br#"{"_type":"playlist","title":"Album","webpage_url":"https://vimeo.com/album/1",
            "entries":[{"title":"a","duration":10,"ext":"webm","thumbnail":"t1"},null,{"title":"b","duration":5,"ext":"mp4"}]}"#;
        let media = parse_info(json).unwrap();
        assert_eq!(media.title, "Album");
        assert_eq!(media.duration_secs, 15);
        assert_eq!(media.format, "webm");
        assert_eq!(media.thumbnail.as_deref(), Some("t1"));
    }

    #[test]
    fn test_parse_with_leading_noise() {
        let out = b"[info] something\n{\"title\":\"T\"}\n";
        let media = parse_info(out).unwrap();
        assert_eq!(media.title, "T");
        assert_eq!(media.format, "mp4");
        assert_eq!(media.duration_secs, 0);
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = parse_info(b"not json at all").unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed(_)));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..20).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 12"));
        assert!(tail.ends_with("line 19"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_missing_dependency() {
        let engine = YtDlpEngine::new("/nonexistent/bin/yt-dlp-haul-test");
        let err = engine
            .acquire(&make_request("https://vimeo.com/1"))
            .await
            .unwrap_err();
        let report = classify_failure(&err.to_string());
        assert_eq!(report.category, ErrorCategory::MissingDependency);
    }
}
