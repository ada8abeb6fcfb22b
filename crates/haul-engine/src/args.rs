//! Command-line construction for `yt-dlp`.

use haul_core::engine::EngineRequest;
use haul_core::job::GroupingMode;

/// Build the `yt-dlp` argument list for one attempt.
///
/// The URL always comes last, after `--`, so it can never be read as an option.
pub fn build_args(request: &EngineRequest) -> Vec<String> {
    let config = &request.config;
    let mut args: Vec<String> = Vec::with_capacity(48);
    let mut push = |flag: &str, value: String| {
        args.push(flag.to_string());
        args.push(value);
    };

    push("-f", config.format.clone());
    push("-o", config.output_template.clone());
    if let Some(container) = &config.merge_output_format {
        push("--merge-output-format", container.clone());
    }
    push("--socket-timeout", config.socket_timeout_secs.to_string());
    push("--retries", config.retries.to_string());
    push("--fragment-retries", config.fragment_retries.to_string());
    push("--extractor-retries", config.extractor_retries.to_string());
    push("--http-chunk-size", config.chunk_size.to_string());
    push("--user-agent", config.user_agent.clone());
    if let Some(country) = &config.geo_bypass_country {
        push("--geo-bypass-country", country.clone());
    }
    if let Some(secs) = config.sleep_interval_secs {
        push("--sleep-interval", secs.to_string());
    }
    for (name, value) in &config.headers {
        push("--add-header", format!("{name}:{value}"));
    }
    for (namespace, pairs) in &config.extractor_args {
        let joined = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        push("--extractor-args", format!("{namespace}:{joined}"));
    }
    if let Some(cookie_file) = &config.cookie_file {
        push("--cookies", cookie_file.to_string_lossy().into_owned());
    }

    if config.write_thumbnail {
        args.push("--write-thumbnail".to_string());
    }
    args.push(
        match request.grouping {
            GroupingMode::Single => "--no-playlist",
            GroupingMode::Collection => "--yes-playlist",
        }
        .to_string(),
    );
    args.extend(
        [
            "--no-warnings",
            "--no-progress",
            "--skip-unavailable-fragments",
            "-J",
            "--no-simulate",
            "--",
        ]
        .map(String::from),
    );
    args.push(request.url.clone());
    args
}
