//! Extraction profiles and the per-provider chains they are tried in.
//!
//! A [`StrategyProfile`] is a named bundle of engine overrides (user agent,
//! headers, extractor arguments, retry knobs). The [`StrategyRegistry`] maps
//! each provider to an ordered chain of profiles that the orchestrator walks
//! until one succeeds. [`EngineConfig`] is the fully merged configuration
//! handed to the extraction engine for a single attempt.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::config::EngineSettings;
use crate::provider::Provider;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DESKTOP_121_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const IPHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
const INSTAGRAM_APP_USER_AGENT: &str = "Instagram 302.0.0.23.114 Android (28/9; 480dpi; 1080x2280; samsung; SM-G973F; beyond1; exynos9820; en_US; 483971587)";

/// One `namespace:key=value` extractor argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorArg {
    pub namespace: &'static str,
    pub key: &'static str,
    pub value: &'static str,
}

impl ExtractorArg {
    pub const fn new(namespace: &'static str, key: &'static str, value: &'static str) -> Self {
        Self {
            namespace,
            key,
            value,
        }
    }
}

/// A named set of engine overrides. Unset fields keep the base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyProfile {
    pub name: &'static str,
    pub provider: Option<Provider>,
    pub user_agent: Option<&'static str>,
    /// Replaces the base header set when non-empty.
    pub headers: &'static [(&'static str, &'static str)],
    /// Replaces the base extractor arguments when non-empty.
    pub extractor_args: &'static [ExtractorArg],
    pub retries: Option<u32>,
    pub fragment_retries: Option<u32>,
    pub extractor_retries: Option<u32>,
    pub sleep_interval_secs: Option<u32>,
    /// Never attach a credential file to attempts with this profile.
    pub forbid_credentials: bool,
}

impl StrategyProfile {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            provider: None,
            user_agent: None,
            headers: &[],
            extractor_args: &[],
            retries: None,
            fragment_retries: None,
            extractor_retries: None,
            sleep_interval_secs: None,
            forbid_credentials: false,
        }
    }
}

pub const DEFAULT: StrategyProfile = StrategyProfile::new("default");

pub const GENERIC: StrategyProfile = StrategyProfile {
    user_agent: Some(DESKTOP_121_USER_AGENT),
    headers: &[
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    retries: Some(3),
    fragment_retries: Some(3),
    extractor_retries: Some(2),
    ..StrategyProfile::new("generic")
};

pub const YOUTUBE_ANDROID: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Youtube),
    user_agent: Some("com.google.android.youtube/19.09.37 (Linux; U; Android 11) gzip"),
    extractor_args: &[
        ExtractorArg::new("youtube", "player_client", "android"),
        ExtractorArg::new("youtube", "player_skip", "configs"),
    ],
    ..StrategyProfile::new("youtube_android")
};

pub const YOUTUBE_IOS: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Youtube),
    user_agent: Some("com.google.ios.youtube/19.09.3 (iPhone14,3; U; CPU iOS 15_6 like Mac OS X)"),
    extractor_args: &[
        ExtractorArg::new("youtube", "player_client", "ios"),
        ExtractorArg::new("youtube", "player_skip", "configs"),
    ],
    ..StrategyProfile::new("youtube_ios")
};

pub const YOUTUBE_WEB: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Youtube),
    user_agent: Some(DESKTOP_121_USER_AGENT),
    extractor_args: &[
        ExtractorArg::new("youtube", "player_client", "web"),
        ExtractorArg::new("youtube", "player_skip", "configs"),
    ],
    ..StrategyProfile::new("youtube_web")
};

pub const YOUTUBE_TV_EMBEDDED: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Youtube),
    extractor_args: &[ExtractorArg::new("youtube", "player_client", "tv_embedded")],
    ..StrategyProfile::new("youtube_tv_embedded")
};

pub const INSTAGRAM_MOBILE: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Instagram),
    user_agent: Some(INSTAGRAM_APP_USER_AGENT),
    headers: &[
        ("Accept", "*/*"),
        ("Accept-Encoding", "gzip, deflate"),
        ("Accept-Language", "en-US"),
        ("X-IG-App-ID", "936619743392459"),
        ("X-IG-WWW-Claim", "0"),
        ("X-Requested-With", "XMLHttpRequest"),
    ],
    extractor_args: &[ExtractorArg::new("instagram", "comment_count", "0")],
    sleep_interval_secs: Some(1),
    ..StrategyProfile::new("instagram_mobile")
};

pub const INSTAGRAM_WEB: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Instagram),
    user_agent: Some(DESKTOP_121_USER_AGENT),
    headers: &[
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Cache-Control", "max-age=0"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    ..StrategyProfile::new("instagram_web")
};

pub const INSTAGRAM_ANONYMOUS: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Instagram),
    user_agent: Some(IPHONE_USER_AGENT),
    headers: &[("Accept-Language", "en-US,en;q=0.9")],
    forbid_credentials: true,
    ..StrategyProfile::new("instagram_anonymous")
};

pub const FACEBOOK_WEB: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Facebook),
    user_agent: Some(DESKTOP_121_USER_AGENT),
    headers: &[
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Cache-Control", "max-age=0"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    ..StrategyProfile::new("facebook_web")
};

pub const FACEBOOK_MOBILE: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Facebook),
    user_agent: Some(IPHONE_USER_AGENT),
    headers: &[
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
    ],
    ..StrategyProfile::new("facebook_mobile")
};

pub const FACEBOOK_EXTERNAL_HIT: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Facebook),
    user_agent: Some("facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)"),
    extractor_args: &[ExtractorArg::new("facebook", "api_version", "v18.0")],
    sleep_interval_secs: Some(2),
    forbid_credentials: true,
    ..StrategyProfile::new("facebook_external_hit")
};

pub const TIKTOK_WEB: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Tiktok),
    user_agent: Some(DESKTOP_121_USER_AGENT),
    headers: &[
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Referer", "https://www.tiktok.com/"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "same-origin"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    ..StrategyProfile::new("tiktok_web")
};

pub const TIKTOK_MOBILE: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Tiktok),
    user_agent: Some(IPHONE_USER_AGENT),
    headers: &[
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
    ],
    ..StrategyProfile::new("tiktok_mobile")
};

pub const TIKTOK_API: StrategyProfile = StrategyProfile {
    provider: Some(Provider::Tiktok),
    user_agent: Some("com.zhiliaoapp.musically/2023405020 (Linux; U; Android 10; en_US; Redmi Note 8; Build/QKQ1.200114.002)"),
    extractor_args: &[
        ExtractorArg::new("tiktok", "api_hostname", "api-h2.tiktokv.com"),
        ExtractorArg::new("tiktok", "app_name", "trill"),
        ExtractorArg::new("tiktok", "app_version", "34.1.2"),
        ExtractorArg::new("tiktok", "manifest_app_version", "2023405020"),
        ExtractorArg::new("tiktok", "aid", "1988"),
    ],
    ..StrategyProfile::new("tiktok_api")
};

/// Ordered profile chains per provider.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    chains: HashMap<Provider, Vec<StrategyProfile>>,
    default_chain: Vec<StrategyProfile>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(vec![DEFAULT, GENERIC])
            .with_chain(
                Provider::Youtube,
                vec![YOUTUBE_ANDROID, YOUTUBE_IOS, YOUTUBE_WEB, YOUTUBE_TV_EMBEDDED, GENERIC],
            )
            .with_chain(
                Provider::Instagram,
                vec![INSTAGRAM_MOBILE, INSTAGRAM_WEB, INSTAGRAM_ANONYMOUS, GENERIC],
            )
            .with_chain(
                Provider::Facebook,
                vec![FACEBOOK_WEB, FACEBOOK_MOBILE, FACEBOOK_EXTERNAL_HIT, GENERIC],
            )
            .with_chain(
                Provider::Tiktok,
                vec![TIKTOK_WEB, TIKTOK_MOBILE, TIKTOK_API, GENERIC],
            )
    }
}

impl StrategyRegistry {
    /// Registry where every provider uses `default_chain`.
    pub fn new(default_chain: Vec<StrategyProfile>) -> Self {
        Self {
            chains: HashMap::new(),
            default_chain,
        }
    }

    pub fn with_chain(mut self, provider: Provider, chain: Vec<StrategyProfile>) -> Self {
        self.chains.insert(provider, chain);
        self
    }

    /// Profiles to try for `provider`, in order.
    pub fn profiles_for(&self, provider: Provider) -> &[StrategyProfile] {
        self.chains
            .get(&provider)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_chain)
    }
}

/// Merged engine configuration for one extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub format: String,
    pub output_template: String,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    /// Extractor arguments grouped by namespace, in insertion order.
    pub extractor_args: BTreeMap<String, Vec<(String, String)>>,
    pub cookie_file: Option<PathBuf>,
    pub socket_timeout_secs: u64,
    pub retries: u32,
    pub fragment_retries: u32,
    pub extractor_retries: u32,
    pub chunk_size: u64,
    pub sleep_interval_secs: Option<u32>,
    pub geo_bypass_country: Option<String>,
    pub merge_output_format: Option<String>,
    pub write_thumbnail: bool,
}

impl EngineConfig {
    /// Service-wide options every attempt starts from.
    pub fn base(
        provider: Provider,
        format: impl Into<String>,
        output_template: impl Into<String>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            format: format.into(),
            output_template: output_template.into(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            headers: base_headers(provider),
            extractor_args: BTreeMap::new(),
            cookie_file: None,
            socket_timeout_secs: settings.socket_timeout_secs,
            retries: settings.max_retries,
            fragment_retries: settings.max_retries,
            extractor_retries: 5,
            chunk_size: settings.chunk_size,
            sleep_interval_secs: None,
            geo_bypass_country: Some("US".to_string()),
            merge_output_format: Some("mp4".to_string()),
            write_thumbnail: true,
        }
    }

    /// Overlay `profile` on this configuration. Profile fields win.
    pub fn merged_with(&self, profile: &StrategyProfile) -> Self {
        let mut merged = self.clone();
        if let Some(ua) = profile.user_agent {
            merged.user_agent = ua.to_string();
        }
        if !profile.headers.is_empty() {
            merged.headers = profile
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
        if !profile.extractor_args.is_empty() {
            merged.extractor_args = BTreeMap::new();
            for arg in profile.extractor_args {
                merged
                    .extractor_args
                    .entry(arg.namespace.to_string())
                    .or_default()
                    .push((arg.key.to_string(), arg.value.to_string()));
            }
        }
        if let Some(n) = profile.retries {
            merged.retries = n;
        }
        if let Some(n) = profile.fragment_retries {
            merged.fragment_retries = n;
        }
        if let Some(n) = profile.extractor_retries {
            merged.extractor_retries = n;
        }
        if profile.sleep_interval_secs.is_some() {
            merged.sleep_interval_secs = profile.sleep_interval_secs;
        }
        if profile.forbid_credentials {
            merged.cookie_file = None;
        }
        merged
    }
}

fn base_headers(provider: Provider) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = [
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("DNT", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let origin = match provider {
        Provider::Instagram => Some("https://www.instagram.com"),
        Provider::Facebook => Some("https://www.facebook.com"),
        Provider::Tiktok => Some("https://www.tiktok.com"),
        _ => None,
    };
    if let Some(origin) = origin {
        headers.insert("Referer".to_string(), format!("{origin}/"));
        headers.insert("Origin".to_string(), origin.to_string());
    }
    headers
}
