//! Provider identification for submitted URLs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Remote platform a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Youtube,
    Tiktok,
    Instagram,
    Twitter,
    Facebook,
    Vimeo,
    Dailymotion,
    Twitch,
    Unknown,
}

impl Provider {
    pub const ALL: [Provider; 8] = [
        Provider::Youtube,
        Provider::Tiktok,
        Provider::Instagram,
        Provider::Twitter,
        Provider::Facebook,
        Provider::Vimeo,
        Provider::Dailymotion,
        Provider::Twitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Youtube => "youtube",
            Provider::Tiktok => "tiktok",
            Provider::Instagram => "instagram",
            Provider::Twitter => "twitter",
            Provider::Facebook => "facebook",
            Provider::Vimeo => "vimeo",
            Provider::Dailymotion => "dailymotion",
            Provider::Twitch => "twitch",
            Provider::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Provider::Unknown)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(Provider::Youtube),
            "tiktok" => Ok(Provider::Tiktok),
            "instagram" => Ok(Provider::Instagram),
            "twitter" | "x" => Ok(Provider::Twitter),
            "facebook" => Ok(Provider::Facebook),
            "vimeo" => Ok(Provider::Vimeo),
            "dailymotion" => Ok(Provider::Dailymotion),
            "twitch" => Ok(Provider::Twitch),
            "unknown" => Ok(Provider::Unknown),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Maps a set of domains to a provider.
///
/// A host matches a domain when it is equal to it or is one of its subdomains,
/// so `m.youtube.com` matches `youtube.com` while `notyoutube.com` does not.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRule {
    pub provider: Provider,
    pub domains: &'static [&'static str],
}

impl ProviderRule {
    pub const fn new(provider: Provider, domains: &'static [&'static str]) -> Self {
        Self { provider, domains }
    }

    fn matches_host(&self, host: &str) -> bool {
        self.domains.iter().any(|&domain| {
            host == domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Built-in rules, evaluated in order.
pub const DEFAULT_RULES: &[ProviderRule] = &[
    ProviderRule::new(Provider::Youtube, &["youtube.com", "youtu.be"]),
    ProviderRule::new(Provider::Tiktok, &["tiktok.com"]),
    ProviderRule::new(Provider::Instagram, &["instagram.com"]),
    ProviderRule::new(Provider::Twitter, &["twitter.com", "x.com"]),
    ProviderRule::new(Provider::Facebook, &["facebook.com", "fb.watch"]),
    ProviderRule::new(Provider::Vimeo, &["vimeo.com"]),
    ProviderRule::new(Provider::Dailymotion, &["dailymotion.com"]),
    ProviderRule::new(Provider::Twitch, &["twitch.tv"]),
];

/// Classifies URLs into providers using an ordered rule list.
#[derive(Debug, Clone)]
pub struct PlatformClassifier {
    rules: Vec<ProviderRule>,
}

impl Default for PlatformClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl PlatformClassifier {
    pub fn new(rules: Vec<ProviderRule>) -> Self {
        Self { rules }
    }

    /// Return the provider of the first matching rule, or [`Provider::Unknown`].
    pub fn classify(&self, url: &str) -> Provider {
        let Some(host) = host_of(url) else {
            return Provider::Unknown;
        };
        self.rules
            .iter()
            .find(|rule| rule.matches_host(&host))
            .map(|rule| rule.provider)
            .unwrap_or(Provider::Unknown)
    }
}

/// Returns true for absolute http(s) URLs with a non-empty host.
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    if host.is_empty() { None } else { Some(host) }
}
