//! Maps raw extraction failure text to user-facing categories.
//!
//! Rules are evaluated top to bottom and the first match wins. Each rule is a
//! conjunction of term sets: every set must contribute at least one substring
//! found in the lower-cased message. Provider-specific rules come before the
//! generic ones so that, for example, an Instagram authentication failure is
//! reported more precisely than a bare "authentication" match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of failure categories shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    InstagramAuthError,
    InstagramExtractionError,
    FacebookParseError,
    FacebookFormatError,
    FacebookUrlError,
    TiktokBlocked,
    YoutubeUnavailable,
    YoutubeAgeVerification,
    YoutubeMembersOnly,
    YoutubePremiere,
    YoutubeClientError,
    MissingDependency,
    PrivateVideo,
    GeoRestricted,
    AgeRestricted,
    Copyright,
    FormatError,
    NetworkError,
    VideoNotFound,
    LiveStream,
    AuthRequired,
    GeneralError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InstagramAuthError => "INSTAGRAM_AUTH_ERROR",
            ErrorCategory::InstagramExtractionError => "INSTAGRAM_EXTRACTION_ERROR",
            ErrorCategory::FacebookParseError => "FACEBOOK_PARSE_ERROR",
            ErrorCategory::FacebookFormatError => "FACEBOOK_FORMAT_ERROR",
            ErrorCategory::FacebookUrlError => "FACEBOOK_URL_ERROR",
            ErrorCategory::TiktokBlocked => "TIKTOK_BLOCKED",
            ErrorCategory::YoutubeUnavailable => "YOUTUBE_UNAVAILABLE",
            ErrorCategory::YoutubeAgeVerification => "YOUTUBE_AGE_VERIFICATION",
            ErrorCategory::YoutubeMembersOnly => "YOUTUBE_MEMBERS_ONLY",
            ErrorCategory::YoutubePremiere => "YOUTUBE_PREMIERE",
            ErrorCategory::YoutubeClientError => "YOUTUBE_CLIENT_ERROR",
            ErrorCategory::MissingDependency => "MISSING_DEPENDENCY",
            ErrorCategory::PrivateVideo => "PRIVATE_VIDEO",
            ErrorCategory::GeoRestricted => "GEO_RESTRICTED",
            ErrorCategory::AgeRestricted => "AGE_RESTRICTED",
            ErrorCategory::Copyright => "COPYRIGHT",
            ErrorCategory::FormatError => "FORMAT_ERROR",
            ErrorCategory::NetworkError => "NETWORK_ERROR",
            ErrorCategory::VideoNotFound => "VIDEO_NOT_FOUND",
            ErrorCategory::LiveStream => "LIVE_STREAM",
            ErrorCategory::AuthRequired => "AUTH_REQUIRED",
            ErrorCategory::GeneralError => "GENERAL_ERROR",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::InstagramAuthError => {
                "Instagram requires authentication to access this content. Please provide fresh cookies or try again later."
            }
            ErrorCategory::InstagramExtractionError => {
                "Unable to extract Instagram content. The post may be private or deleted."
            }
            ErrorCategory::FacebookParseError => {
                "Unable to parse Facebook video data. The video may be private or deleted."
            }
            ErrorCategory::FacebookFormatError => {
                "No downloadable video formats found on Facebook. The content may be protected."
            }
            ErrorCategory::FacebookUrlError => {
                "This Facebook URL format is not supported. Please use a direct video URL."
            }
            ErrorCategory::TiktokBlocked => {
                "TikTok has blocked access from this server's IP address. This is a temporary restriction."
            }
            ErrorCategory::YoutubeUnavailable => {
                "YouTube video is unavailable. It may be private, deleted, or region-restricted."
            }
            ErrorCategory::YoutubeAgeVerification => {
                "This YouTube video requires age verification or sign-in to access."
            }
            ErrorCategory::YoutubeMembersOnly => {
                "This YouTube video is available to channel members only."
            }
            ErrorCategory::YoutubePremiere => {
                "This YouTube video is scheduled as a premiere and not yet available."
            }
            ErrorCategory::YoutubeClientError => {
                "YouTube rejected every client configuration that was tried."
            }
            ErrorCategory::MissingDependency => {
                "A component required by the extraction engine is not available on the server."
            }
            ErrorCategory::PrivateVideo => {
                "This video is private or unavailable. Please check if the video is publicly accessible."
            }
            ErrorCategory::GeoRestricted => {
                "This video is not available in the server's region due to geographical restrictions."
            }
            ErrorCategory::AgeRestricted => "This video is age-restricted and cannot be downloaded.",
            ErrorCategory::Copyright => {
                "This video is protected by copyright and cannot be downloaded."
            }
            ErrorCategory::FormatError => "No suitable video format found for download.",
            ErrorCategory::NetworkError => "Network error occurred while downloading the video.",
            ErrorCategory::VideoNotFound => {
                "Video not found. The URL may be incorrect or the video may have been deleted."
            }
            ErrorCategory::LiveStream => "Live streams cannot be downloaded while they are active.",
            ErrorCategory::AuthRequired => "This video requires authentication to access.",
            ErrorCategory::GeneralError => "An error occurred while processing your request.",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            ErrorCategory::InstagramAuthError => {
                "This Instagram post may be private or require login. Upload fresh Instagram cookies or try a public post."
            }
            ErrorCategory::InstagramExtractionError => {
                "Ensure the Instagram URL is correct and the post is publicly accessible."
            }
            ErrorCategory::FacebookParseError => {
                "Ensure the Facebook video is publicly accessible and the URL is correct."
            }
            ErrorCategory::FacebookFormatError => {
                "This Facebook video may not be downloadable due to privacy settings."
            }
            ErrorCategory::FacebookUrlError => {
                "Try using a direct Facebook video URL instead of a profile or page URL."
            }
            ErrorCategory::TiktokBlocked => {
                "TikTok may have rate-limited the server. Try again later."
            }
            ErrorCategory::YoutubeUnavailable => {
                "Check if the YouTube video exists and is publicly accessible."
            }
            ErrorCategory::YoutubeAgeVerification => {
                "Upload YouTube cookies from a signed-in account to access age-restricted videos."
            }
            ErrorCategory::YoutubeMembersOnly => {
                "This content requires a YouTube channel membership to access."
            }
            ErrorCategory::YoutubePremiere => {
                "Wait for the premiere to start or check the scheduled time."
            }
            ErrorCategory::YoutubeClientError => {
                "Try again later; YouTube client behaviour changes frequently."
            }
            ErrorCategory::MissingDependency => {
                "Contact the service operator to install the missing component."
            }
            ErrorCategory::PrivateVideo => "Try a different video URL or contact the video owner.",
            ErrorCategory::GeoRestricted => "This content may be restricted in the server's location.",
            ErrorCategory::AgeRestricted => "Age-restricted content requires authenticated cookies.",
            ErrorCategory::Copyright => "Please respect copyright restrictions.",
            ErrorCategory::FormatError => {
                "Try selecting a different quality or check if the video supports downloads."
            }
            ErrorCategory::NetworkError => "Please try again in a few minutes.",
            ErrorCategory::VideoNotFound => "Please verify the URL and try again.",
            ErrorCategory::LiveStream => {
                "Wait for the stream to end or try downloading a recorded version."
            }
            ErrorCategory::AuthRequired => "Upload cookies for this platform and retry.",
            ErrorCategory::GeneralError => {
                "Please try again later or contact support if the issue persists."
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RULES
            .iter()
            .map(|rule| rule.category)
            .chain(std::iter::once(ErrorCategory::GeneralError))
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown error category: {}", s))
    }
}

/// Classified failure: what callers see instead of raw engine output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub category: ErrorCategory,
    pub user_message: &'static str,
    pub suggestion: &'static str,
}

impl From<ErrorCategory> for FailureReport {
    fn from(category: ErrorCategory) -> Self {
        Self {
            category,
            user_message: category.user_message(),
            suggestion: category.suggestion(),
        }
    }
}

/// One entry of the ordered rule table.
#[derive(Debug)]
pub struct FailureRule {
    pub category: ErrorCategory,
    /// Every inner set must match; a set matches when any of its terms occurs.
    pub all_of: &'static [&'static [&'static str]],
}

impl FailureRule {
    fn matches(&self, lowered: &str) -> bool {
        self.all_of
            .iter()
            .all(|any_of| any_of.iter().any(|term| lowered.contains(term)))
    }
}

const fn rule(category: ErrorCategory, all_of: &'static [&'static [&'static str]]) -> FailureRule {
    FailureRule { category, all_of }
}

pub const RULES: &[FailureRule] = &[
    rule(
        ErrorCategory::InstagramAuthError,
        &[&["instagram sent an empty media response"]],
    ),
    rule(
        ErrorCategory::InstagramExtractionError,
        &[&["instagram"], &["unable to extract data"]],
    ),
    rule(
        ErrorCategory::FacebookParseError,
        &[&["facebook"], &["cannot parse data"]],
    ),
    rule(
        ErrorCategory::FacebookFormatError,
        &[&["facebook"], &["no video formats found"]],
    ),
    rule(
        ErrorCategory::FacebookUrlError,
        &[&["unsupported url"], &["facebook"]],
    ),
    rule(
        ErrorCategory::TiktokBlocked,
        &[&["tiktok"], &["ip address is blocked"]],
    ),
    rule(
        ErrorCategory::YoutubeUnavailable,
        &[&["youtube"], &["video unavailable"]],
    ),
    rule(
        ErrorCategory::YoutubeAgeVerification,
        &[&["youtube"], &["sign in", "confirm your age"]],
    ),
    rule(
        ErrorCategory::YoutubeMembersOnly,
        &[&["youtube"], &["members-only"]],
    ),
    rule(ErrorCategory::YoutubePremiere, &[&["youtube"], &["premiere"]]),
    rule(
        ErrorCategory::YoutubeClientError,
        &[&["youtube"], &["player_client"]],
    ),
    rule(
        ErrorCategory::MissingDependency,
        &[&[
            "secretstorage not available",
            "ffmpeg not found",
            "ffprobe not found",
            "yt-dlp executable not found",
        ]],
    ),
    rule(ErrorCategory::PrivateVideo, &[&["private", "unavailable"]]),
    rule(ErrorCategory::GeoRestricted, &[&["geo", "region", "country"]]),
    rule(
        ErrorCategory::AgeRestricted,
        &[&["age-restricted", "age restricted", "age limit", "age gate", "restricted"]],
    ),
    rule(ErrorCategory::Copyright, &[&["copyright", "dmca"]]),
    rule(ErrorCategory::FormatError, &[&["format", "no video"]]),
    rule(
        ErrorCategory::NetworkError,
        &[&["network", "timeout", "timed out", "connection"]],
    ),
    rule(ErrorCategory::VideoNotFound, &[&["not found", "404"]]),
    rule(ErrorCategory::LiveStream, &[&["live", "stream"]]),
    rule(ErrorCategory::AuthRequired, &[&["login", "authentication"]]),
];

/// Classify a raw failure message. Unmatched messages map to `GENERAL_ERROR`.
pub fn classify_failure(raw: &str) -> FailureReport {
    let lowered = raw.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(ErrorCategory::GeneralError)
        .into()
}
