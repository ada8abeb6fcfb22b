//! Provider-scoped cookie files in Netscape format.

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::provider::Provider;

/// Field count of a full Netscape cookie line.
const NETSCAPE_FIELDS: usize = 7;
/// Fewest tab-separated fields accepted as a cookie line.
const MIN_FIELDS: usize = 3;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Providers a credential can be installed for.
pub const CREDENTIAL_PROVIDERS: [Provider; 6] = [
    Provider::Youtube,
    Provider::Instagram,
    Provider::Tiktok,
    Provider::Twitter,
    Provider::Facebook,
    Provider::Vimeo,
];

/// Check that `content` looks like a Netscape cookie file.
///
/// Blank lines and `#` comments are skipped. At least one remaining line must
/// carry [`MIN_FIELDS`] or more tab-separated fields.
pub fn validate_credential(content: &[u8]) -> Result<(), AppError> {
    let text = std::str::from_utf8(content)
        .map_err(|_| AppError::InvalidCredential("file is not valid UTF-8".into()))?;

    if text.trim().is_empty() {
        return Err(AppError::InvalidCredential("file is empty".into()));
    }

    let mut full = 0usize;
    let mut minimal = 0usize;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => rest,
            None if line.trim().is_empty() || line.starts_with('#') => continue,
            None => line,
        };
        let fields = line.split('\t').count();
        if fields >= NETSCAPE_FIELDS {
            full += 1;
        } else if fields >= MIN_FIELDS {
            minimal += 1;
        }
    }

    if full + minimal == 0 {
        return Err(AppError::InvalidCredential(
            "no cookie lines found (expected tab-separated Netscape format)".into(),
        ));
    }
    tracing::debug!(full, minimal, "Credential file validated");
    Ok(())
}

/// Candidate file names for a provider, in lookup order.
pub fn candidates(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Youtube => &["youtube.com_cookies.txt", "youtube_cookies.txt"],
        Provider::Instagram => &["instagram.com_cookies.txt", "instagram_cookies.txt"],
        Provider::Tiktok => &["tiktok.com_cookies.txt", "tiktok_cookies.txt"],
        Provider::Twitter => &[
            "twitter.com_cookies.txt",
            "x.com_cookies.txt",
            "twitter_cookies.txt",
        ],
        Provider::Facebook => &["facebook.com_cookies.txt", "facebook_cookies.txt"],
        Provider::Vimeo => &["vimeo.com_cookies.txt", "vimeo_cookies.txt"],
        Provider::Dailymotion | Provider::Twitch | Provider::Unknown => &[],
    }
}

/// Finds, validates and installs provider credential files in one directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First candidate file for `provider` that exists and validates.
    pub async fn resolve(&self, provider: Provider) -> Option<PathBuf> {
        for name in candidates(provider) {
            let path = self.dir.join(name);
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            match validate_credential(&bytes) {
                Ok(()) => return Some(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring credential file");
                }
            }
        }
        None
    }

    /// Validate and store `content` as the credential for `provider`.
    ///
    /// The file is written to a temporary name and renamed into place, so a
    /// concurrent `resolve` never sees a partial file.
    pub async fn install(&self, provider: Provider, content: &[u8]) -> Result<PathBuf, AppError> {
        if !CREDENTIAL_PROVIDERS.contains(&provider) {
            return Err(AppError::UnsupportedProvider(provider.to_string()));
        }
        validate_credential(content)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let dest = self.dir.join(format!("{}.com_cookies.txt", provider.as_str()));
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", provider.as_str(), uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, content).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::info!(%provider, path = %dest.display(), bytes = content.len(), "Credential installed");
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_LINE: &str =
        ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tSID\tabc123\n";

    #[test]
    fn test_comment_only_file_rejected() {
        let content = b"# Netscape HTTP Cookie File\n# nothing here\n\n";
        let err = validate_credential(content).unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential(_)));
    }

    #[test]
    fn test_single_full_line_accepted() {
        assert!(validate_credential(FULL_LINE.as_bytes()).is_ok());
    }

    #[test]
    fn test_minimal_line_accepted() {
        assert!(validate_credential(b"example.com\tSID\tabc").is_ok());
    }

    #[test]
    fn test_http_only_lines_are_cookies() {
        let content = "#HttpOnly_.instagram.com\tTRUE\t/\tTRUE\t0\tsessionid\txyz\n";
        assert!(validate_credential(content.as_bytes()).is_ok());
    }

    #[test]
    fn test_empty_and_garbage_rejected() {
        assert!(validate_credential(b"").is_err());
        assert!(validate_credential(b"   \n\n").is_err());
        assert!(validate_credential(b"just some words on a line").is_err());
        assert!(validate_credential(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_crlf_lines() {
        let content = FULL_LINE.replace('\n', "\r\n");
        assert!(validate_credential(content.as_bytes()).is_ok());
    }

    #[test]
    fn test_candidates() {
        assert_eq!(candidates(Provider::Twitter).len(), 3);
        assert_eq!(candidates(Provider::Youtube)[0], "youtube.com_cookies.txt");
        assert!(candidates(Provider::Unknown).is_empty());
    }

    #[tokio::test]
    async fn test_install_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(store.resolve(Provider::Youtube).await.is_none());

        let path = store
            .install(Provider::Youtube, FULL_LINE.as_bytes())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("youtube.com_cookies.txt"));
        assert_eq!(store.resolve(Provider::Youtube).await, Some(path));

        // No temp files are left behind.
        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        assert!(entries.all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".tmp")));
    }

    #[tokio::test]
    async fn test_install_rejects_invalid_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        let err = store
            .install(Provider::Youtube, b"# only a comment\n")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential(_)));
        assert!(!dir.path().join("youtube.com_cookies.txt").exists());

        let err = store
            .install(Provider::Twitch, FULL_LINE.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedProvider(_)));
    }

    #[tokio::test]
    async fn test_resolve_skips_invalid_candidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("twitter.com_cookies.txt"), "# empty\n").unwrap();
        std::fs::write(dir.path().join("x.com_cookies.txt"), FULL_LINE).unwrap();

        let store = CredentialStore::new(dir.path());
        let resolved = store.resolve(Provider::Twitter).await.unwrap();
        assert!(resolved.ends_with("x.com_cookies.txt"));
    }
}
