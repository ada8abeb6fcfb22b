//! Filesystem access to the downloads directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::job::Artifact;

/// Extensions written alongside media that never count as the artifact.
const SIDECAR_EXTENSIONS: &[&str] = &["jpg", "jpeg", "webp", "png", "part", "ytdl", "json", "tmp"];

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A file found in the downloads directory.
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// The downloads directory.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// File-name prefix shared by everything one attempt writes.
    pub fn prefix(job_id: Uuid, at: DateTime<Utc>) -> String {
        format!("{}_{}_", job_id, at.format(TIMESTAMP_FORMAT))
    }

    /// Engine output template for files written under `prefix`.
    pub fn output_template(&self, prefix: &str) -> String {
        self.root
            .join(format!("{prefix}%(title)s.%(ext)s"))
            .to_string_lossy()
            .into_owned()
    }

    /// Find the media file written under `prefix`.
    ///
    /// Thumbnails and partial downloads are skipped. A file with
    /// `preferred_ext` wins; otherwise the largest match is chosen.
    pub async fn locate(
        &self,
        prefix: &str,
        preferred_ext: Option<&str>,
    ) -> Result<Option<Artifact>, AppError> {
        let mut matches: Vec<ArtifactEntry> = self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.file_name.starts_with(prefix) && !is_sidecar(&e.path))
            .collect();
        if matches.is_empty() {
            return Ok(None);
        }
        let file_count = matches.len();

        matches.sort_by(|a, b| {
            let pa = has_extension(&a.path, preferred_ext);
            let pb = has_extension(&b.path, preferred_ext);
            pb.cmp(&pa)
                .then(b.size_bytes.cmp(&a.size_bytes))
                .then(a.file_name.cmp(&b.file_name))
        });
        let chosen = matches.swap_remove(0);

        Ok(Some(Artifact {
            file_name: chosen.file_name,
            path: chosen.path,
            size_bytes: chosen.size_bytes,
            file_count,
        }))
    }

    /// Regular files directly inside the directory. A missing directory is empty.
    pub async fn entries(&self) -> Result<Vec<ArtifactEntry>, AppError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            entries.push(ArtifactEntry {
                path: entry.path(),
                file_name: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    pub async fn exists(&self, artifact: &Artifact) -> bool {
        tokio::fs::try_exists(&artifact.path).await.unwrap_or(false)
    }

    pub async fn open(&self, artifact: &Artifact) -> Result<tokio::fs::File, AppError> {
        Ok(tokio::fs::File::open(&artifact.path).await?)
    }

    /// Delete a file. Already-missing files count as removed.
    pub async fn remove(&self, path: &Path) -> Result<(), AppError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every file written under `prefix`, sidecars included.
    pub async fn remove_prefixed(&self, prefix: &str) -> Result<usize, AppError> {
        let mut removed = 0;
        for entry in self.entries().await? {
            if entry.file_name.starts_with(prefix) {
                self.remove(&entry.path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Job id encoded at the start of an artifact file name.
pub fn job_id_from_file_name(file_name: &str) -> Option<Uuid> {
    let (head, _) = file_name.split_once('_')?;
    Uuid::parse_str(head).ok()
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn is_sidecar(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SIDECAR_EXTENSIONS.contains(&ext.as_str()))
}

fn has_extension(path: &Path, wanted: Option<&str>) -> bool {
    match (extension(path), wanted) {
        (Some(ext), Some(wanted)) => ext.eq_ignore_ascii_case(wanted),
        _ => false,
    }
}
