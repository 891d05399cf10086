//! Hand-off of the finished document to a download-capable collaborator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const DATA_URL_PREFIX: &str = "data:text/markdown;base64,";

/// `{"action":"download","filename":...,"content":...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename = "download")]
pub struct SaveRequest {
    pub filename: String,
    pub content: String,
}

impl SaveRequest {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// The content as a self-contained base64 data URL.
    pub fn data_url(&self) -> String {
        format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(self.content.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn saved(download_id: u64) -> Self {
        Self {
            success: true,
            download_id: Some(download_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            download_id: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait(?Send)]
pub trait FileSaver {
    async fn save(&self, request: SaveRequest) -> SaveOutcome;
}

/// Writes downloads into a directory, renaming on conflict the way a
/// browser's "uniquify" action does.
#[derive(Debug)]
pub struct DiskSaver {
    dir: PathBuf,
    next_id: AtomicU64,
}

impl DiskSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn write(&self, request: &SaveRequest) -> anyhow::Result<PathBuf> {
        use anyhow::Context;

        let url = request.data_url();
        let payload = url
            .strip_prefix(DATA_URL_PREFIX)
            .context("not a markdown data URL")?;
        let bytes = STANDARD.decode(payload).context("invalid base64 payload")?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {:?}", self.dir))?;

        let name = plain_file_name(&request.filename)
            .with_context(|| format!("unusable filename {:?}", request.filename))?;
        let path = uniquify(&self.dir, &name).await;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {:?}", path))?;
        Ok(path)
    }
}

#[async_trait(?Send)]
impl FileSaver for DiskSaver {
    async fn save(&self, request: SaveRequest) -> SaveOutcome {
        debug!(
            filename = %request.filename,
            chars = request.content.chars().count(),
            "download requested"
        );
        match self.write(&request).await {
            Ok(path) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                info!(download_id = id, path = %path.display(), "download saved");
                SaveOutcome::saved(id)
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "download failed");
                SaveOutcome::failed(format!("{err:#}"))
            }
        }
    }
}

/// Last path component, so a request cannot escape the target directory.
fn plain_file_name(filename: &str) -> Option<String> {
    filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_owned)
}

/// `name.md`, then `name (1).md`, `name (2).md`, ... until one is free.
async fn uniquify(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !exists(&candidate).await {
        return candidate;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
