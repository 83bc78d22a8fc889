use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// URL prefix under which the static-file layer serves the upload directory.
pub const PUBLIC_PREFIX: &str = "uploads";

const MAX_EXTENSION_LEN: usize = 16;

/// Stores post cover images on disk.
///
/// Each upload becomes `{upload_dir}/{unix_millis}-{random}{.ext}`; the
/// returned reference is `uploads/{name}`, resolvable through the static
/// route.
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh name and return its reference path.
    ///
    /// The file is opened with create-new, so an (improbable) name collision
    /// fails instead of overwriting someone else's upload. A partial file is
    /// removed if the write fails.
    pub async fn store(&self, bytes: &[u8], original_name: Option<&str>) -> Result<String> {
        let name = unique_name(original_name);
        let path = self.dir.join(&name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(e).with_context(|| format!("Failed to write {}", path.display()));
        }

        info!("Stored attachment {} ({} bytes)", name, bytes.len());
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }

    /// Best-effort removal of a stored attachment, by reference path.
    pub async fn remove(&self, reference: &str) {
        let Some(name) = file_name_of(reference) else {
            warn!("Refusing to remove attachment with unexpected reference {:?}", reference);
            return;
        };

        match fs::remove_file(self.dir.join(name)).await {
            Ok(()) => info!("Removed attachment {}", name),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Attachment {} already gone", name);
            }
            Err(e) => warn!("Failed to remove attachment {}: {}", name, e),
        }
    }
}

fn unique_name(original_name: Option<&str>) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);

    match original_name.and_then(extension_of) {
        Some(ext) => format!("{millis}-{suffix}.{ext}"),
        None => format!("{millis}-{suffix}"),
    }
}

/// Original extension, kept only if it is short and plain alphanumeric.
fn extension_of(original_name: &str) -> Option<&str> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    let plain = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plain.then_some(ext)
}

/// `uploads/{name}` -> `{name}`, rejecting anything that could leave the directory.
fn file_name_of(reference: &str) -> Option<&str> {
    let name = reference.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    let safe = !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != "..";
    safe.then_some(name)
}
