// Artifact Store
// Destination for published archives, with retention metadata

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Upload seam for finished archives. Publication is best-effort: callers
/// record failures and keep going.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(
        &self,
        name: &str,
        archive: &Path,
        retention_days: u32,
    ) -> std::io::Result<()>;
}

/// Store that mirrors archives into a local directory.
///
/// Retention is recorded in a manifest alongside the archives; an external
/// sweeper applies it.
pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.txt")
    }
}

#[async_trait]
impl ArtifactStore for MirrorStore {
    async fn upload(
        &self,
        name: &str,
        archive: &Path,
        retention_days: u32,
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::copy(archive, self.root.join(name)).await?;

        // Cells publish concurrently against one store, so the manifest must
        // grow by atomic appends; a read-modify-write here loses records
        let mut manifest = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.manifest_path())
            .await?;
        manifest
            .write_all(format!("{} retention-days={}\n", name, retention_days).as_bytes())
            .await
    }
}
