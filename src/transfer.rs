//! Moving media between the requester and the local work directory.

use crate::error::AppError;
use crate::queue::OwnerId;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use uuid::Uuid;

const CHUNK_SIZE: usize = 256 * 1024;

/// Invoked with `(bytes_transferred, total_bytes)`
pub type TransferProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Description attached to a delivered file
#[derive(Debug, Clone, Serialize)]
pub struct UploadMetadata {
    pub owner: OwnerId,
    pub caption: String,
    pub duration_secs: f64,
}

/// Confirmation of a finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub location: PathBuf,
    pub bytes: u64,
}

#[async_trait]
pub trait MediaTransferService: Send + Sync {
    /// Fetch `source` into local storage and return the local path
    async fn download(
        &self,
        source: &str,
        progress: TransferProgress<'_>,
    ) -> Result<PathBuf, AppError>;

    /// Deliver a local file to the requester
    async fn upload(
        &self,
        local: &Path,
        metadata: &UploadMetadata,
        progress: TransferProgress<'_>,
    ) -> Result<UploadReceipt, AppError>;
}

/// Transfers between local directories
#[derive(Debug, Clone)]
pub struct LocalFileTransfer {
    work_dir: PathBuf,
    upload_dir: PathBuf,
}

impl LocalFileTransfer {
    pub fn new(work_dir: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            upload_dir: upload_dir.into(),
        }
    }
}

#[async_trait]
impl MediaTransferService for LocalFileTransfer {
    async fn download(
        &self,
        source: &str,
        progress: TransferProgress<'_>,
    ) -> Result<PathBuf, AppError> {
        let source = Path::new(source);
        let name = source
            .file_name()
            .ok_or_else(|| AppError::Transfer(format!("Not a file: {}", source.display())))?
            .to_string_lossy();
        let unique = Uuid::new_v4().simple().to_string();
        let dest = self.work_dir.join(format!("{}_{}", &unique[..8], name));

        tokio::fs::create_dir_all(&self.work_dir).await?;
        copy_with_progress(source, &dest, progress).await?;
        debug!("Downloaded {} -> {}", source.display(), dest.display());
        Ok(dest)
    }

    async fn upload(
        &self,
        local: &Path,
        metadata: &UploadMetadata,
        progress: TransferProgress<'_>,
    ) -> Result<UploadReceipt, AppError> {
        let name = local
            .file_name()
            .ok_or_else(|| AppError::Transfer(format!("Not a file: {}", local.display())))?;
        let dest = self.upload_dir.join(name);

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let bytes = copy_with_progress(local, &dest, progress).await?;

        let mut sidecar = dest.clone().into_os_string();
        sidecar.push(".json");
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| AppError::Transfer(format!("Failed to encode metadata: {}", e)))?;
        tokio::fs::write(&sidecar, json).await?;

        info!("Uploaded {} ({} bytes)", dest.display(), bytes);
        Ok(UploadReceipt {
            location: dest,
            bytes,
        })
    }
}

/// Copy `from` to `to` in chunks, reporting progress after each one
async fn copy_with_progress(
    from: &Path,
    to: &Path,
    progress: TransferProgress<'_>,
) -> Result<u64, AppError> {
    let mut reader = File::open(from)
        .await
        .map_err(|e| AppError::Transfer(format!("Cannot open {}: {}", from.display(), e)))?;
    let total = reader.metadata().await?.len();
    let mut writer = File::create(to)
        .await
        .map_err(|e| AppError::Transfer(format!("Cannot create {}: {}", to.display(), e)))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        copied += n as u64;
        progress(copied, total);
    }
    writer.flush().await?;

    if copied == 0 {
        progress(0, total);
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_download_and_upload() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, vec![7u8; CHUNK_SIZE + 100]).unwrap();

        let transfer = LocalFileTransfer::new(dir.path().join("work"), dir.path().join("sent"));
        let calls: Mutex<Vec<(u64, u64)>> = Mutex::new(Vec::new());
        let report = |done: u64, total: u64| calls.lock().unwrap().push((done, total));

        let local = transfer
            .download(source.to_str().unwrap(), &report)
            .await
            .unwrap();
        assert!(local.starts_with(dir.path().join("work")));
        assert!(local.file_name().unwrap().to_string_lossy().ends_with("_clip.mp4"));
        assert_eq!(std::fs::read(&local).unwrap().len(), CHUNK_SIZE + 100);

        let total = (CHUNK_SIZE + 100) as u64;
        let seen = calls.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&(total, total)));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));

        let metadata = UploadMetadata {
            owner: 5,
            caption: "75.0% smaller".to_string(),
            duration_secs: 12.5,
        };
        let receipt = transfer.upload(&local, &metadata, &report).await.unwrap();
        assert_eq!(receipt.bytes, total);
        assert!(receipt.location.starts_with(dir.path().join("sent")));

        let mut sidecar = receipt.location.clone().into_os_string();
        sidecar.push(".json");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
        assert_eq!(json["owner"], 5);
        assert_eq!(json["caption"], "75.0% smaller");
    }

    #[tokio::test]
    async fn test_download_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = LocalFileTransfer::new(dir.path(), dir.path());
        let missing = dir.path().join("missing.mp4");
        let result = transfer
            .download(missing.to_str().unwrap(), &|_, _| {})
            .await;
        assert!(matches!(result, Err(AppError::Transfer(_))));
    }
}
