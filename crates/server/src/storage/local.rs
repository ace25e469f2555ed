use async_trait::async_trait;
use chrono::Utc;
use shared_types::{AppError, EvidenceRef};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use super::{
    is_valid_blob_id, new_blob_id, normalize_content_type, reader_stream, sanitize_filename,
    spool, storage_error, BlobMeta, BlobStream, EvidenceStore, StoredBlob, DEFAULT_IO_TIMEOUT,
};

/// Evidence store on the local filesystem.
///
/// Layout: `<base>/<id>.bin` holds the bytes, `<base>/<id>.json` the
/// metadata. The data file is renamed into place last, so a visible
/// `.bin` is always complete.
pub struct LocalEvidenceStore {
    base_path: PathBuf,
    io_timeout: Duration,
}

impl LocalEvidenceStore {
    /// Create the base directory if needed. Fails fast when it cannot be used.
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| storage_error("Failed to create evidence directory", e))?;

        tracing::info!(path = ?base_path, "Initialized local evidence store");
        Ok(Self {
            base_path,
            io_timeout: DEFAULT_IO_TIMEOUT,
        })
    }

    /// Per-chunk deadline for uploads and downloads.
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.bin"))
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.json"))
    }

    fn partial_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!(".{id}.partial"))
    }

    async fn load_meta(&self, id: &str) -> Result<Option<BlobMeta>, AppError> {
        let json = match fs::read(self.meta_path(id)).await {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("Failed to read evidence metadata", e)),
        };
        serde_json::from_slice(&json)
            .map(Some)
            .map_err(|e| storage_error("Failed to parse evidence metadata", e))
    }

    async fn write_blob(
        &self,
        id: &str,
        body: BlobStream<'_>,
        filename: &str,
        content_type: &str,
    ) -> io::Result<BlobMeta> {
        let partial = self.partial_path(id);
        let mut file = fs::File::create(&partial).await?;
        let (size, sha256) = spool(body, &mut file, self.io_timeout).await?;
        file.sync_all().await?;
        drop(file);

        let meta = BlobMeta {
            evidence: EvidenceRef {
                id: id.to_string(),
                filename: sanitize_filename(filename),
                size,
                mimetype: normalize_content_type(content_type),
            },
            sha256,
            stored_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&meta).map_err(io::Error::other)?;
        fs::write(self.meta_path(id), json).await?;
        fs::rename(&partial, self.data_path(id)).await?;
        Ok(meta)
    }
}

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn store(
        &self,
        body: BlobStream<'_>,
        filename: &str,
        content_type: &str,
    ) -> Result<EvidenceRef, AppError> {
        let id = new_blob_id();
        match self.write_blob(&id, body, filename, content_type).await {
            Ok(meta) => {
                tracing::debug!(id, size = meta.evidence.size, "Stored evidence blob");
                Ok(meta.evidence)
            }
            Err(e) => {
                let _ = fs::remove_file(self.partial_path(&id)).await;
                let _ = fs::remove_file(self.meta_path(&id)).await;
                Err(storage_error("Failed to store evidence", e))
            }
        }
    }

    async fn retrieve(&self, id: &str) -> Result<Option<StoredBlob>, AppError> {
        if !is_valid_blob_id(id) {
            return Ok(None);
        }
        let file = match fs::File::open(self.data_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("Failed to open evidence", e)),
        };
        let Some(meta) = self.load_meta(id).await? else {
            return Ok(None);
        };
        Ok(Some(StoredBlob {
            meta,
            body: reader_stream(file, self.io_timeout),
        }))
    }

    async fn exists(&self, id: &str) -> Result<bool, AppError> {
        if !is_valid_blob_id(id) {
            return Ok(false);
        }
        fs::try_exists(self.data_path(id))
            .await
            .map_err(|e| storage_error("Failed to check evidence", e))
    }
}
