use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    types::ServerSideEncryption,
    Client,
};
use chrono::Utc;
use shared_types::{AppError, EvidenceRef};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::env_or;

use super::{
    is_valid_blob_id, new_blob_id, normalize_content_type, sanitize_filename, spool,
    storage_error, BlobMeta, BlobStream, EvidenceStore, StoredBlob, DEFAULT_IO_TIMEOUT,
};

/// Connection settings for an S3-compatible endpoint. Each value accepts the
/// AWS variable name or the shorter MinIO-style one.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl S3Settings {
    pub fn from_env() -> Result<Self, String> {
        let required = |primary: &str, fallback: &str| {
            env_or(primary, fallback).ok_or_else(|| format!("{primary} or {fallback} must be set"))
        };
        Ok(Self {
            endpoint: required("AWS_ENDPOINT_URL_S3", "S3_ENDPOINT")?,
            access_key: required("AWS_ACCESS_KEY_ID", "S3_ACCESS_KEY")?,
            secret_key: required("AWS_SECRET_ACCESS_KEY", "S3_SECRET_KEY")?,
            region: env_or("AWS_REGION", "S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        })
    }

    pub fn client(&self) -> Client {
        let creds = Credentials::new(&self.access_key, &self.secret_key, None, None, "env");
        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&self.endpoint)
            .region(Region::new(self.region.clone()))
            .credentials_provider(creds)
            .force_path_style(true)
            .behavior_version_latest()
            .build();
        Client::from_conf(config)
    }
}

/// Evidence store backed by an S3-compatible bucket.
///
/// Each blob is two objects: `<id>` with the bytes (SSE-S3 encrypted) and
/// `<id>.json` with the metadata. Uploads are spooled to a temporary file so
/// the request body is never held in memory.
pub struct S3EvidenceStore {
    client: Client,
    bucket: String,
    io_timeout: Duration,
}

fn meta_key(id: &str) -> String {
    format!("{id}.json")
}

fn spool_path(id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("crimeportal-{id}.upload"))
}

/// Await one S3 call, turning a missed deadline into `StorageError`.
async fn bounded<T, F>(limit: Duration, what: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| storage_error(&format!("{what} timed out"), format!("{limit:?}")))
}

impl S3EvidenceStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Deadline for each S3 call and each streamed chunk.
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Build from environment and make sure the bucket exists.
    pub async fn from_env(bucket: &str, io_timeout: Duration) -> Result<Self, String> {
        let store = Self::new(S3Settings::from_env()?.client(), bucket).with_io_timeout(io_timeout);
        store.ensure_bucket().await?;
        Ok(store)
    }

    /// Create the bucket on first start. It is never made public.
    async fn ensure_bucket(&self) -> Result<(), String> {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| format!("Failed to create evidence bucket '{}': {e}", self.bucket))?;
        tracing::info!(bucket = %self.bucket, "Created evidence bucket");
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<bool, AppError> {
        let head = self.client.head_object().bucket(&self.bucket).key(key).send();
        match bounded(self.io_timeout, "S3 HEAD", head).await? {
            Ok(_) => Ok(true),
            Err(e) => {
                let svc_err = e.into_service_error();
                if svc_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_error("S3 HEAD failed", svc_err))
                }
            }
        }
    }

    async fn upload(
        &self,
        id: &str,
        body: BlobStream<'_>,
        filename: &str,
        content_type: &str,
    ) -> Result<BlobMeta, AppError> {
        let path = spool_path(id);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| storage_error("Failed to spool evidence upload", e))?;
        let (size, sha256) = spool(body, &mut file, self.io_timeout)
            .await
            .map_err(|e| storage_error("Failed to receive evidence upload", e))?;
        drop(file);

        let mimetype = normalize_content_type(content_type);
        let data = ByteStream::from_path(&path)
            .await
            .map_err(|e| storage_error("Failed to read spooled upload", e))?;
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(id)
            .content_type(&mimetype)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .body(data)
            .send();
        bounded(self.io_timeout, "S3 upload", put)
            .await?
            .map_err(|e| storage_error("S3 upload failed", e.into_service_error()))?;

        let meta = BlobMeta {
            evidence: EvidenceRef {
                id: id.to_string(),
                filename: sanitize_filename(filename),
                size,
                mimetype,
            },
            sha256,
            stored_at: Utc::now(),
        };
        let json = serde_json::to_vec(&meta)
            .map_err(|e| storage_error("Failed to encode evidence metadata", e))?;
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(meta_key(id))
            .content_type("application/json")
            .server_side_encryption(ServerSideEncryption::Aes256)
            .body(ByteStream::from(json))
            .send();
        bounded(self.io_timeout, "S3 metadata upload", put)
            .await?
            .map_err(|e| storage_error("S3 metadata upload failed", e.into_service_error()))?;

        Ok(meta)
    }

    async fn load_meta(&self, id: &str) -> Result<Option<BlobMeta>, AppError> {
        let get = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(meta_key(id))
            .send();
        let resp = match bounded(self.io_timeout, "S3 metadata download", get).await? {
            Ok(resp) => resp,
            Err(e) => {
                let svc = e.into_service_error();
                if svc.is_no_such_key() {
                    return Ok(None);
                }
                return Err(storage_error("S3 metadata download failed", svc));
            }
        };
        let bytes = bounded(self.io_timeout, "S3 metadata read", resp.body.collect())
            .await?
            .map_err(|e| storage_error("Failed to read S3 metadata body", e))?
            .into_bytes();
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| storage_error("Failed to parse evidence metadata", e))
    }
}

#[async_trait]
impl EvidenceStore for S3EvidenceStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn store(
        &self,
        body: BlobStream<'_>,
        filename: &str,
        content_type: &str,
    ) -> Result<EvidenceRef, AppError> {
        let id = new_blob_id();
        let result = self.upload(&id, body, filename, content_type).await;
        let _ = tokio::fs::remove_file(spool_path(&id)).await;
        let meta = result?;
        tracing::debug!(id, size = meta.evidence.size, bucket = %self.bucket, "Stored evidence blob");
        Ok(meta.evidence)
    }

    async fn retrieve(&self, id: &str) -> Result<Option<StoredBlob>, AppError> {
        if !is_valid_blob_id(id) {
            return Ok(None);
        }
        let Some(meta) = self.load_meta(id).await? else {
            return Ok(None);
        };
        let get = self.client.get_object().bucket(&self.bucket).key(id).send();
        let resp = match bounded(self.io_timeout, "S3 download", get).await? {
            Ok(resp) => resp,
            Err(e) => {
                let svc = e.into_service_error();
                if svc.is_no_such_key() {
                    return Ok(None);
                }
                return Err(storage_error("S3 download failed", svc));
            }
        };

        let idle = self.io_timeout;
        let body = futures::stream::unfold(Some(resp.body), move |body| async move {
            let mut body = body?;
            match tokio::time::timeout(idle, body.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                Ok(Some(Err(e))) => Some((Err(io::Error::other(e)), None)),
                Ok(None) => None,
                Err(_) => Some((
                    Err(io::Error::new(io::ErrorKind::TimedOut, "S3 download stalled")),
                    None,
                )),
            }
        });
        Ok(Some(StoredBlob {
            meta,
            body: Box::pin(body),
        }))
    }

    async fn exists(&self, id: &str) -> Result<bool, AppError> {
        if !is_valid_blob_id(id) {
            return Ok(false);
        }
        self.head(id).await
    }
}
