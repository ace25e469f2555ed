//! Evidence blob storage.
//!
//! Blobs are written once and never deleted. Each blob carries a JSON
//! metadata record (original filename, size, media type, sha256) next to the
//! bytes. Ids are generated here and are opaque to every caller.

pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{AppError, EvidenceRef};
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use uuid::Uuid;

pub use local::LocalEvidenceStore;
pub use s3::S3EvidenceStore;

/// Chunked byte stream flowing into or out of the store.
pub type BlobStream<'a> = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + 'a>>;

const READ_CHUNK: usize = 64 * 1024;

/// Longest wait for any single chunk read or write, or backend call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata persisted alongside every blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMeta {
    #[serde(flatten)]
    pub evidence: EvidenceRef,
    pub sha256: String,
    pub stored_at: DateTime<Utc>,
}

/// A blob opened for reading.
pub struct StoredBlob {
    pub meta: BlobMeta,
    pub body: BlobStream<'static>,
}

/// Streaming, append-only blob storage for evidence files.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;

    /// Stream `body` into a new blob and return its reference.
    async fn store(
        &self,
        body: BlobStream<'_>,
        filename: &str,
        content_type: &str,
    ) -> Result<EvidenceRef, AppError>;

    /// Open a blob. `Ok(None)` when the id is unknown or malformed.
    async fn retrieve(&self, id: &str) -> Result<Option<StoredBlob>, AppError>;

    /// Whether a complete blob exists under `id`.
    async fn exists(&self, id: &str) -> Result<bool, AppError>;
}

/// Fresh opaque blob id.
pub fn new_blob_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Ids are always 32 lowercase hex digits; anything else is never looked up.
pub fn is_valid_blob_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Fallback for uploads that arrive without a media type.
pub fn normalize_content_type(content_type: &str) -> String {
    let trimmed = content_type.trim();
    if trimmed.is_empty() {
        "application/octet-stream".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Keep only the final path component of a client-supplied filename.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Log an I/O failure and turn it into the client-facing `StorageError`.
pub fn storage_error(context: &str, err: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %err, "{context}");
    AppError::storage(context.to_string())
}

fn stalled(idle: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("evidence stream idle for more than {}s", idle.as_secs_f32()),
    )
}

/// Await `fut`, failing with `TimedOut` after `idle`.
pub async fn within<T, F>(idle: Duration, fut: F) -> io::Result<T>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    timeout(idle, fut).await.map_err(|_| stalled(idle))?
}

/// Copy `body` into `sink`, returning the byte count and hex sha256.
/// Each chunk must arrive and be written within `idle`.
pub async fn spool<W>(
    mut body: BlobStream<'_>,
    sink: &mut W,
    idle: Duration,
) -> io::Result<(i64, String)>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut hasher = Sha256::new();
    let mut size: i64 = 0;
    loop {
        let next = timeout(idle, body.next()).await.map_err(|_| stalled(idle))?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        hasher.update(&chunk);
        size += chunk.len() as i64;
        within(idle, sink.write_all(&chunk)).await?;
    }
    within(idle, sink.flush()).await?;
    Ok((size, format!("{:x}", hasher.finalize())))
}

/// Turn any async reader into a [`BlobStream`] of fixed-size chunks. A read
/// that takes longer than `idle` ends the stream with `TimedOut`.
pub fn reader_stream<R>(reader: R, idle: Duration) -> BlobStream<'static>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::pin(futures::stream::unfold(
        (reader, false),
        move |(mut reader, done)| async move {
            if done {
                return None;
            }
            let mut buf = BytesMut::with_capacity(READ_CHUNK);
            match within(idle, reader.read_buf(&mut buf)).await {
                Ok(0) => None,
                Ok(_) => Some((Ok(buf.freeze()), (reader, false))),
                Err(e) => Some((Err(e), (reader, true))),
            }
        },
    ))
}

/// Wrap an in-memory buffer as a single-chunk stream.
pub fn bytes_stream(bytes: impl Into<Bytes>) -> BlobStream<'static> {
    let bytes = bytes.into();
    Box::pin(futures::stream::once(async move { Ok(bytes) }))
}

/// Drain a blob stream into memory.
pub async fn collect_stream(mut body: BlobStream<'_>) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}
