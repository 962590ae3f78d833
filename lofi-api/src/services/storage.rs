//! Object storage collaborator
//!
//! Durable home for downloaded audio. The trait keeps the reconciler
//! testable without network access; production uses S3.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Longest sanitized title fragment embedded in an object key
const MAX_TITLE_FRAGMENT: usize = 100;

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    Upload(String),
}

/// Seam between the reconciler and durable object storage
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, tagged with `content_type`
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str)
        -> Result<(), StorageError>;

    /// Durable public URL for an uploaded key
    fn public_url(&self, key: &str) -> String;
}

/// S3-backed object storage
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, region: String) -> Self {
        Self {
            client,
            bucket,
            region,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        info!("Uploaded object: s3://{}/{}", self.bucket, key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

/// Build a collision-resistant object key for an audio asset:
/// random UUID prefix plus the sanitized title, with an mp3 extension.
pub fn object_key(title: &str) -> String {
    format!("{}_{}.mp3", Uuid::new_v4(), sanitize_filename(title))
}

/// Reduce a display title to a safe key fragment: ASCII alphanumerics,
/// `-`, `_` and `.` pass through, whitespace becomes `_`, everything else
/// is dropped. Empty results fall back to "untitled".
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
            out.push(c);
        } else if c.is_whitespace() {
            out.push('_');
        }
    }
    out.truncate(MAX_TITLE_FRAGMENT);
    if out.is_empty() {
        out.push_str("untitled");
    }
    out
}
