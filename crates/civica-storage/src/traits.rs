//! Object storage abstraction trait
//!
//! This module defines the ObjectStorage trait that all storage backends must implement.

use crate::{Bucket, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use civica_core::models::ObjectMetadata;
use civica_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Copy failed: {0}")]
    CopyFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(key) => {
                AppError::Conflict(format!("An object is already stored at {}", key))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// What `get_metadata` reports about a stored object.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub content_type: Option<String>,
    pub size: u64,
    pub metadata: ObjectMetadata,
}

/// Object storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait. Every
/// operation names the logical bucket it targets; backends map `Bucket` to
/// their configured bucket names.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create an object with its content type and user metadata tags.
    ///
    /// Never overwrites: an existing key fails with
    /// [`StorageError::AlreadyExists`].
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()>;

    /// Copy an object between buckets under the same key, preserving its
    /// content type and metadata. Repeating a completed copy overwrites the
    /// target with identical content.
    async fn copy_to(&self, from: Bucket, to: Bucket, key: &str) -> StorageResult<()>;

    /// Read content type, size and metadata tags of an object.
    async fn get_metadata(&self, bucket: Bucket, key: &str) -> StorageResult<ObjectInfo>;

    /// Check if an object exists
    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool>;

    /// Public URL of an object in the given bucket.
    fn public_url(&self, bucket: Bucket, key: &str) -> String;

    /// Configured name of a logical bucket.
    fn bucket_name(&self, bucket: Bucket) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
