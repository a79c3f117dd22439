use crate::traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use crate::{Bucket, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use civica_core::models::ObjectMetadata;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Content type and tags stored next to each object.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sidecar {
    content_type: Option<String>,
    metadata: ObjectMetadata,
}

/// Local filesystem storage implementation
///
/// Mirrors the two-bucket layout under `base_path/{bucket}/{key}`. Object
/// metadata is kept in a `{key}.meta.json` sidecar file.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    staging_bucket: String,
    verified_bucket: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/civica/pictures")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/pictures")
    /// * `staging_bucket` / `verified_bucket` - Directory names of the two tiers
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        staging_bucket: String,
        verified_bucket: String,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        for bucket in [&staging_bucket, &verified_bucket] {
            let dir = base_path.join(bucket);
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            base_path,
            base_url,
            staging_bucket,
            verified_bucket,
        })
    }

    /// Convert a bucket and key to a filesystem path with security validation
    ///
    /// Rejects keys with path components that could escape the bucket
    /// directory. Dots inside a file name are allowed.
    fn key_to_path(&self, bucket: Bucket, key: &str) -> StorageResult<PathBuf> {
        let escapes = Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        if key.ends_with(SIDECAR_SUFFIX) {
            return Err(StorageError::InvalidKey(format!(
                "Storage key must not end with {}",
                SIDECAR_SUFFIX
            )));
        }

        let bucket_root = self.base_path.join(self.bucket_name(bucket));
        let path = bucket_root.join(key);

        if let (Ok(canonical), Ok(root)) = (path.canonicalize(), bucket_root.canonicalize()) {
            if canonical.strip_prefix(&root).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// With `create_new`, an existing file fails with `AlreadyExists`.
    async fn write_file(path: &Path, data: &[u8], create_new: bool) -> StorageResult<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true);
        if create_new {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        let mut file = options.open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                return StorageError::AlreadyExists(path.display().to_string());
            }
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })
    }

    async fn read_sidecar(path: &Path) -> StorageResult<Sidecar> {
        match fs::read(Self::sidecar_path(path)).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| StorageError::BackendError(format!("Corrupt metadata file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Sidecar::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_if_exists(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let path = self.key_to_path(bucket, key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let sidecar = Sidecar {
            content_type: Some(content_type.to_string()),
            metadata: metadata.clone(),
        };
        let sidecar = serde_json::to_vec(&sidecar)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;

        Self::write_file(&path, &data, true).await.map_err(|e| match e {
            StorageError::AlreadyExists(_) => StorageError::AlreadyExists(key.to_string()),
            other => other,
        })?;
        Self::write_file(&Self::sidecar_path(&path), &sidecar, false).await?;

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(bucket, key)?;

        Self::remove_if_exists(&path).await?;
        Self::remove_if_exists(&Self::sidecar_path(&path)).await?;

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn copy_to(&self, from: Bucket, to: Bucket, key: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from, key)?;
        let to_path = self.key_to_path(to, key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::CopyFailed(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        let from_sidecar = Self::sidecar_path(&from_path);
        if fs::try_exists(&from_sidecar).await.unwrap_or(false) {
            fs::copy(&from_sidecar, Self::sidecar_path(&to_path))
                .await
                .map_err(|e| StorageError::CopyFailed(format!("Failed to copy metadata: {}", e)))?;
        }

        tracing::info!(
            from_bucket = %from,
            to_bucket = %to,
            key = %key,
            "Local storage copy successful"
        );

        Ok(())
    }

    async fn get_metadata(&self, bucket: Bucket, key: &str) -> StorageResult<ObjectInfo> {
        let path = self.key_to_path(bucket, key)?;

        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let sidecar = Self::read_sidecar(&path).await?;

        Ok(ObjectInfo {
            content_type: sidecar.content_type,
            size: meta.len(),
            metadata: sidecar.metadata,
        })
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(bucket, key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket_name(bucket),
            key
        )
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Staging => &self.staging_bucket,
            Bucket::Verified => &self.verified_bucket,
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
