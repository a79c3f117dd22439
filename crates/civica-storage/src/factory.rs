#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{ObjectStorage, StorageBackend, StorageError, StorageResult};
use civica_core::Config;
use std::sync::Arc;

#[cfg(feature = "storage-local")]
const DEFAULT_LOCAL_STAGING: &str = "first-stage";
#[cfg(feature = "storage-local")]
const DEFAULT_LOCAL_VERIFIED: &str = "verified";

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn ObjectStorage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let staging = config.staging_bucket().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("FIRST_STAGE_BUCKET_NAME not configured".to_string())
            })?;
            let verified = config.verified_bucket().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("VERIFIED_IMAGES_BUCKET_NAME not configured".to_string())
            })?;
            let region = config.aws_region().to_string();
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = S3Storage::new(staging, verified, region, endpoint).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config
                .local_storage_path()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
                })?;
            let base_url = config
                .local_storage_base_url()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
                })?;
            let staging = config
                .staging_bucket()
                .unwrap_or(DEFAULT_LOCAL_STAGING)
                .to_string();
            let verified = config
                .verified_bucket()
                .unwrap_or(DEFAULT_LOCAL_VERIFIED)
                .to_string();

            let storage = LocalStorage::new(base_path, base_url, staging, verified).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
