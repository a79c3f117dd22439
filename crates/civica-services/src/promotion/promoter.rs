//! Verification Promoter
//!
//! Moves an accepted picture from the staging bucket to the verified bucket:
//! copy (metadata preserved), then delete the staging copy. The two steps are
//! not atomic. Each is safe to repeat, so a failed promotion is retried by
//! calling [`VerificationPromoter::move_to_verified_bucket`] again.

use civica_core::AppError;
use civica_storage::{Bucket, ObjectStorage, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Public URLs of a promoted picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedUrls {
    pub url: String,
    pub preview_url: String,
}

#[derive(Clone)]
pub struct VerificationPromoter {
    storage: Arc<dyn ObjectStorage>,
}

impl VerificationPromoter {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn move_to_verified_bucket(&self, key: &str) -> Result<PromotedUrls, AppError> {
        let start = Instant::now();

        if let Err(e) = self
            .storage
            .copy_to(Bucket::Staging, Bucket::Verified, key)
            .await
        {
            // A previous attempt may have copied and deleted already.
            let already_promoted = matches!(e, StorageError::NotFound(_))
                && self.storage.exists(Bucket::Verified, key).await?;
            if !already_promoted {
                tracing::error!(error = %e, key = %key, "Failed to copy object to verified bucket");
                return Err(e.into());
            }
            tracing::info!(key = %key, "Object already in verified bucket, resuming promotion");
        }

        if let Err(e) = self.storage.delete(Bucket::Staging, key).await {
            tracing::error!(
                error = %e,
                key = %key,
                staging_bucket = %self.storage.bucket_name(Bucket::Staging),
                verified_bucket = %self.storage.bucket_name(Bucket::Verified),
                inconsistency = "duplicate_across_tiers",
                "Object copied to verified bucket but staging copy was not deleted"
            );
            return Err(e.into());
        }

        let url = self.storage.public_url(Bucket::Verified, key);

        tracing::info!(
            key = %key,
            url = %url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Picture promoted to verified bucket"
        );

        Ok(PromotedUrls {
            preview_url: url.clone(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use bytes::Bytes;
    use civica_core::models::ObjectMetadata;

    const KEY: &str = "potholes/9b2f/a.png";

    fn tags() -> ObjectMetadata {
        let mut tags = ObjectMetadata::new();
        tags.insert("severity".to_string(), "low".to_string());
        tags
    }

    async fn staged(storage: &MockObjectStorage) {
        storage
            .put(Bucket::Staging, KEY, Bytes::from_static(b"png"), "image/png", &tags())
            .await
            .unwrap();
        storage.clear_calls();
    }

    #[tokio::test]
    async fn promotion_copies_then_deletes_and_preserves_tags() {
        let storage = MockObjectStorage::new();
        staged(&storage).await;
        let promoter = VerificationPromoter::new(Arc::new(storage.clone()));

        let urls = promoter.move_to_verified_bucket(KEY).await.unwrap();

        assert_eq!(urls.url, storage.public_url(Bucket::Verified, KEY));
        assert_eq!(urls.preview_url, urls.url);
        assert!(!storage.contains(Bucket::Staging, KEY));
        let info = storage.get_metadata(Bucket::Verified, KEY).await.unwrap();
        assert_eq!(info.metadata, tags());
        assert_eq!(
            storage.calls()[..2],
            [
                StorageCall::Copy {
                    from: Bucket::Staging,
                    to: Bucket::Verified,
                    key: KEY.to_string()
                },
                StorageCall::Delete {
                    bucket: Bucket::Staging,
                    key: KEY.to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn delete_failure_propagates_after_copy() {
        let storage = MockObjectStorage::new();
        staged(&storage).await;
        storage.fail_delete_in(Bucket::Staging);
        let promoter = VerificationPromoter::new(Arc::new(storage.clone()));

        let err = promoter.move_to_verified_bucket(KEY).await.unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        let calls = storage.calls();
        let copy_at = calls
            .iter()
            .position(|c| matches!(c, StorageCall::Copy { .. }))
            .expect("copy issued");
        let delete_at = calls
            .iter()
            .position(|c| matches!(c, StorageCall::Delete { .. }))
            .expect("delete attempted");
        assert!(copy_at < delete_at);
        assert!(storage.contains(Bucket::Staging, KEY));
        assert!(storage.contains(Bucket::Verified, KEY));
    }

    #[tokio::test]
    async fn retry_after_completed_move_is_idempotent() {
        let storage = MockObjectStorage::new();
        staged(&storage).await;
        let promoter = VerificationPromoter::new(Arc::new(storage.clone()));

        let first = promoter.move_to_verified_bucket(KEY).await.unwrap();
        let second = promoter.move_to_verified_bucket(KEY).await.unwrap();

        assert_eq!(first, second);
        assert!(storage.contains(Bucket::Verified, KEY));
    }

    #[tokio::test]
    async fn missing_object_in_both_tiers_is_an_error() {
        let storage = MockObjectStorage::new();
        let promoter = VerificationPromoter::new(Arc::new(storage.clone()));

        let err = promoter.move_to_verified_bucket(KEY).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(!storage
            .calls()
            .iter()
            .any(|c| matches!(c, StorageCall::Delete { .. })));
    }
}
