//! Upload Orchestrator
//!
//! Validates every file of a batch, resolves its staging key and writes the
//! accepted files to the staging bucket concurrently. The result is a
//! per-file [`BatchReport`]: one bad file never fails the batch.

use civica_core::models::{
    BatchReport, ObjectMetadata, UploadMetadata, UploadOutcome, UploadStatus, UploadedFile,
};
use civica_core::AppError;
use civica_processing::PictureValidator;
use civica_storage::{Bucket, KeyMap, ObjectStorage, StorageError};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

const UPLOAD_FAILED_REASON: &str = "Failed to upload file";
const KEY_TAKEN_REASON: &str = "A file is already stored under this name";

/// A file that passed validation, paired with its resolved key.
struct PlannedUpload<'a> {
    index: usize,
    file: &'a UploadedFile,
    key: &'a str,
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    storage: Arc<dyn ObjectStorage>,
    validator: PictureValidator,
}

impl UploadOrchestrator {
    pub fn new(storage: Arc<dyn ObjectStorage>, validator: PictureValidator) -> Self {
        Self { storage, validator }
    }

    /// Reject empty and oversized batches before any store is touched.
    pub fn check_batch_size(&self, count: usize) -> Result<(), AppError> {
        self.validator.validate_batch_size(count)?;
        Ok(())
    }

    /// Upload a batch to the staging bucket.
    ///
    /// Fails as a whole only when the batch size is out of bounds or a file
    /// that passed validation has no key in `keys`. Both are detected before
    /// the first upload starts.
    #[tracing::instrument(skip_all, fields(files = files.len(), issue_category = %metadata.issue_category))]
    pub async fn upload_batch(
        &self,
        files: &[UploadedFile],
        keys: &KeyMap,
        metadata: &UploadMetadata,
    ) -> Result<BatchReport, AppError> {
        self.check_batch_size(files.len())?;

        let mut outcomes: Vec<Option<UploadOutcome>> = vec![None; files.len()];
        let mut planned = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            if let Err(err) = self.validator.validate_file(file) {
                outcomes[index] = Some(UploadOutcome {
                    hash: file.hash.clone(),
                    file_name: file.file_name.clone(),
                    key: None,
                    status: UploadStatus::Rejected {
                        reason: err.to_string(),
                    },
                });
                continue;
            }

            let key = keys.resolve(&file.hash).ok_or_else(|| {
                tracing::error!(
                    hash = %file.hash,
                    file_name = %file.file_name,
                    "No staging key mapped for validated file"
                );
                AppError::Internal(format!("No storage key mapped for file {}", file.hash))
            })?;

            planned.push(PlannedUpload { index, file, key });
        }

        let tags = metadata.to_object_metadata();
        let uploads = planned
            .iter()
            .map(|upload| self.upload_one(upload, &tags));
        let results = join_all(uploads).await;

        for (upload, status) in planned.iter().zip(results) {
            outcomes[upload.index] = Some(UploadOutcome {
                hash: upload.file.hash.clone(),
                file_name: upload.file.file_name.clone(),
                key: Some(upload.key.to_string()),
                status,
            });
        }

        let report = BatchReport {
            outcomes: outcomes.into_iter().flatten().collect(),
        };

        tracing::info!(
            uploaded = report.uploaded_count(),
            rejected = report.rejected().count(),
            failed = report.failed().count(),
            conflicted = report.conflicted().count(),
            "Upload batch finished"
        );

        Ok(report)
    }

    async fn upload_one(&self, upload: &PlannedUpload<'_>, tags: &ObjectMetadata) -> UploadStatus {
        let start = Instant::now();
        let result = self
            .storage
            .put(
                Bucket::Staging,
                upload.key,
                upload.file.data.clone(),
                &upload.file.mime_type,
                tags,
            )
            .await;

        match result {
            Ok(()) => UploadStatus::Uploaded {
                url: self.storage.public_url(Bucket::Staging, upload.key),
            },
            Err(StorageError::AlreadyExists(_)) => {
                tracing::warn!(
                    key = %upload.key,
                    hash = %upload.file.hash,
                    "Staging key already taken; existing object left untouched"
                );
                UploadStatus::Conflict {
                    reason: KEY_TAKEN_REASON.to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = %upload.key,
                    hash = %upload.file.hash,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Staging upload failed; file dropped from batch"
                );
                UploadStatus::Failed {
                    reason: UPLOAD_FAILED_REASON.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use civica_core::models::IssueCategory;
    use uuid::Uuid;

    fn orchestrator(storage: &MockObjectStorage) -> UploadOrchestrator {
        UploadOrchestrator::new(Arc::new(storage.clone()), test_validator())
    }

    fn metadata() -> UploadMetadata {
        UploadMetadata {
            issue_category: IssueCategory::Potholes,
            severity: "high".to_string(),
            status: "open".to_string(),
            coordinates: "-34.6,-58.4".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_and_oversized_batches_fail_before_storage() {
        let storage = MockObjectStorage::new();
        let orchestrator = orchestrator(&storage);
        let report_id = Uuid::new_v4();

        let err = orchestrator
            .upload_batch(&[], &KeyMap::default(), &metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let files: Vec<_> = (0..7).map(|i| png_file(&format!("{i}.png"), i)).collect();
        let keys = KeyMap::build(IssueCategory::Potholes, report_id, &files);
        let err = orchestrator
            .upload_batch(&files, &keys, &metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn mime_mismatch_is_rejected_while_others_upload() {
        let storage = MockObjectStorage::new();
        let orchestrator = orchestrator(&storage);
        let files = vec![
            png_file("good.png", 1),
            mislabeled_png_file("liar.jpg", 2),
            png_file("also-good.png", 3),
        ];
        let keys = KeyMap::build(IssueCategory::Potholes, Uuid::new_v4(), &files);

        let report = orchestrator
            .upload_batch(&files, &keys, &metadata())
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.uploaded_count(), 2);
        let rejected: Vec<_> = report.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].file_name, "liar.jpg");
        assert!(!storage.contains(Bucket::Staging, &keys.entries()[1].key));
        assert!(storage.contains(Bucket::Staging, &keys.entries()[0].key));
    }

    #[tokio::test]
    async fn failed_upload_is_reported_without_backend_text() {
        let storage = MockObjectStorage::new();
        let files = vec![png_file("a.png", 1), png_file("b.png", 2)];
        let keys = KeyMap::build(IssueCategory::SewerLids, Uuid::new_v4(), &files);
        storage.fail_put_for(&keys.entries()[1].key);

        let report = orchestrator(&storage)
            .upload_batch(&files, &keys, &metadata())
            .await
            .unwrap();

        assert_eq!(report.uploaded_count(), 1);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(
            failed[0].status,
            UploadStatus::Failed {
                reason: UPLOAD_FAILED_REASON.to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_key_aborts_before_any_upload() {
        let storage = MockObjectStorage::new();
        let mapped = png_file("mapped.png", 1);
        let unmapped = png_file("unmapped.png", 2);
        let keys = KeyMap::build(
            IssueCategory::Potholes,
            Uuid::new_v4(),
            std::slice::from_ref(&mapped),
        );

        let err = orchestrator(&storage)
            .upload_batch(&[mapped, unmapped], &keys, &metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn taken_key_is_conflict_and_keeps_existing_object() {
        let storage = MockObjectStorage::new();
        let files = vec![png_file("a.png", 1)];
        let keys = KeyMap::build(IssueCategory::Potholes, Uuid::new_v4(), &files);
        let key = &keys.entries()[0].key;
        storage
            .put(
                Bucket::Staging,
                key,
                bytes::Bytes::from_static(b"other"),
                "image/png",
                &ObjectMetadata::new(),
            )
            .await
            .unwrap();

        let report = orchestrator(&storage)
            .upload_batch(&files, &keys, &metadata())
            .await
            .unwrap();

        assert_eq!(report.uploaded_count(), 0);
        assert_eq!(report.conflicted().count(), 1);
        let info = storage.get_metadata(Bucket::Staging, key).await.unwrap();
        assert_eq!(info.size, 5);
    }

    #[tokio::test]
    async fn uploads_carry_batch_metadata_tags() {
        let storage = MockObjectStorage::new();
        let files = vec![png_file("a.png", 1)];
        let keys = KeyMap::build(IssueCategory::Potholes, Uuid::new_v4(), &files);

        orchestrator(&storage)
            .upload_batch(&files, &keys, &metadata())
            .await
            .unwrap();

        let info = storage
            .get_metadata(Bucket::Staging, &keys.entries()[0].key)
            .await
            .unwrap();
        assert_eq!(info.content_type.as_deref(), Some("image/png"));
        assert_eq!(info.metadata, metadata().to_object_metadata());
    }
}
