//! Attach flow: upload a batch of pictures to a report.
//!
//! Ordering: objects are written to staging first and metadata rows are
//! inserted only for confirmed uploads, in one statement. A picture record
//! therefore always has a staged object behind it. Staging writes are
//! create-only, so a concurrent request that claims the same key first makes
//! this one fail with a conflict instead of replacing its bytes. When the
//! insert fails, staged objects no record points at are removed on a
//! best-effort basis.

use civica_core::models::{
    BatchReport, ContentHash, NewPicture, PictureFilter, PictureRecord, ReportSummary,
    UploadMetadata, UploadedFile,
};
use civica_core::AppError;
use civica_db::{PictureRepositoryTrait, ReportRepositoryTrait};
use civica_storage::{Bucket, KeyMap, ObjectStorage};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::upload::UploadOrchestrator;

/// Pictures to attach to one report, with the report status fields that are
/// written as object tags.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub report_id: Uuid,
    pub severity: String,
    pub status: String,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachOutcome {
    pub pictures: Vec<PictureRecord>,
    pub batch: BatchReport,
}

#[derive(Clone)]
pub struct AttachService {
    pictures: Arc<dyn PictureRepositoryTrait>,
    reports: Arc<dyn ReportRepositoryTrait>,
    storage: Arc<dyn ObjectStorage>,
    orchestrator: UploadOrchestrator,
    uploaded_by: Option<Uuid>,
}

impl AttachService {
    pub fn new(
        pictures: Arc<dyn PictureRepositoryTrait>,
        reports: Arc<dyn ReportRepositoryTrait>,
        storage: Arc<dyn ObjectStorage>,
        orchestrator: UploadOrchestrator,
        uploaded_by: Option<Uuid>,
    ) -> Self {
        Self {
            pictures,
            reports,
            storage,
            orchestrator,
            uploaded_by,
        }
    }

    #[tracing::instrument(skip_all, fields(report_id = %request.report_id, files = request.files.len()))]
    pub async fn attach(&self, request: AttachRequest) -> Result<AttachOutcome, AppError> {
        self.orchestrator.check_batch_size(request.files.len())?;

        let report = self
            .reports
            .find_report(request.report_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", request.report_id)))?;

        let keys = KeyMap::build(report.issue_category, report.id, &request.files);
        self.reject_duplicates(&report, &request.files, &keys).await?;

        let metadata = UploadMetadata {
            issue_category: report.issue_category,
            severity: request.severity,
            status: request.status,
            coordinates: report.coordinate.clone(),
        };

        let batch = self
            .orchestrator
            .upload_batch(&request.files, &keys, &metadata)
            .await?;

        if let Some(taken) = batch.conflicted().next() {
            // Staging puts never overwrite, so every key this batch uploaded
            // holds its own bytes and no record yet.
            tracing::warn!(
                report_id = %report.id,
                file_name = %taken.file_name,
                "Concurrent upload claimed a key of this batch"
            );
            let staged: Vec<&str> = batch.uploaded().filter_map(|o| o.key.as_deref()).collect();
            self.remove_staged(&staged).await;
            return Err(AppError::Conflict(format!(
                "Report already has a picture named {}",
                taken.file_name
            )));
        }

        let new_pictures: Vec<NewPicture> = keys
            .entries()
            .iter()
            .filter(|entry| {
                batch
                    .uploaded()
                    .any(|o| o.hash == entry.hash && o.key.as_deref() == Some(entry.key.as_str()))
            })
            .map(|entry| NewPicture {
                id: entry.hash.clone(),
                key: entry.key.clone(),
                file_name: entry.file_name.clone(),
                registered_at: report.reported_at,
                report_id: report.id,
                uploaded_by_id: self.uploaded_by,
            })
            .collect();

        if new_pictures.is_empty() {
            tracing::info!(report_id = %report.id, "No picture uploaded, nothing to record");
            return Ok(AttachOutcome {
                pictures: Vec::new(),
                batch,
            });
        }

        match self.pictures.attach(&new_pictures).await {
            Ok(pictures) => {
                tracing::info!(
                    report_id = %report.id,
                    attached = pictures.len(),
                    "Pictures attached to report"
                );
                Ok(AttachOutcome { pictures, batch })
            }
            Err(e) => {
                tracing::warn!(error = %e, report_id = %report.id, "Recording attached pictures failed");
                self.remove_unreferenced(report.id, &new_pictures).await;
                Err(e)
            }
        }
    }

    /// Duplicate content or key, inside the batch or against stored pictures,
    /// is a conflict. Runs before any object is written.
    async fn reject_duplicates(
        &self,
        report: &ReportSummary,
        files: &[UploadedFile],
        keys: &KeyMap,
    ) -> Result<(), AppError> {
        let mut seen_hashes = HashSet::new();
        let mut seen_keys = HashSet::new();
        for entry in keys.entries() {
            if !seen_hashes.insert(&entry.hash) {
                return Err(AppError::Conflict(format!(
                    "File {} appears more than once in the batch",
                    entry.file_name
                )));
            }
            if !seen_keys.insert(entry.key.as_str()) {
                return Err(AppError::Conflict(format!(
                    "More than one file in the batch is named {}",
                    entry.file_name
                )));
            }
        }

        let hashes: Vec<ContentHash> = files.iter().map(|f| f.hash.clone()).collect();
        let known = self.pictures.find_by_hashes(&hashes).await?;
        if let Some(existing) = known.first() {
            tracing::debug!(
                picture_id = %existing.id,
                report_id = %existing.report_id,
                "Upload rejected, content already attached"
            );
            return Err(AppError::Conflict(format!(
                "File with content hash {} is already attached",
                existing.id
            )));
        }

        let attached = self.pictures.find(&PictureFilter::by_report(report.id)).await?;
        if let Some(taken) = attached.iter().find(|p| seen_keys.contains(p.key.as_str())) {
            return Err(AppError::Conflict(format!(
                "Report already has a picture named {}",
                taken.file_name
            )));
        }

        Ok(())
    }

    async fn remove_staged(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.storage.delete(Bucket::Staging, key).await {
                tracing::error!(
                    error = %e,
                    key = %key,
                    bucket = %self.storage.bucket_name(Bucket::Staging),
                    inconsistency = "orphaned_staged_object",
                    "Failed to remove staged object of a conflicting batch"
                );
            }
        }
    }

    /// Delete staged objects whose key no stored picture references.
    async fn remove_unreferenced(&self, report_id: Uuid, staged: &[NewPicture]) {
        for picture in staged {
            let referenced = match self
                .pictures
                .find_by_report_and_key(report_id, &picture.key)
                .await
            {
                Ok(found) => found.is_some(),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        key = %picture.key,
                        inconsistency = "orphaned_staged_object",
                        "Could not check whether staged object is referenced; left in place"
                    );
                    continue;
                }
            };
            if referenced {
                continue;
            }

            if let Err(e) = self.storage.delete(Bucket::Staging, &picture.key).await {
                tracing::error!(
                    error = %e,
                    key = %picture.key,
                    bucket = %self.storage.bucket_name(Bucket::Staging),
                    inconsistency = "orphaned_staged_object",
                    "Failed to remove staged object after metadata insert failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use civica_core::models::IssueCategory;

    const UPLOADER: Uuid = Uuid::from_u128(0xe190_3638_462f_4c03_8176_7bae_5198_6e43);

    struct Fixture {
        pictures: MockPictureRepository,
        reports: MockReportRepository,
        storage: MockObjectStorage,
        service: AttachService,
        report: ReportSummary,
    }

    fn fixture() -> Fixture {
        let pictures = MockPictureRepository::new();
        let reports = MockReportRepository::new();
        let storage = MockObjectStorage::new();
        let report = report_summary(IssueCategory::Potholes);
        reports.add_report(report.clone());

        let orchestrator = UploadOrchestrator::new(Arc::new(storage.clone()), test_validator());
        let service = AttachService::new(
            Arc::new(pictures.clone()),
            Arc::new(reports.clone()),
            Arc::new(storage.clone()),
            orchestrator,
            Some(UPLOADER),
        );

        Fixture {
            pictures,
            reports,
            storage,
            service,
            report,
        }
    }

    fn request(report_id: Uuid, files: Vec<UploadedFile>) -> AttachRequest {
        AttachRequest {
            report_id,
            severity: "high".to_string(),
            status: "open".to_string(),
            files,
        }
    }

    #[tokio::test]
    async fn attach_records_uploaded_pictures_with_report_time() {
        let f = fixture();
        let outcome = f
            .service
            .attach(request(f.report.id, vec![png_file("hole 1.png", 1)]))
            .await
            .unwrap();

        assert_eq!(outcome.pictures.len(), 1);
        let picture = &outcome.pictures[0];
        assert_eq!(picture.key, format!("potholes/{}/hole_1.png", f.report.id));
        assert_eq!(picture.file_name, "hole_1.png");
        assert_eq!(picture.registered_at, f.report.reported_at);
        assert_eq!(picture.uploaded_by_id, Some(UPLOADER));
        assert!(f.storage.contains(Bucket::Staging, &picture.key));

        let info = f
            .storage
            .get_metadata(Bucket::Staging, &picture.key)
            .await
            .unwrap();
        assert_eq!(
            info.metadata.get("coordinates").map(String::as_str),
            Some(f.report.coordinate.as_str())
        );
    }

    #[tokio::test]
    async fn same_content_twice_is_conflict_and_original_kept() {
        let f = fixture();
        let file = png_file("a.png", 7);
        let first = f
            .service
            .attach(request(f.report.id, vec![file.clone()]))
            .await
            .unwrap();
        f.storage.clear_calls();

        let other = report_summary(IssueCategory::SewerLids);
        f.reports.add_report(other.clone());
        let mut renamed = file.clone();
        renamed.file_name = "copy.png".to_string();
        let err = f
            .service
            .attach(request(other.id, vec![renamed]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(f.storage.calls().is_empty());
        assert_eq!(f.pictures.get(&file.hash), Some(first.pictures[0].clone()));
    }

    #[tokio::test]
    async fn duplicate_inside_batch_is_conflict() {
        let f = fixture();
        let err = f
            .service
            .attach(request(
                f.report.id,
                vec![png_file("a.png", 3), png_file("b.png", 3)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(f.storage.calls().is_empty());
    }

    #[tokio::test]
    async fn reused_file_name_in_report_is_conflict() {
        let f = fixture();
        f.service
            .attach(request(f.report.id, vec![png_file("a.png", 1)]))
            .await
            .unwrap();
        f.storage.clear_calls();

        let err = f
            .service
            .attach(request(f.report.id, vec![png_file("a.png", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(f.storage.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .attach(request(Uuid::new_v4(), vec![png_file("a.png", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_size_checked_before_report_lookup() {
        let f = fixture();
        let err = f
            .service
            .attach(request(Uuid::new_v4(), Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(f.storage.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_and_failed_files_get_no_record() {
        let f = fixture();
        let files = vec![
            png_file("ok.png", 1),
            mislabeled_png_file("liar.jpg", 2),
            png_file("flaky.png", 3),
        ];
        f.storage
            .fail_put_for(&format!("potholes/{}/flaky.png", f.report.id));

        let outcome = f
            .service
            .attach(request(f.report.id, files.clone()))
            .await
            .unwrap();

        assert_eq!(outcome.pictures.len(), 1);
        assert_eq!(outcome.pictures[0].file_name, "ok.png");
        assert_eq!(outcome.batch.rejected().count(), 1);
        assert_eq!(outcome.batch.failed().count(), 1);
        assert!(f.pictures.get(&files[1].hash).is_none());
        assert!(f.pictures.get(&files[2].hash).is_none());
    }

    #[tokio::test]
    async fn key_claimed_by_concurrent_attach_is_conflict_without_overwrite() {
        let f = fixture();
        let ours = png_file("a.png", 1);
        let other = png_file("b.png", 2);
        let key = format!("potholes/{}/a.png", f.report.id);
        let other_key = format!("potholes/{}/b.png", f.report.id);

        // A concurrent request passed the pre-checks and stored different
        // bytes at our key before our upload ran.
        f.storage
            .put(
                Bucket::Staging,
                &key,
                bytes::Bytes::from_static(b"winner"),
                "image/png",
                &civica_core::models::ObjectMetadata::new(),
            )
            .await
            .unwrap();

        let err = f
            .service
            .attach(request(f.report.id, vec![ours.clone(), other.clone()]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        let info = f.storage.get_metadata(Bucket::Staging, &key).await.unwrap();
        assert_eq!(info.size, 6);
        assert!(!f.storage.contains(Bucket::Staging, &other_key));
        assert!(f.pictures.get(&ours.hash).is_none());
        assert!(f.pictures.get(&other.hash).is_none());
    }

    #[tokio::test]
    async fn failed_insert_removes_unreferenced_staged_objects() {
        let f = fixture();
        f.pictures
            .fail_next_attach(AppError::Conflict("Picture already attached".to_string()));
        let file = png_file("race.png", 9);
        let key = format!("potholes/{}/race.png", f.report.id);

        let err = f
            .service
            .attach(request(f.report.id, vec![file]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!f.storage.contains(Bucket::Staging, &key));
        assert!(f.pictures.is_empty());
    }
}
