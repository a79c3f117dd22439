use civica_core::models::{ContentHash, PictureFilter, PictureRecord};
use civica_core::AppError;
use civica_db::PictureRepositoryTrait;
use civica_storage::{Bucket, ObjectInfo, ObjectStorage};
use std::sync::Arc;
use uuid::Uuid;

/// Read paths over picture records and staged object metadata.
#[derive(Clone)]
pub struct PictureQueryService {
    pictures: Arc<dyn PictureRepositoryTrait>,
    storage: Arc<dyn ObjectStorage>,
}

impl PictureQueryService {
    pub fn new(pictures: Arc<dyn PictureRepositoryTrait>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { pictures, storage }
    }

    pub async fn get_picture(&self, id: &ContentHash) -> Result<PictureRecord, AppError> {
        self.pictures
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", id)))
    }

    pub async fn pictures_for_report(&self, report_id: Uuid) -> Result<Vec<PictureRecord>, AppError> {
        self.pictures.find(&PictureFilter::by_report(report_id)).await
    }

    pub async fn pictures_by_uploader(&self, user_id: Uuid) -> Result<Vec<PictureRecord>, AppError> {
        self.pictures.find(&PictureFilter::by_uploader(user_id)).await
    }

    pub async fn picture_by_report_and_key(
        &self,
        report_id: Uuid,
        key: &str,
    ) -> Result<PictureRecord, AppError> {
        self.pictures
            .find_by_report_and_key(report_id, key)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No picture with key {} in report {}", key, report_id))
            })
    }

    /// Content type, size and tags of a staged object.
    pub async fn object_metadata(&self, key: &str) -> Result<ObjectInfo, AppError> {
        Ok(self.storage.get_metadata(Bucket::Staging, key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pictures::{AttachRequest, AttachService};
    use crate::test_helpers::*;
    use crate::upload::UploadOrchestrator;
    use civica_core::models::IssueCategory;

    #[tokio::test]
    async fn attached_picture_round_trips_by_report_and_key() {
        let pictures = MockPictureRepository::new();
        let reports = MockReportRepository::new();
        let storage = MockObjectStorage::new();
        let report = report_summary(IssueCategory::BurnedOutSemaphores);
        reports.add_report(report.clone());
        let uploader = Uuid::new_v4();

        let attach = AttachService::new(
            Arc::new(pictures.clone()),
            Arc::new(reports),
            Arc::new(storage.clone()),
            UploadOrchestrator::new(Arc::new(storage.clone()), test_validator()),
            Some(uploader),
        );
        let file = png_file("red light.png", 8);
        attach
            .attach(AttachRequest {
                report_id: report.id,
                severity: "medium".to_string(),
                status: "open".to_string(),
                files: vec![file.clone()],
            })
            .await
            .unwrap();

        let queries = PictureQueryService::new(Arc::new(pictures), Arc::new(storage));
        let key = format!("burned_out_semaphores/{}/red_light.png", report.id);

        let found = queries.picture_by_report_and_key(report.id, &key).await.unwrap();
        assert_eq!(found.key, key);
        assert_eq!(found.file_name, "red_light.png");
        assert_eq!(found.report_id, report.id);
        assert_eq!(found.id, file.hash);

        assert_eq!(queries.get_picture(&file.hash).await.unwrap(), found);
        assert_eq!(queries.pictures_for_report(report.id).await.unwrap(), vec![found.clone()]);
        assert_eq!(queries.pictures_by_uploader(uploader).await.unwrap(), vec![found]);

        let info = queries.object_metadata(&key).await.unwrap();
        assert_eq!(info.metadata.get("severity").map(String::as_str), Some("medium"));
        assert_eq!(
            info.metadata.get("issueCategory").map(String::as_str),
            Some("burned_out_semaphores")
        );
    }

    #[tokio::test]
    async fn missing_picture_is_not_found() {
        let queries = PictureQueryService::new(
            Arc::new(MockPictureRepository::new()),
            Arc::new(MockObjectStorage::new()),
        );
        let err = queries
            .picture_by_report_and_key(Uuid::new_v4(), "potholes/x/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = queries.object_metadata("potholes/x/a.png").await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
