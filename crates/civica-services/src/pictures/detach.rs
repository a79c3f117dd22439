//! Detach/Delete Guard
//!
//! A picture is detached from its report only after four checks: the report
//! exists, the picture exists, the picture belongs to that report and it has
//! not been validated. The row goes first; the backing object is deleted only
//! when a row was actually removed. An object delete that fails afterwards
//! leaves an orphaned object, which is logged and reported as a storage error.

use civica_core::models::{ContentHash, DetachPicture};
use civica_core::AppError;
use civica_db::{PictureRepositoryTrait, ReportRepositoryTrait};
use civica_storage::{Bucket, ObjectStorage};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachOutcome {
    pub picture_id: ContentHash,
    pub report_id: Uuid,
    pub rows_affected: u64,
    /// Bucket the backing object was removed from, if any.
    pub deleted_from: Option<String>,
}

#[derive(Clone)]
pub struct DetachGuard {
    pictures: Arc<dyn PictureRepositoryTrait>,
    reports: Arc<dyn ReportRepositoryTrait>,
    storage: Arc<dyn ObjectStorage>,
}

impl DetachGuard {
    pub fn new(
        pictures: Arc<dyn PictureRepositoryTrait>,
        reports: Arc<dyn ReportRepositoryTrait>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            pictures,
            reports,
            storage,
        }
    }

    #[tracing::instrument(skip(self), fields(picture_id = %picture_id, report_id = %report_id))]
    pub async fn detach(
        &self,
        picture_id: &ContentHash,
        report_id: Uuid,
    ) -> Result<DetachOutcome, AppError> {
        if !self.reports.report_exists(report_id).await? {
            return Err(AppError::NotFound(format!("Report {} not found", report_id)));
        }

        let picture = self
            .pictures
            .find_by_id(picture_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", picture_id)))?;

        if picture.report_id != report_id {
            tracing::warn!(
                owner_report_id = %picture.report_id,
                "Detach refused, picture belongs to another report"
            );
            return Err(AppError::Policy(format!(
                "Picture {} does not belong to report {}",
                picture_id, report_id
            )));
        }

        if picture.validated {
            return Err(AppError::Policy(format!(
                "Picture {} is validated and cannot be detached",
                picture_id
            )));
        }

        let rows_affected = self
            .pictures
            .detach(&DetachPicture {
                picture_id: picture.id.clone(),
                report_id,
                validated: picture.validated,
                validated_by_users: picture.validated_by_users,
            })
            .await?;

        if rows_affected == 0 {
            tracing::info!("No picture row removed, backing object left in place");
            return Ok(DetachOutcome {
                picture_id: picture.id,
                report_id,
                rows_affected,
                deleted_from: None,
            });
        }

        let bucket = if picture.is_promoted() {
            Bucket::Verified
        } else {
            Bucket::Staging
        };
        let bucket_name = self.storage.bucket_name(bucket).to_string();

        if let Err(e) = self.storage.delete(bucket, &picture.key).await {
            tracing::error!(
                error = %e,
                key = %picture.key,
                bucket = %bucket_name,
                inconsistency = "orphaned_object",
                "Picture row removed but backing object was not deleted"
            );
            return Err(e.into());
        }

        tracing::info!(key = %picture.key, bucket = %bucket_name, "Picture detached");

        Ok(DetachOutcome {
            picture_id: picture.id,
            report_id,
            rows_affected,
            deleted_from: Some(bucket_name),
        })
    }
}
