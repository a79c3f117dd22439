//! Verification flow: promote an accepted picture and record its public URLs.

use civica_core::models::{ContentHash, PictureRecord, VerifyPicture};
use civica_core::AppError;
use civica_db::PictureRepositoryTrait;
use std::sync::Arc;
use uuid::Uuid;

use crate::promotion::{PromotedUrls, VerificationPromoter};

#[derive(Clone)]
pub struct VerificationService {
    pictures: Arc<dyn PictureRepositoryTrait>,
    promoter: VerificationPromoter,
}

impl VerificationService {
    pub fn new(pictures: Arc<dyn PictureRepositoryTrait>, promoter: VerificationPromoter) -> Self {
        Self { pictures, promoter }
    }

    /// Move the picture to the verified tier and set its validation flags.
    ///
    /// A picture that already has URLs is not moved again; only its flags
    /// are updated.
    #[tracing::instrument(skip(self), fields(picture_id = %picture_id, report_id = %report_id))]
    pub async fn verify_picture(
        &self,
        picture_id: &ContentHash,
        report_id: Uuid,
        validated: bool,
        validated_by_users: bool,
    ) -> Result<PictureRecord, AppError> {
        let picture = self
            .pictures
            .find_by_id(picture_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", picture_id)))?;

        if picture.report_id != report_id {
            return Err(AppError::Policy(format!(
                "Picture {} does not belong to report {}",
                picture_id, report_id
            )));
        }

        let urls = match (&picture.url, &picture.preview_url) {
            (Some(url), Some(preview_url)) => PromotedUrls {
                url: url.clone(),
                preview_url: preview_url.clone(),
            },
            _ => self.promoter.move_to_verified_bucket(&picture.key).await?,
        };

        let record = self
            .pictures
            .verify(VerifyPicture {
                id: Some(picture.id),
                report_id: Some(report_id),
                key: Some(picture.key),
                url: Some(urls.url),
                preview_url: Some(urls.preview_url),
                validated: Some(validated),
                validated_by_users: Some(validated_by_users),
            })
            .await?;

        tracing::info!(
            validated = record.validated,
            validated_by_users = record.validated_by_users,
            "Picture verified"
        );
        Ok(record)
    }
}
