//! Mock repository implementations for testing
//!
//! The picture mock enforces the same uniqueness rules as the Postgres
//! schema: content hash and `(report_id, key)`.

use async_trait::async_trait;
use chrono::Utc;
use civica_core::models::{
    ContentHash, DetachPicture, NewPicture, PictureFilter, PictureRecord, ReportSummary,
    VerifyPicture,
};
use civica_core::AppError;
use civica_db::picture::ensure_detachable;
use civica_db::{PictureRepositoryTrait, ReportRepositoryTrait};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Mock picture repository for testing without database
#[derive(Clone, Default)]
pub struct MockPictureRepository {
    pictures: Arc<Mutex<HashMap<ContentHash, PictureRecord>>>,
    fail_attach: Arc<Mutex<Option<AppError>>>,
    detach_calls: Arc<Mutex<Vec<DetachPicture>>>,
}

impl MockPictureRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_picture(&self, picture: PictureRecord) {
        self.pictures
            .lock()
            .unwrap()
            .insert(picture.id.clone(), picture);
    }

    pub fn get(&self, id: &ContentHash) -> Option<PictureRecord> {
        self.pictures.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.pictures.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next `attach` fail with `err`.
    pub fn fail_next_attach(&self, err: AppError) {
        *self.fail_attach.lock().unwrap() = Some(err);
    }

    pub fn detach_calls(&self) -> Vec<DetachPicture> {
        self.detach_calls.lock().unwrap().clone()
    }
}

/// Build a stored record the way the attach insert would.
pub fn picture_record(new: &NewPicture) -> PictureRecord {
    let now = Utc::now();
    PictureRecord {
        id: new.id.clone(),
        key: new.key.clone(),
        url: None,
        preview_url: None,
        file_name: new.file_name.clone(),
        validated: false,
        validated_by_users: false,
        report_id: new.report_id,
        uploaded_by_id: new.uploaded_by_id,
        created_at: now,
        registered_at: new.registered_at,
        updated_at: now,
    }
}

#[async_trait]
impl PictureRepositoryTrait for MockPictureRepository {
    async fn attach(&self, pictures: &[NewPicture]) -> Result<Vec<PictureRecord>, AppError> {
        if let Some(err) = self.fail_attach.lock().unwrap().take() {
            return Err(err);
        }

        let mut stored = self.pictures.lock().unwrap();
        for (i, new) in pictures.iter().enumerate() {
            let taken = stored.contains_key(&new.id)
                || stored
                    .values()
                    .any(|p| p.report_id == new.report_id && p.key == new.key)
                || pictures[..i]
                    .iter()
                    .any(|p| p.id == new.id || (p.report_id == new.report_id && p.key == new.key));
            if taken {
                return Err(AppError::Conflict("Picture already attached".to_string()));
            }
        }

        let records: Vec<PictureRecord> = pictures.iter().map(picture_record).collect();
        for record in &records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(records)
    }

    async fn verify(&self, data: VerifyPicture) -> Result<PictureRecord, AppError> {
        let data = data.into_complete()?;
        let mut stored = self.pictures.lock().unwrap();
        let picture = stored
            .get_mut(&data.id)
            .filter(|p| p.report_id == data.report_id && p.key == data.key)
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", data.id)))?;

        picture.url = Some(data.url);
        picture.preview_url = Some(data.preview_url);
        picture.validated = data.validated;
        picture.validated_by_users = data.validated_by_users;
        picture.updated_at = Utc::now();
        Ok(picture.clone())
    }

    async fn find(&self, filter: &PictureFilter) -> Result<Vec<PictureRecord>, AppError> {
        let mut found: Vec<PictureRecord> = self
            .pictures
            .lock()
            .unwrap()
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.registered_at, &a.id).cmp(&(b.registered_at, &b.id)));
        Ok(found)
    }

    async fn find_by_id(&self, id: &ContentHash) -> Result<Option<PictureRecord>, AppError> {
        Ok(self.get(id))
    }

    async fn find_by_hashes(&self, hashes: &[ContentHash]) -> Result<Vec<PictureRecord>, AppError> {
        let stored = self.pictures.lock().unwrap();
        Ok(hashes.iter().filter_map(|h| stored.get(h).cloned()).collect())
    }

    async fn find_by_report_and_key(
        &self,
        report_id: Uuid,
        key: &str,
    ) -> Result<Option<PictureRecord>, AppError> {
        Ok(self
            .pictures
            .lock()
            .unwrap()
            .values()
            .find(|p| p.report_id == report_id && p.key == key)
            .cloned())
    }

    async fn detach(&self, data: &DetachPicture) -> Result<u64, AppError> {
        self.detach_calls.lock().unwrap().push(data.clone());
        ensure_detachable(data)?;

        let mut stored = self.pictures.lock().unwrap();
        let matches = stored
            .get(&data.picture_id)
            .is_some_and(|p| p.report_id == data.report_id && !p.is_locked());
        if matches {
            stored.remove(&data.picture_id);
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

/// Mock report lookup for testing without database
#[derive(Clone, Default)]
pub struct MockReportRepository {
    reports: Arc<Mutex<HashMap<Uuid, ReportSummary>>>,
}

impl MockReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_report(&self, report: ReportSummary) {
        self.reports.lock().unwrap().insert(report.id, report);
    }
}

#[async_trait]
impl ReportRepositoryTrait for MockReportRepository {
    async fn find_report(&self, report_id: Uuid) -> Result<Option<ReportSummary>, AppError> {
        Ok(self.reports.lock().unwrap().get(&report_id).cloned())
    }
}
