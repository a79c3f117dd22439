//! Wiring for the `civica` operator CLI: builds the services from
//! configuration and turns local files into uploads.

use anyhow::Context;
use civica_core::models::UploadedFile;
use civica_core::Config;
use civica_db::{PictureRepository, ReportRepository};
use civica_processing::{identify_file, PictureValidator};
use civica_services::{
    AttachService, DetachGuard, PictureQueryService, UploadOrchestrator, VerificationPromoter,
    VerificationService,
};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Every flow the CLI can drive, sharing one pool and one storage client.
pub struct Services {
    pub attach: AttachService,
    pub detach: DetachGuard,
    pub verification: VerificationService,
    pub queries: PictureQueryService,
}

impl Services {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let uploaded_by = parse_acting_user(config.acting_user_id())?;

        let pool = civica_db::setup_database(config).await?;
        let storage = civica_storage::create_storage(config)
            .await
            .context("Failed to initialize object storage")?;

        let pictures = Arc::new(PictureRepository::new(pool.clone()));
        let reports = Arc::new(ReportRepository::new(pool));
        let orchestrator =
            UploadOrchestrator::new(storage.clone(), PictureValidator::from_config(config));

        Ok(Self {
            attach: AttachService::new(
                pictures.clone(),
                reports.clone(),
                storage.clone(),
                orchestrator,
                Some(uploaded_by),
            ),
            detach: DetachGuard::new(pictures.clone(), reports, storage.clone()),
            verification: VerificationService::new(
                pictures.clone(),
                VerificationPromoter::new(storage.clone()),
            ),
            queries: PictureQueryService::new(pictures, storage),
        })
    }
}

pub fn parse_acting_user(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("ACTING_USER_ID is not a UUID: {}", raw))
}

/// Content type a client would declare for this file, from its extension.
pub fn declared_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Read a file from disk as an upload. `content_type` overrides the
/// extension-derived type.
pub async fn read_upload(path: &Path, content_type: Option<&str>) -> anyhow::Result<UploadedFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    let mime_type = content_type.unwrap_or_else(|| declared_content_type(path));
    Ok(identify_file(&file_name, mime_type, data.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(declared_content_type(Path::new("a/b/hole.JPG")), "image/jpeg");
        assert_eq!(declared_content_type(Path::new("lid.png")), "image/png");
        assert_eq!(
            declared_content_type(Path::new("notes")),
            "application/octet-stream"
        );
    }

    #[test]
    fn acting_user_must_be_uuid() {
        assert!(parse_acting_user("e1903638-462f-4c03-8176-7bae51986e43").is_ok());
        assert!(parse_acting_user("alice").is_err());
    }

    #[tokio::test]
    async fn read_upload_hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lamp.png");
        tokio::fs::write(&path, b"\x89PNG\r\n\x1a\nrest").await.unwrap();

        let upload = read_upload(&path, None).await.unwrap();
        assert_eq!(upload.file_name, "lamp.png");
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.hash, civica_processing::content_hash(b"\x89PNG\r\n\x1a\nrest"));

        let forced = read_upload(&path, Some("image/jpeg")).await.unwrap();
        assert_eq!(forced.mime_type, "image/jpeg");
    }
}
