//! Picture metadata records.
//!
//! A picture is identified by the content hash of its bytes. The hash doubles
//! as the primary key, so two uploads of identical bytes collide on `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use crate::AppError;

/// Hex-encoded digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already computed lowercase hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, AppError> {
        let hex = hex.into().to_lowercase();
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::InvalidInput(format!(
                "Invalid content hash: {}",
                hex
            )));
        }
        Ok(ContentHash(hex))
    }

    /// Hex-encode a raw digest.
    pub fn from_digest(digest: &[u8]) -> Self {
        ContentHash(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Row of the `report_pictures` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PictureRecord {
    pub id: ContentHash,
    pub key: String,
    pub url: Option<String>,
    pub preview_url: Option<String>,
    pub file_name: String,
    pub validated: bool,
    pub validated_by_users: bool,
    pub report_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "uploaded_by"))]
    pub uploaded_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PictureRecord {
    /// A picture that carries either validation flag can never be detached.
    pub fn is_locked(&self) -> bool {
        self.validated || self.validated_by_users
    }

    /// Promoted pictures have public URLs pointing at the verified tier.
    pub fn is_promoted(&self) -> bool {
        self.url.is_some()
    }
}

/// Data needed to insert a picture at attach time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPicture {
    pub id: ContentHash,
    pub key: String,
    pub file_name: String,
    pub registered_at: DateTime<Utc>,
    pub report_id: Uuid,
    pub uploaded_by_id: Option<Uuid>,
}

/// Partial verification update as sent by the verification flow.
///
/// Every locating and URL field is required; the flags default to `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPicture {
    pub id: Option<ContentHash>,
    pub report_id: Option<Uuid>,
    pub key: Option<String>,
    pub url: Option<String>,
    pub preview_url: Option<String>,
    pub validated: Option<bool>,
    pub validated_by_users: Option<bool>,
}

/// A [`VerifyPicture`] with every required field present.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureVerification {
    pub id: ContentHash,
    pub report_id: Uuid,
    pub key: String,
    pub url: String,
    pub preview_url: String,
    pub validated: bool,
    pub validated_by_users: bool,
}

impl VerifyPicture {
    pub fn into_complete(self) -> Result<PictureVerification, AppError> {
        let mut missing = Vec::new();
        if self.id.is_none() {
            missing.push("id");
        }
        if self.report_id.is_none() {
            missing.push("reportId");
        }
        if self.key.as_deref().map_or(true, str::is_empty) {
            missing.push("key");
        }
        if self.url.as_deref().map_or(true, str::is_empty) {
            missing.push("url");
        }
        if self.preview_url.as_deref().map_or(true, str::is_empty) {
            missing.push("previewUrl");
        }

        match (self.id, self.report_id, self.key, self.url, self.preview_url) {
            (Some(id), Some(report_id), Some(key), Some(url), Some(preview_url))
                if missing.is_empty() =>
            {
                Ok(PictureVerification {
                    id,
                    report_id,
                    key,
                    url,
                    preview_url,
                    validated: self.validated.unwrap_or(false),
                    validated_by_users: self.validated_by_users.unwrap_or(false),
                })
            }
            _ => Err(AppError::InvalidInput(format!(
                "Picture verification is missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Arguments of a metadata-level detach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachPicture {
    pub picture_id: ContentHash,
    pub report_id: Uuid,
    pub validated: bool,
    pub validated_by_users: bool,
}

/// Equality filter over picture columns. Unset fields are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PictureFilter {
    pub id: Option<ContentHash>,
    pub report_id: Option<Uuid>,
    pub key: Option<String>,
    pub uploaded_by_id: Option<Uuid>,
    pub validated: Option<bool>,
}

impl PictureFilter {
    pub fn by_id(id: ContentHash) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_report(report_id: Uuid) -> Self {
        Self {
            report_id: Some(report_id),
            ..Default::default()
        }
    }

    pub fn by_uploader(uploaded_by_id: Uuid) -> Self {
        Self {
            uploaded_by_id: Some(uploaded_by_id),
            ..Default::default()
        }
    }

    pub fn by_report_and_key(report_id: Uuid, key: impl Into<String>) -> Self {
        Self {
            report_id: Some(report_id),
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, picture: &PictureRecord) -> bool {
        self.id.as_ref().map_or(true, |id| id == &picture.id)
            && self.report_id.map_or(true, |r| r == picture.report_id)
            && self.key.as_deref().map_or(true, |k| k == picture.key)
            && self
                .uploaded_by_id
                .map_or(true, |u| Some(u) == picture.uploaded_by_id)
            && self.validated.map_or(true, |v| v == picture.validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> ContentHash {
        ContentHash::from_hex("ab12").unwrap()
    }

    #[test]
    fn content_hash_rejects_non_hex() {
        assert!(ContentHash::from_hex("").is_err());
        assert!(ContentHash::from_hex("xyz").is_err());
        assert_eq!(ContentHash::from_hex("AB12").unwrap().as_str(), "ab12");
    }

    #[test]
    fn verify_requires_all_locating_fields() {
        let err = VerifyPicture {
            id: Some(hash()),
            report_id: Some(Uuid::new_v4()),
            key: Some("potholes/r/a.png".to_string()),
            url: None,
            preview_url: Some(String::new()),
            ..Default::default()
        }
        .into_complete()
        .unwrap_err();

        match err {
            AppError::InvalidInput(msg) => {
                assert!(msg.contains("url"));
                assert!(msg.contains("previewUrl"));
                assert!(!msg.contains("reportId"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn verify_flags_default_to_false() {
        let report_id = Uuid::new_v4();
        let complete = VerifyPicture {
            id: Some(hash()),
            report_id: Some(report_id),
            key: Some("k".to_string()),
            url: Some("https://u".to_string()),
            preview_url: Some("https://p".to_string()),
            validated: None,
            validated_by_users: None,
        }
        .into_complete()
        .unwrap();

        assert_eq!(complete.report_id, report_id);
        assert!(!complete.validated);
        assert!(!complete.validated_by_users);
    }

    #[test]
    fn filter_matches_on_every_set_field() {
        let report_id = Uuid::new_v4();
        let now = Utc::now();
        let picture = PictureRecord {
            id: hash(),
            key: "potholes/x/a.png".to_string(),
            url: None,
            preview_url: None,
            file_name: "a.png".to_string(),
            validated: false,
            validated_by_users: false,
            report_id,
            uploaded_by_id: None,
            created_at: now,
            registered_at: now,
            updated_at: now,
        };

        assert!(PictureFilter::default().matches(&picture));
        assert!(PictureFilter::by_report_and_key(report_id, "potholes/x/a.png").matches(&picture));
        assert!(!PictureFilter::by_report_and_key(report_id, "other").matches(&picture));
        assert!(!PictureFilter::by_uploader(Uuid::new_v4()).matches(&picture));
    }
}
