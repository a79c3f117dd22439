//! Upload batch types shared by the key mapper, the orchestrator and callers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::picture::ContentHash;
use super::report::IssueCategory;

/// User-defined metadata stored alongside an object.
pub type ObjectMetadata = BTreeMap<String, String>;

/// A file received in an upload request, identified by its content hash.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    /// Client-declared MIME type.
    pub mime_type: String,
    pub data: Bytes,
    pub hash: ContentHash,
}

/// Metadata shared by every file of one upload batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub issue_category: IssueCategory,
    pub severity: String,
    pub status: String,
    pub coordinates: String,
}

impl UploadMetadata {
    /// Object tags written with every staged upload.
    pub fn to_object_metadata(&self) -> ObjectMetadata {
        let mut tags = ObjectMetadata::new();
        tags.insert("severity".to_string(), self.severity.clone());
        tags.insert("status".to_string(), self.status.clone());
        tags.insert(
            "issueCategory".to_string(),
            self.issue_category.as_str().to_string(),
        );
        tags.insert("coordinates".to_string(), self.coordinates.clone());
        tags
    }
}

/// Storage key derived for one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKey {
    pub key: String,
    pub hash: ContentHash,
    pub file_name: String,
}

/// Per-file result of an upload batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded { url: String },
    /// Dropped by validation before any network call.
    Rejected { reason: String },
    /// Accepted but the object store write failed.
    Failed { reason: String },
    /// Another upload already holds the key.
    Conflict { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub hash: ContentHash,
    pub file_name: String,
    pub key: Option<String>,
    #[serde(flatten)]
    pub status: UploadStatus,
}

impl UploadOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self.status, UploadStatus::Uploaded { .. })
    }
}

/// Aggregated result of a batch upload, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl BatchReport {
    pub fn uploaded(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.is_uploaded())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UploadStatus::Rejected { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UploadStatus::Failed { .. }))
    }

    pub fn conflicted(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UploadStatus::Conflict { .. }))
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_metadata_carries_every_tag() {
        let meta = UploadMetadata {
            issue_category: IssueCategory::SewerLids,
            severity: "high".to_string(),
            status: "open".to_string(),
            coordinates: "-34.6,-58.4".to_string(),
        };
        let tags = meta.to_object_metadata();
        assert_eq!(tags.get("issueCategory").map(String::as_str), Some("sewer_lids"));
        assert_eq!(tags.get("severity").map(String::as_str), Some("high"));
        assert_eq!(tags.get("status").map(String::as_str), Some("open"));
        assert_eq!(tags.get("coordinates").map(String::as_str), Some("-34.6,-58.4"));
    }

    #[test]
    fn batch_report_partitions_outcomes() {
        let outcome = |name: &str, status| UploadOutcome {
            hash: ContentHash::from_hex("aa").unwrap(),
            file_name: name.to_string(),
            key: None,
            status,
        };
        let report = BatchReport {
            outcomes: vec![
                outcome("a.png", UploadStatus::Uploaded { url: "u".to_string() }),
                outcome("b.png", UploadStatus::Rejected { reason: "mime".to_string() }),
                outcome("c.png", UploadStatus::Failed { reason: "s3".to_string() }),
            ],
        };
        assert_eq!(report.uploaded_count(), 1);
        assert_eq!(report.rejected().count(), 1);
        assert_eq!(report.failed().next().unwrap().file_name, "c.png");
    }
}
