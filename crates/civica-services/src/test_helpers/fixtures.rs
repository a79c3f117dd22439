use bytes::Bytes;
use chrono::{TimeZone, Utc};
use civica_core::models::{IssueCategory, ReportSummary, UploadedFile};
use civica_processing::{identify_file, PictureValidator};
use uuid::Uuid;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn png_bytes(seed: u8) -> Bytes {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&[seed; 16]);
    Bytes::from(data)
}

/// A PNG whose content hash is determined by `seed`.
pub fn png_file(name: &str, seed: u8) -> UploadedFile {
    identify_file(name, "image/png", png_bytes(seed))
}

/// PNG bytes declared as JPEG.
pub fn mislabeled_png_file(name: &str, seed: u8) -> UploadedFile {
    identify_file(name, "image/jpeg", png_bytes(seed))
}

pub fn test_validator() -> PictureValidator {
    PictureValidator::new(6, 1024 * 1024, vec!["image/*".to_string()])
}

pub fn report_summary(category: IssueCategory) -> ReportSummary {
    ReportSummary {
        id: Uuid::new_v4(),
        coordinate: "-34.6037,-58.3816".to_string(),
        reported_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        issue_category: category,
    }
}
