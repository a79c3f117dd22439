//! Declared-vs-sniffed MIME type check.
//!
//! A file passes only when the type inferred from its leading bytes equals the
//! client-declared type (case-insensitively) and the declared type is on the
//! allow-list. Allow-list entries are exact types or `type/*` wildcards.

use crate::validator::ValidationError;

#[derive(Debug, Clone)]
pub struct MimeGuard {
    allowed_content_types: Vec<String>,
}

impl MimeGuard {
    pub fn new(allowed_content_types: Vec<String>) -> Self {
        Self {
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.trim().to_lowercase())
                .collect(),
        }
    }

    /// MIME type inferred from the byte signature, if recognized.
    pub fn sniff(data: &[u8]) -> Option<&'static str> {
        infer::get(data).map(|kind| kind.mime_type())
    }

    pub fn is_allowed(&self, content_type: &str) -> bool {
        let normalized = content_type.trim().to_lowercase();
        self.allowed_content_types.iter().any(|allowed| {
            match allowed.strip_suffix("/*") {
                Some(prefix) => normalized
                    .split_once('/')
                    .is_some_and(|(top, sub)| top == prefix && !sub.is_empty()),
                None => allowed == &normalized,
            }
        })
    }

    pub fn check(&self, declared: &str, data: &[u8]) -> Result<(), ValidationError> {
        if !self.is_allowed(declared) {
            return Err(ValidationError::InvalidContentType {
                content_type: declared.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        let sniffed = Self::sniff(data).ok_or(ValidationError::UnrecognizedSignature)?;
        if !sniffed.eq_ignore_ascii_case(declared.trim()) {
            return Err(ValidationError::MimeMismatch {
                declared: declared.to_string(),
                sniffed: sniffed.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";

    #[test]
    fn wildcard_allows_any_image_subtype() {
        let guard = MimeGuard::new(vec!["image/*".to_string()]);
        assert!(guard.is_allowed("image/png"));
        assert!(guard.is_allowed("IMAGE/JPEG"));
        assert!(!guard.is_allowed("application/pdf"));
        assert!(!guard.is_allowed("image/"));
    }

    #[test]
    fn exact_entries_match_exactly() {
        let guard = MimeGuard::new(vec!["image/png".to_string()]);
        assert!(guard.is_allowed("image/png"));
        assert!(!guard.is_allowed("image/jpeg"));
    }

    #[test]
    fn declared_type_must_match_signature() {
        let guard = MimeGuard::new(vec!["image/*".to_string()]);
        assert!(guard.check("image/png", PNG).is_ok());
        assert!(guard.check("Image/PNG", PNG).is_ok());
        assert!(matches!(
            guard.check("image/png", JPEG),
            Err(ValidationError::MimeMismatch { .. })
        ));
        assert!(matches!(
            guard.check("image/png", b"plain text"),
            Err(ValidationError::UnrecognizedSignature)
        ));
    }

    #[test]
    fn disallowed_declared_type_rejected_before_sniffing() {
        let guard = MimeGuard::new(vec!["image/*".to_string()]);
        assert!(matches!(
            guard.check("application/pdf", b"%PDF-1.7"),
            Err(ValidationError::InvalidContentType { .. })
        ));
    }
}
