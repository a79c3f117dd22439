//! Key Mapper: deterministic object keys for a report's pictures.
//!
//! Key format: `{issueCategory}/{reportId}/{sanitizedFileName}`.

use std::collections::HashMap;

use civica_core::models::{ContentHash, FileKey, IssueCategory, UploadedFile};
use uuid::Uuid;

const FALLBACK_FILE_NAME: &str = "file";
const MAX_FILE_NAME_LEN: usize = 200;

/// Strip directories and replace anything outside `[A-Za-z0-9._-]` with `_`.
///
/// Runs of dots collapse to one and leading dots are removed, so the result
/// never contains `..` and is never a hidden file. An empty result becomes
/// `file`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            c
        } else {
            '_'
        };
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        cleaned.push(c);
    }

    let trimmed = cleaned.trim_start_matches('.');
    let truncated: String = trimmed.chars().take(MAX_FILE_NAME_LEN).collect();

    if truncated.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        truncated
    }
}

/// Build the object key for a sanitized file name.
pub fn object_key(category: IssueCategory, report_id: Uuid, sanitized_file_name: &str) -> String {
    format!("{}/{}/{}", category.as_str(), report_id, sanitized_file_name)
}

/// Per-request hash to key association.
///
/// Built once per attach request so the upload step resolves each file's
/// staging key without deriving it again.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    keys: HashMap<ContentHash, String>,
    entries: Vec<FileKey>,
}

impl KeyMap {
    pub fn build(category: IssueCategory, report_id: Uuid, files: &[UploadedFile]) -> Self {
        let mut map = KeyMap::default();
        for file in files {
            let file_name = sanitize_file_name(&file.file_name);
            let key = object_key(category, report_id, &file_name);
            map.keys.insert(file.hash.clone(), key.clone());
            map.entries.push(FileKey {
                key,
                hash: file.hash.clone(),
                file_name,
            });
        }
        map
    }

    pub fn resolve(&self, hash: &ContentHash) -> Option<&str> {
        self.keys.get(hash).map(String::as_str)
    }

    /// Mapped files in input order.
    pub fn entries(&self) -> &[FileKey] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
