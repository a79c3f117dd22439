use bytes::Bytes;
use civica_core::models::{ContentHash, UploadedFile};
use sha2::{Digest, Sha256};

/// SHA-256 of the file bytes, hex encoded. Used as the picture id.
pub fn content_hash(data: &[u8]) -> ContentHash {
    let digest = Sha256::digest(data);
    ContentHash::from_digest(&digest)
}

/// Wrap a received file with its content identity.
pub fn identify_file(
    file_name: impl Into<String>,
    mime_type: impl Into<String>,
    data: Bytes,
) -> UploadedFile {
    let hash = content_hash(&data);
    UploadedFile {
        file_name: file_name.into(),
        mime_type: mime_type.into(),
        data,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_share_identity() {
        let a = identify_file("a.png", "image/png", Bytes::from_static(b"same bytes"));
        let b = identify_file("b.jpg", "image/jpeg", Bytes::from_static(b"same bytes"));
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn hash_is_lowercase_sha256_hex() {
        assert_eq!(
            content_hash(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }
}
