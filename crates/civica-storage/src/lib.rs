//! Civica Storage Library
//!
//! Object store client for report pictures. Objects live in one of two
//! logical buckets: `staging` for fresh uploads and `verified` for pictures
//! accepted by the classifier.
//!
//! # Object key format
//!
//! Every backend uses the same key layout: `{issueCategory}/{reportId}/{fileName}`,
//! with the file name sanitized by the `keys` module. Keys must not contain
//! `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use civica_core::{Bucket, StorageBackend};
pub use factory::create_storage;
pub use keys::{object_key, sanitize_file_name, KeyMap};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
