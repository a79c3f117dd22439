//! Mock object storage for testing
//!
//! Keeps objects in memory, records every call in order and fails on demand.

use async_trait::async_trait;
use bytes::Bytes;
use civica_core::models::ObjectMetadata;
use civica_core::StorageBackend;
use civica_storage::{Bucket, ObjectInfo, ObjectStorage, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Put { bucket: Bucket, key: String },
    Delete { bucket: Bucket, key: String },
    Copy { from: Bucket, to: Bucket, key: String },
    GetMetadata { bucket: Bucket, key: String },
    Exists { bucket: Bucket, key: String },
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    metadata: ObjectMetadata,
}

#[derive(Clone, Default)]
pub struct MockObjectStorage {
    objects: Arc<Mutex<HashMap<(Bucket, String), StoredObject>>>,
    calls: Arc<Mutex<Vec<StorageCall>>>,
    failing_puts: Arc<Mutex<HashSet<String>>>,
    failing_deletes: Arc<Mutex<HashSet<Bucket>>>,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `put` to this key.
    pub fn fail_put_for(&self, key: &str) {
        self.failing_puts.lock().unwrap().insert(key.to_string());
    }

    /// Fail every `delete` in this bucket.
    pub fn fail_delete_in(&self, bucket: Bucket) {
        self.failing_deletes.lock().unwrap().insert(bucket);
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn contains(&self, bucket: Bucket, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket, key.to_string()))
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        self.record(StorageCall::Put {
            bucket,
            key: key.to_string(),
        });
        if self.failing_puts.lock().unwrap().contains(key) {
            return Err(StorageError::UploadFailed(format!(
                "simulated 503 SlowDown for {}",
                key
            )));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&(bucket, key.to_string())) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(
            (bucket, key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        self.record(StorageCall::Delete {
            bucket,
            key: key.to_string(),
        });
        if self.failing_deletes.lock().unwrap().contains(&bucket) {
            return Err(StorageError::DeleteFailed(format!(
                "simulated delete failure for {}",
                key
            )));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket, key.to_string()));
        Ok(())
    }

    async fn copy_to(&self, from: Bucket, to: Bucket, key: &str) -> StorageResult<()> {
        self.record(StorageCall::Copy {
            from,
            to,
            key: key.to_string(),
        });
        let mut objects = self.objects.lock().unwrap();
        let source = objects
            .get(&(from, key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        objects.insert((to, key.to_string()), source);
        Ok(())
    }

    async fn get_metadata(&self, bucket: Bucket, key: &str) -> StorageResult<ObjectInfo> {
        self.record(StorageCall::GetMetadata {
            bucket,
            key: key.to_string(),
        });
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket, key.to_string()))
            .map(|object| ObjectInfo {
                content_type: Some(object.content_type.clone()),
                size: object.data.len() as u64,
                metadata: object.metadata.clone(),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool> {
        self.record(StorageCall::Exists {
            bucket,
            key: key.to_string(),
        });
        Ok(self.contains(bucket, key))
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("https://{}.objects.test/{}", self.bucket_name(bucket), key)
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Staging => "first-stage",
            Bucket::Verified => "verified",
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
