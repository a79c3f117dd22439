use crate::traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use crate::{Bucket, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use civica_core::models::ObjectMetadata;
use object_store::aws::{AmazonS3, AmazonS3Builder, S3ConditionalPut};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutMode, PutOptions,
    PutPayload,
    Result as ObjectResult,
};
use std::borrow::Cow;

/// S3 storage implementation backed by two buckets.
#[derive(Clone)]
pub struct S3Storage {
    staging: AmazonS3,
    verified: AmazonS3,
    staging_bucket: String,
    verified_bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `staging_bucket` - Bucket receiving fresh uploads
    /// * `verified_bucket` - Bucket holding promoted pictures
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        staging_bucket: String,
        verified_bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let staging = Self::build_store(&staging_bucket, &region, endpoint_url.as_deref())?;
        let verified = Self::build_store(&verified_bucket, &region, endpoint_url.as_deref())?;

        Ok(S3Storage {
            staging,
            verified,
            staging_bucket,
            verified_bucket,
            region,
            endpoint_url,
        })
    }

    fn build_store(bucket: &str, region: &str, endpoint: Option<&str>) -> StorageResult<AmazonS3> {
        // Credentials come from the environment; bucket and region are explicit.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket)
            .with_conditional_put(S3ConditionalPut::ETagMatch);

        if let Some(endpoint) = endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }

    fn store(&self, bucket: Bucket) -> &AmazonS3 {
        match bucket {
            Bucket::Staging => &self.staging,
            Bucket::Verified => &self.verified,
        }
    }

    fn attributes(content_type: &str, metadata: &ObjectMetadata) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        for (name, value) in metadata {
            attributes.insert(
                Attribute::Metadata(Cow::Owned(name.clone())),
                AttributeValue::from(value.clone()),
            );
        }
        attributes
    }

    fn info_from_attributes(attributes: &Attributes, size: u64) -> ObjectInfo {
        let mut info = ObjectInfo {
            size,
            ..Default::default()
        };
        for (attribute, value) in attributes {
            let value: &str = value;
            match attribute {
                Attribute::ContentType => info.content_type = Some(value.to_string()),
                Attribute::Metadata(name) => {
                    info.metadata.insert(name.to_string(), value.to_string());
                }
                _ => {}
            }
        }
        info
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let bucket_name = self.bucket_name(bucket);
        let start = std::time::Instant::now();

        let mut opts = PutOptions::default();
        opts.mode = PutMode::Create;
        opts.attributes = Self::attributes(content_type, metadata);

        let result: ObjectResult<_> = self
            .store(bucket)
            .put_opts(&location, PutPayload::from(data), opts)
            .await;

        result.map_err(|e| {
            if let ObjectStoreError::AlreadyExists { .. } = e {
                tracing::warn!(bucket = %bucket_name, key = %key, "S3 key already taken");
                return StorageError::AlreadyExists(key.to_string());
            }
            tracing::error!(
                error = %e,
                bucket = %bucket_name,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket_name,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());
        let bucket_name = self.bucket_name(bucket);

        let result: ObjectResult<_> = self.store(bucket).delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket_name,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %bucket_name,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn copy_to(&self, from: Bucket, to: Bucket, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        // Buckets are separate stores, so the copy is a read followed by a
        // write that carries the source attributes over.
        let source: ObjectResult<_> = self.store(from).get(&location).await;
        let source = source.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::CopyFailed(other.to_string()),
        })?;

        let attributes = source.attributes.clone();
        let data = source
            .bytes()
            .await
            .map_err(|e| StorageError::CopyFailed(e.to_string()))?;

        let mut opts = PutOptions::default();
        opts.attributes = attributes;

        let result: ObjectResult<_> = self
            .store(to)
            .put_opts(&location, PutPayload::from(data), opts)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                from_bucket = %self.bucket_name(from),
                to_bucket = %self.bucket_name(to),
                key = %key,
                "S3 copy failed"
            );
            StorageError::CopyFailed(e.to_string())
        })?;

        tracing::info!(
            from_bucket = %self.bucket_name(from),
            to_bucket = %self.bucket_name(to),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 copy successful"
        );

        Ok(())
    }

    async fn get_metadata(&self, bucket: Bucket, key: &str) -> StorageResult<ObjectInfo> {
        let location = Path::from(key.to_string());

        // HEAD does not surface user metadata, so this issues a GET and drops the body.
        let result: ObjectResult<_> = self.store(bucket).get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket_name(bucket),
                    key = %key,
                    "S3 metadata read failed"
                );
                StorageError::BackendError(other.to_string())
            }
        })?;

        Ok(Self::info_from_attributes(
            &result.attributes,
            result.meta.size as u64,
        ))
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool> {
        let location = Path::from(key.to_string());
        match self.store(bucket).head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    /// For AWS S3: `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
    /// For S3-compatible providers, path-style under the endpoint.
    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        public_url(
            self.bucket_name(bucket),
            &self.region,
            self.endpoint_url.as_deref(),
            key,
        )
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Staging => &self.staging_bucket,
            Bucket::Verified => &self.verified_bucket,
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

fn public_url(bucket: &str, region: &str, endpoint: Option<&str>, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_urls_are_virtual_hosted() {
        assert_eq!(
            public_url("civica-verified", "us-east-1", None, "potholes/r/a.png"),
            "https://civica-verified.s3.us-east-1.amazonaws.com/potholes/r/a.png"
        );
    }

    #[test]
    fn endpoint_urls_are_path_style() {
        assert_eq!(
            public_url(
                "civica-verified",
                "us-east-1",
                Some("http://localhost:9000/"),
                "potholes/r/a.png"
            ),
            "http://localhost:9000/civica-verified/potholes/r/a.png"
        );
    }

    #[test]
    fn attributes_round_trip_into_object_info() {
        let mut metadata = ObjectMetadata::new();
        metadata.insert("severity".to_string(), "high".to_string());
        metadata.insert("issueCategory".to_string(), "potholes".to_string());

        let attributes = S3Storage::attributes("image/png", &metadata);
        let info = S3Storage::info_from_attributes(&attributes, 42);

        assert_eq!(info.content_type.as_deref(), Some("image/png"));
        assert_eq!(info.size, 42);
        assert_eq!(info.metadata, metadata);
    }
}
