//! Configuration module
//!
//! Environment-driven configuration for the picture pipeline: metadata store
//! connection, the two storage tiers, upload limits and the acting identity.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILES_PER_REQUEST: usize = 6;
const MAX_FILE_SIZE_MB: usize = 10;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ACTING_USER_ID: &str = "e1903638-462f-4c03-8176-7bae51986e43";

/// Base configuration shared by every entry point
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub environment: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub log_format: String,
}

/// Picture pipeline configuration
#[derive(Clone, Debug)]
pub struct PictureServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub staging_bucket: Option<String>,
    pub verified_bucket: Option<String>,
    pub aws_region: String,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upload limits
    pub max_files_per_request: usize,
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    // Identity supplied by the external auth layer
    pub acting_user_id: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PictureServiceConfig>);

impl Config {
    fn as_service(&self) -> &PictureServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_service().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PictureServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_service().validate(self.is_production())
    }

    pub fn environment(&self) -> &str {
        &self.as_service().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.as_service().base.log_format
    }

    pub fn database_url(&self) -> &str {
        &self.as_service().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_service().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_service().base.db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_service().storage_backend
    }

    pub fn staging_bucket(&self) -> Option<&str> {
        self.as_service().staging_bucket.as_deref()
    }

    pub fn verified_bucket(&self) -> Option<&str> {
        self.as_service().verified_bucket.as_deref()
    }

    pub fn aws_region(&self) -> &str {
        &self.as_service().aws_region
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_service().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_service().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_service().local_storage_base_url.as_deref()
    }

    pub fn max_files_per_request(&self) -> usize {
        self.as_service().max_files_per_request
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.as_service().max_file_size_bytes
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.as_service().allowed_content_types
    }

    pub fn acting_user_id(&self) -> &str {
        &self.as_service().acting_user_id
    }
}

impl PictureServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            environment,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase(),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => s.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::S3,
        };

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let allowed_content_types = parse_list(
            &env::var("ALLOWED_CONTENT_TYPES").unwrap_or_else(|_| "image/*".to_string()),
        );

        Ok(PictureServiceConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            staging_bucket: env::var("FIRST_STAGE_BUCKET_NAME")
                .ok()
                .filter(|s| !s.is_empty()),
            verified_bucket: env::var("VERIFIED_IMAGES_BUCKET_NAME")
                .ok()
                .filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_DEFAULT_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_files_per_request: env::var("MAX_FILES_PER_REQUEST")
                .unwrap_or_else(|_| MAX_FILES_PER_REQUEST.to_string())
                .parse()
                .unwrap_or(MAX_FILES_PER_REQUEST),
            max_file_size_bytes: megabytes_to_bytes(max_file_size_mb),
            allowed_content_types,
            acting_user_id: env::var("ACTING_USER_ID")
                .unwrap_or_else(|_| DEFAULT_ACTING_USER_ID.to_string()),
        })
    }

    pub fn validate(&self, is_production: bool) -> Result<(), anyhow::Error> {
        if self.max_files_per_request == 0 || self.max_files_per_request > MAX_FILES_PER_REQUEST {
            return Err(anyhow::anyhow!(
                "MAX_FILES_PER_REQUEST must be between 1 and {}",
                MAX_FILES_PER_REQUEST
            ));
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                let staging = self.staging_bucket.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("FIRST_STAGE_BUCKET_NAME must be defined for the s3 backend")
                })?;
                let verified = self.verified_bucket.as_deref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "VERIFIED_IMAGES_BUCKET_NAME must be defined for the s3 backend"
                    )
                })?;
                if staging == verified {
                    return Err(anyhow::anyhow!(
                        "FIRST_STAGE_BUCKET_NAME and VERIFIED_IMAGES_BUCKET_NAME must differ"
                    ));
                }
            }
            StorageBackend::Local => {
                if is_production {
                    return Err(anyhow::anyhow!(
                        "The local storage backend cannot be used in production"
                    ));
                }
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set for the local backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Oversized values fall back to the default limit.
fn megabytes_to_bytes(mb: usize) -> usize {
    mb.checked_mul(1024 * 1024)
        .unwrap_or(MAX_FILE_SIZE_MB * 1024 * 1024)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
