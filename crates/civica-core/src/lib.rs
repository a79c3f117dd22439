//! Civica Core Library
//!
//! Domain models, error types and configuration shared by every component of
//! the report picture pipeline.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PictureServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::{Bucket, StorageBackend};
