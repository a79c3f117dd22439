use civica_core::models::UploadedFile;
use civica_core::AppError;

use crate::mime_guard::MimeGuard;

/// Validation errors for uploaded pictures
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Declared content type {declared} does not match detected type {sniffed}")]
    MimeMismatch { declared: String, sniffed: String },

    #[error("File content does not match any known signature")]
    UnrecognizedSignature,

    #[error("Batch must contain between 1 and {max} files, got {count}")]
    InvalidBatchSize { count: usize, max: usize },

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Picture validator
///
/// Batch-level checks fail the whole request; file-level checks reject a
/// single file and let the rest of the batch through.
#[derive(Debug, Clone)]
pub struct PictureValidator {
    max_files_per_request: usize,
    max_file_size: usize,
    guard: MimeGuard,
}

impl PictureValidator {
    pub fn new(
        max_files_per_request: usize,
        max_file_size: usize,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_files_per_request,
            max_file_size,
            guard: MimeGuard::new(allowed_content_types),
        }
    }

    pub fn from_config(config: &civica_core::Config) -> Self {
        Self::new(
            config.max_files_per_request(),
            config.max_file_size_bytes(),
            config.allowed_content_types().to_vec(),
        )
    }

    pub fn max_files_per_request(&self) -> usize {
        self.max_files_per_request
    }

    /// Validate batch size
    pub fn validate_batch_size(&self, count: usize) -> Result<(), ValidationError> {
        if count == 0 || count > self.max_files_per_request {
            return Err(ValidationError::InvalidBatchSize {
                count,
                max: self.max_files_per_request,
            });
        }
        Ok(())
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate a single file: size, allow-list and byte signature.
    pub fn validate_file(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        self.validate_file_size(file.data.len())?;
        self.guard.check(&file.mime_type, &file.data).inspect_err(|err| {
            tracing::debug!(
                file_name = %file.file_name,
                hash = %file.hash,
                error = %err,
                "Picture rejected by MIME guard"
            );
        })
    }
}
