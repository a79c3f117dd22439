//! Civica Services Layer
//!
//! This crate is the **business service layer** of the picture pipeline. It
//! coordinates the metadata repository and the object store: attaching
//! uploads to a report, promoting verified pictures between storage tiers
//! and guarding detach. Callers depend on this crate as a single facade.

pub mod pictures;
pub mod promotion;
pub mod upload;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use civica_db::{PictureRepositoryTrait, ReportRepositoryTrait};
pub use civica_processing::{identify_file, PictureValidator, ValidationError};
pub use civica_storage::{create_storage, Bucket, ObjectInfo, ObjectStorage, StorageError};
pub use pictures::{
    AttachOutcome, AttachRequest, AttachService, DetachGuard, DetachOutcome,
    PictureQueryService, VerificationService,
};
pub use promotion::{PromotedUrls, VerificationPromoter};
pub use upload::UploadOrchestrator;
