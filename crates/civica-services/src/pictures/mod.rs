//! Picture lifecycle flows over a report: attach, verify, detach and reads.

pub mod attach;
pub mod detach;
pub mod queries;
pub mod verification;

pub use attach::{AttachOutcome, AttachRequest, AttachService};
pub use detach::{DetachGuard, DetachOutcome};
pub use queries::PictureQueryService;
pub use verification::VerificationService;
