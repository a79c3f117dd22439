pub mod promoter;

pub use promoter::{PromotedUrls, VerificationPromoter};
