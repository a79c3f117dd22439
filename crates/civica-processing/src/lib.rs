//! Civica Processing Library
//!
//! Content identity and MIME checks applied to uploaded pictures before any
//! storage call is made.

pub mod identity;
pub mod mime_guard;
pub mod validator;

pub use identity::{content_hash, identify_file};
pub use mime_guard::MimeGuard;
pub use validator::{PictureValidator, ValidationError};
