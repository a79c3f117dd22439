//! Test helpers for service unit tests
//!
//! In-memory implementations of the picture repository, the report lookup
//! and object storage, plus fixtures. No database or bucket is needed.

pub mod fixtures;
pub mod mock_repositories;
pub mod mock_storage;

pub use fixtures::*;
pub use mock_repositories::*;
pub use mock_storage::*;
