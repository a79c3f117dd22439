//! Database repositories for data access layer
//!
//! Each repository is exposed as a trait so services can run against an
//! in-memory double, with a single Postgres implementation used in production.
//
// Picture metadata repository
pub mod picture;
//
// Report lookup (read-only collaborator)
pub mod report;
//
// Pool setup and migrations
pub mod setup;

pub use picture::{
    PictureRepositoryTrait, PostgresPictureRepository,
    PostgresPictureRepository as PictureRepository,
};
pub use report::{
    PostgresReportRepository, PostgresReportRepository as ReportRepository, ReportRepositoryTrait,
};
pub use setup::setup_database;
