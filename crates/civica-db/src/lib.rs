//! Civica Database Library
//!
//! Postgres repositories for report pictures and the report lookup the
//! picture pipeline depends on.

pub mod db;

pub use db::*;
