pub mod picture;
pub mod report;
pub mod upload;

pub use picture::*;
pub use report::*;
pub use upload::*;
