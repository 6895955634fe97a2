//! Repository trait definitions for result persistence.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`peak_hours`]: Full-overwrite storage of the three analysis relations

pub mod error;
pub mod peak_hours;

pub use error::{RepositoryError, RepositoryResult};
pub use peak_hours::{validate_output, AnalysisRunMetadata, PeakHoursRepository};
