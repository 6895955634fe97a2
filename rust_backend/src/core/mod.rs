//! Core domain models and error types.
//!
//! This module defines the data structures shared by every pipeline stage and the
//! error taxonomy used to report per-venue and per-method failures.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{AnalysisError, AnalysisResult, ClusteringError};
