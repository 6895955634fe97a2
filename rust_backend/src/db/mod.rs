//! Storage of the published analysis relations.
//!
//! This module provides abstractions for persisting the three output relations via
//! the Repository pattern, allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (CLI, Python bindings)               │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Health check before writes                           │
//! │  - Checksum verification                                │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Trait (repository/) - Abstract Interface    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!          ┌──────────▼──────────────┐
//!          │  Local Repository       │
//!          │  (in-memory)            │
//!          └─────────────────────────┘
//! ```

pub mod checksum;
pub mod repositories;
pub mod repository;
pub mod services;

pub use checksum::calculate_checksum;
pub use repositories::LocalRepository;
pub use repository::{
    AnalysisRunMetadata, PeakHoursRepository, RepositoryError, RepositoryResult,
};
