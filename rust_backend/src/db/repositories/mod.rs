//! Repository implementations module.
//!
//! This module contains implementations of the `PeakHoursRepository` trait:
//! - `local`: In-memory implementation for unit testing, local development and the CLI

pub mod local;

pub use local::LocalRepository;
