//! Peak-hour detection for restaurant venues.
//!
//! Order volume is aggregated into one normalized 24-hour demand profile per venue,
//! clustered independently by k-means, a Gaussian mixture and agglomerative
//! clustering, and the hours on which the methods agree are published as three
//! relations: `peak_hours_analysis`, `overlap_analysis` and `peak_hours_summary`.
//!
//! # Modules
//!
//! - [`core`]: Domain records and error types
//! - [`config`]: TOML analysis configuration
//! - [`parsing`]: CSV input parsing
//! - [`preprocessing`]: Demand matrix construction and normalization
//! - [`algorithms`]: Clustering strategies
//! - [`services`]: Cluster engine, agreement analysis, result assembly, pipeline
//! - [`db`]: Result repositories
//! - [`io`]: File export

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod algorithms;
pub mod config;
pub mod core;
pub mod db;
pub mod io;
pub mod parsing;
pub mod preprocessing;
pub mod services;

#[cfg(feature = "python")]
pub mod python;

/// Peak-hour analysis bindings
#[cfg(feature = "python")]
#[pymodule]
fn shiftsync_peaks(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(python::analyze_csv, m)?)?;
    m.add_function(wrap_pyfunction!(python::overlap_category, m)?)?;
    Ok(())
}
