//! Python bindings for the peak-hour analysis.
//!
//! This module exposes the pipeline to Python via PyO3. It is compiled only with
//! the `python` feature.
//!
//! # Python API
//!
//! All functions are available in the `shiftsync_peaks` Python module after
//! installation:
//!
//! - `analyze_csv(csv_path, config_path=None)`: run the analysis, get JSON back
//! - `overlap_category(kmeans, gmm, agglo)`: category of three peak votes

pub mod analysis;

pub use analysis::*;
