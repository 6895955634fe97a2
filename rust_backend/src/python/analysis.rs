use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

use crate::config::AnalysisConfig;
use crate::services::{AgreementAnalyzer, PeakHoursPipeline};

/// Run the peak-hour analysis on a demand CSV file
///
/// Args:
///     csv_path: Path to an order-level or hourly demand CSV file
///     config_path: Optional TOML configuration; defaults are used when omitted
///
/// Returns:
///     str: JSON document with the keys peak_hours_analysis, overlap_analysis
///          and peak_hours_summary
///
/// Example:
///     >>> import json, shiftsync_peaks
///     >>> result = json.loads(shiftsync_peaks.analyze_csv("orders.csv"))
///     >>> len(result["peak_hours_summary"])
#[pyfunction]
#[pyo3(signature = (csv_path, config_path=None))]
pub fn analyze_csv(csv_path: &str, config_path: Option<&str>) -> PyResult<String> {
    let config = match config_path {
        Some(path) => AnalysisConfig::from_file(path)
            .map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e)))?,
        None => AnalysisConfig::default(),
    };

    let pipeline = PeakHoursPipeline::new(config)
        .map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e)))?;
    let run = pipeline
        .run_csv(&PathBuf::from(csv_path))
        .map_err(|e| PyRuntimeError::new_err(format!("Analysis failed: {:#}", e)))?;

    run.output
        .to_json()
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to serialize output: {}", e)))
}

/// Overlap category of three peak votes
///
/// Args:
///     kmeans: k-means vote
///     gmm: Gaussian mixture vote
///     agglo: agglomerative vote
///
/// Returns:
///     str: "High", "Medium", "Low" or "None"
#[pyfunction]
pub fn overlap_category(kmeans: bool, gmm: bool, agglo: bool) -> &'static str {
    AgreementAnalyzer::overlap_category(kmeans, gmm, agglo).as_str()
}
