//! File output of analysis results.
//!
//! This module writes the three published relations to disk, either as one CSV
//! file per relation or as a single JSON document.
//!
//! # Example
//!
//! ```no_run
//! use shiftsync_peaks::io::{ExportFormat, ResultExporter};
//! use shiftsync_peaks::services::AnalysisOutput;
//! use std::path::Path;
//!
//! let output = AnalysisOutput::default();
//! let written = ResultExporter::export(&output, Path::new("out"), ExportFormat::Csv)
//!     .expect("Failed to export");
//! println!("Wrote {} files", written.len());
//! ```

pub mod export;


pub use export::{ExportFormat, ResultExporter};
