use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::services::AnalysisOutput;

/// Relation names, also used as file stems.
pub const PEAK_HOURS_ANALYSIS: &str = "peak_hours_analysis";
pub const OVERLAP_ANALYSIS: &str = "overlap_analysis";
pub const PEAK_HOURS_SUMMARY: &str = "peak_hours_summary";

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One `<relation>.csv` file per relation
    Csv,
    /// A single `peak_hours.json` document holding all three relations
    Json,
}

/// Writes analysis relations to files
pub struct ResultExporter;

impl ResultExporter {
    /// Write `output` into `dir` in the given format, creating the directory if needed.
    ///
    /// Existing files are overwritten. Returns the paths written.
    pub fn export(
        output: &AnalysisOutput,
        dir: &Path,
        format: ExportFormat,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        match format {
            ExportFormat::Csv => Self::export_csv(output, dir),
            ExportFormat::Json => Self::export_json(output, dir).map(|path| vec![path]),
        }
    }

    /// Write the three relations as CSV files
    pub fn export_csv(output: &AnalysisOutput, dir: &Path) -> Result<Vec<PathBuf>> {
        let analysis = dir.join(format!("{}.csv", PEAK_HOURS_ANALYSIS));
        write_csv(&analysis, &output.peak_hours_analysis)?;

        let overlap = dir.join(format!("{}.csv", OVERLAP_ANALYSIS));
        write_csv(&overlap, &output.overlap_analysis)?;

        let summary = dir.join(format!("{}.csv", PEAK_HOURS_SUMMARY));
        write_csv(&summary, &output.peak_hours_summary)?;

        Ok(vec![analysis, overlap, summary])
    }

    /// Write the three relations as one pretty-printed JSON document
    pub fn export_json(output: &AnalysisOutput, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("peak_hours.json");
        let json = serde_json::to_string_pretty(output).context("Failed to serialize output")?;
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Serialize rows to a CSV file with a header row.
///
/// `csv::Writer` only emits headers once it sees a record, so an empty relation
/// still gets its file but no header line.
fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (i, row) in rows.iter().enumerate() {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row {} of {}", i + 1, path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
