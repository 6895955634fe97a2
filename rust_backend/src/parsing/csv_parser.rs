use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use std::io::Read;
use std::path::Path;

use crate::core::domain::{HourlyOrderCount, OrderRecord, VenueId};
use crate::core::error::AnalysisError;

const VENUE_COLUMNS: [&str; 4] = ["venue_id", "venue", "venue_xref_id", "concept"];
const COUNT_COLUMNS: [&str; 2] = ["order_count", "normalized_order_count"];

/// Rows read from a demand CSV, in one of the two supported layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum DemandInput {
    /// One row per order (or order batch) with a timestamp.
    Orders(Vec<OrderRecord>),
    /// One row per venue and hour of day with an order count.
    Hourly(Vec<HourlyOrderCount>),
}

impl DemandInput {
    pub fn len(&self) -> usize {
        match self {
            DemandInput::Orders(rows) => rows.len(),
            DemandInput::Hourly(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A data row that could not be parsed, attributed to its venue.
///
/// Only the owning venue is excluded from the run; the rest of the file is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRow {
    pub venue: VenueId,
    pub line: u64,
    pub reason: String,
}

impl InvalidRow {
    pub fn to_error(&self) -> AnalysisError {
        AnalysisError::InvalidRecord {
            venue: self.venue.clone(),
            reason: format!("line {}: {}", self.line, self.reason),
        }
    }
}

/// Parsed demand file: the readable rows plus the rows rejected per venue.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDemand {
    pub input: DemandInput,
    pub invalid_rows: Vec<InvalidRow>,
}

impl ParsedDemand {
    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// Parse a demand CSV file.
///
/// The layout is detected from the header row: a `timestamp` column selects the
/// per-order layout, an `hour` column the pre-aggregated one. Missing columns and
/// unreadable CSV fail the whole file; a bad value only rejects its row.
pub fn parse_demand_csv(csv_path: &Path) -> Result<ParsedDemand> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    parse_demand_csv_reader(file)
        .with_context(|| format!("Failed to parse CSV file {}", csv_path.display()))
}

/// Parse demand rows from any reader producing CSV text with a header row.
pub fn parse_demand_csv_reader<R: Read>(reader: R) -> Result<ParsedDemand> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let find = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
    };

    let venue_idx = find(&VENUE_COLUMNS).context("Missing venue column (venue_id)")?;
    let count_idx = find(&COUNT_COLUMNS);
    let mut invalid_rows = Vec::new();

    if let Some(ts_idx) = find(&["timestamp", "order_seated_at_local"]) {
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("Failed to read CSV record")?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let venue = VenueId::new(field(&record, venue_idx, line, "venue_id")?);

            let parsed = field(&record, ts_idx, line, "timestamp")
                .and_then(parse_timestamp)
                .and_then(|timestamp| {
                    let order_count = match count_idx {
                        Some(idx) => parse_count(field(&record, idx, line, "order_count")?)?,
                        None => 1.0,
                    };
                    Ok((timestamp, order_count))
                });

            match parsed {
                Ok((timestamp, order_count)) => rows.push(OrderRecord {
                    venue,
                    timestamp,
                    order_count,
                }),
                Err(err) => invalid_rows.push(reject(venue, line, err)),
            }
        }
        return Ok(ParsedDemand {
            input: DemandInput::Orders(rows),
            invalid_rows,
        });
    }

    if let Some(hour_idx) = find(&["hour"]) {
        let count_idx = count_idx.context("Missing order_count column")?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("Failed to read CSV record")?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let venue = VenueId::new(field(&record, venue_idx, line, "venue_id")?);

            let parsed = field(&record, hour_idx, line, "hour")
                .and_then(|value| {
                    value
                        .parse::<u32>()
                        .with_context(|| format!("invalid hour '{}'", value))
                })
                .and_then(|hour| {
                    let order_count = parse_count(field(&record, count_idx, line, "order_count")?)?;
                    Ok((hour, order_count))
                });

            match parsed {
                Ok((hour, order_count)) => rows.push(HourlyOrderCount {
                    venue,
                    hour,
                    order_count,
                }),
                Err(err) => invalid_rows.push(reject(venue, line, err)),
            }
        }
        return Ok(ParsedDemand {
            input: DemandInput::Hourly(rows),
            invalid_rows,
        });
    }

    bail!("CSV needs either a timestamp column or an hour column")
}

/// Parse an order timestamp.
///
/// Accepts `%Y-%m-%d %H:%M:%S`, the same with a `T` separator, and RFC 3339. Zoned
/// timestamps keep their local wall-clock time, since peak hours are local hours.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .with_context(|| format!("Unrecognized timestamp '{}'", value))
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, line: u64, name: &str) -> Result<&'r str> {
    record
        .get(idx)
        .with_context(|| format!("Missing {} at line {}", name, line))
}

fn parse_count(value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .with_context(|| format!("invalid order_count '{}'", value))
}

fn reject(venue: VenueId, line: u64, err: anyhow::Error) -> InvalidRow {
    log::warn!("Rejecting row at line {} for venue {}: {:#}", line, venue, err);
    InvalidRow {
        venue,
        line,
        reason: format!("{:#}", err),
    }
}
