//! Parsers for order-volume input files.
//!
//! This module translates the cleansed tabular input into the boundary records the
//! demand matrix builder consumes.
//!
//! # Parsers
//!
//! - [`csv_parser`]: Parse per-order or pre-aggregated hourly CSV files
//!
//! # Example
//!
//! ```no_run
//! use shiftsync_peaks::parsing::csv_parser::parse_demand_csv;
//! use std::path::Path;
//!
//! let input = parse_demand_csv(Path::new("orders.csv"))
//!     .expect("Failed to parse orders");
//! println!("{} rows, {} rejected", input.len(), input.invalid_rows.len());
//! ```

pub mod csv_parser;


pub use csv_parser::{
    parse_demand_csv, parse_demand_csv_reader, parse_timestamp, DemandInput, InvalidRow,
    ParsedDemand,
};
