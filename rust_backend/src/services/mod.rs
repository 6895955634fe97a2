//! Service layer for the peak-hour analysis.
//!
//! This module sits between the demand builder and the output repositories. It
//! fans the clustering strategies out over venues, measures how far they agree,
//! and shapes the results into the published relations.
//!
//! - [`cluster_engine`]: one task per (venue, method), sequential or on rayon
//! - [`agreement`]: vote counting and overlap categories
//! - [`assembler`]: output relations and the per-venue run report
//! - [`pipeline`]: end-to-end runs from records, matrices or CSV files

pub mod agreement;
pub mod assembler;
pub mod cluster_engine;
pub mod pipeline;

pub use agreement::{AgreementAnalyzer, HourVotes};
pub use assembler::{AnalysisOutput, MethodFailure, ResultAssembler, RunReport, VenueOutcome};
pub use cluster_engine::{task_seed, ClusterEngine, EngineOutput, TaskKey};
pub use pipeline::{AnalysisRun, PeakHoursPipeline};
