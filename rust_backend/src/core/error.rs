//! Error types for demand building and clustering.

use crate::core::domain::{MethodId, VenueId};

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Failure of a single clustering strategy on one demand vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusteringError {
    #[error("did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("all hours collapsed into a single cluster")]
    Collapsed,

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

/// Error type for the peak-hour analysis.
///
/// Builder errors (`IncompleteData`, `DegenerateVenue`, `InvalidRecord`) exclude a
/// venue from every output relation. `Convergence` only marks one method as
/// unavailable for one venue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Incomplete data for venue {venue}: {hours_present} of 24 hours present")]
    IncompleteData { venue: VenueId, hours_present: usize },

    #[error("Degenerate demand for venue {venue}: {reason}")]
    DegenerateVenue { venue: VenueId, reason: String },

    #[error("Invalid record for venue {venue}: {reason}")]
    InvalidRecord { venue: VenueId, reason: String },

    #[error("Method {method} failed for venue {venue}: {source}")]
    Convergence {
        venue: VenueId,
        method: MethodId,
        #[source]
        source: ClusteringError,
    },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// Venue the error belongs to, if any.
    pub fn venue(&self) -> Option<&VenueId> {
        match self {
            AnalysisError::IncompleteData { venue, .. }
            | AnalysisError::DegenerateVenue { venue, .. }
            | AnalysisError::InvalidRecord { venue, .. }
            | AnalysisError::Convergence { venue, .. } => Some(venue),
            AnalysisError::InvalidConfig(_) => None,
        }
    }

    /// Short machine-readable kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::IncompleteData { .. } => "incomplete_data",
            AnalysisError::DegenerateVenue { .. } => "degenerate_venue",
            AnalysisError::InvalidRecord { .. } => "invalid_record",
            AnalysisError::Convergence { .. } => "convergence",
            AnalysisError::InvalidConfig(_) => "invalid_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_convergence_error_keeps_source() {
        let err = AnalysisError::Convergence {
            venue: VenueId::new("v1"),
            method: MethodId::Gmm,
            source: ClusteringError::NotConverged { iterations: 5 },
        };
        assert_eq!(err.kind(), "convergence");
        assert_eq!(err.venue(), Some(&VenueId::new("v1")));
        assert!(err.to_string().contains("gmm"));
        assert!(err.source().is_some());
    }
}
