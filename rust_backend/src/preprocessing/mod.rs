pub mod demand_matrix;
pub mod normalize;

pub use demand_matrix::{DemandMatrix, DemandMatrixBuilder};
pub use normalize::{check_variation, normalize_profile, DemandStats};
