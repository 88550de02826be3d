//! Structural-causal core: movement cost, effect mechanism, ground truth and
//! agent best response

pub mod best_response;
pub mod cost;
pub mod labeler;
pub mod mechanism;

pub use best_response::{BestResponseSolver, SolverConfig};
pub use cost::CostModel;
pub use labeler::{GroundTruthLabeler, TrickyFeature};
pub use mechanism::StructuralMechanism;
