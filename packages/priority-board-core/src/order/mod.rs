pub mod column_index;
pub mod key;
pub mod planner;
pub mod renormalize;

pub use planner::{MovePlan, PlanOutcome};
pub use renormalize::RenormalizePolicy;
