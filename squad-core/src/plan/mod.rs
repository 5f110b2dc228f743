mod models;
mod planner;
mod search;
pub mod selection;
mod validation;

pub use models::{HorizonPlan, PeriodSquad, PlanDocument};
pub use planner::{HorizonPlanner, HorizonRequest};
pub use search::{GenerationStats, SearchConfig, SearchOutcome, SequenceSearch};
pub use validation::{audit_plan, verify_plan, PlanAuditFinding, PlanAuditKind};
