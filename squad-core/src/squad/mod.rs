mod enumerator;
mod error;
mod models;
mod optimizer;
mod rules;

pub use enumerator::SquadEnumerator;
pub use error::{SquadError, SquadResult};
pub use models::{Objective, ObjectiveKey, Squad, TransferLimit, Transfers};
pub use optimizer::{IlpSolver, SquadOptimizer, SquadSolver};
pub use rules::{PositionBounds, RuleViolation, SquadRules};
