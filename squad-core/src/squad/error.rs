use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SquadError {
    #[error("player pool cannot form a legal squad: {reason}")]
    InfeasiblePool { reason: String },
    #[error("horizon infeasible at period {period}: {reason}")]
    InfeasibleHorizon { period: String, reason: String },
    #[error("solver failure: {0}")]
    Solver(String),
    #[error("horizon has no periods")]
    EmptyHorizon,
    #[error("invalid squad rules: {0}")]
    InvalidRules(String),
    #[error("invalid search configuration: {0}")]
    InvalidSearch(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SquadError {
    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        Self::InfeasiblePool {
            reason: reason.into(),
        }
    }

    /// Whether a search may drop the candidate that produced this error and
    /// carry on.
    pub fn is_candidate_failure(&self) -> bool {
        !matches!(
            self,
            SquadError::Store(_)
                | SquadError::InvalidRules(_)
                | SquadError::InvalidSearch(_)
                | SquadError::EmptyHorizon
        )
    }
}

pub type SquadResult<T> = std::result::Result<T, SquadError>;
