use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::squad::{Squad, Transfers};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSquad {
    pub period: String,
    pub squad: Squad,
}

/// Ordered period → squad mapping, one entry per planned period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PlanDocument", from = "PlanDocument")]
pub struct HorizonPlan {
    entries: Vec<PeriodSquad>,
}

impl HorizonPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, period: impl Into<String>, squad: Squad) {
        self.entries.push(PeriodSquad {
            period: period.into(),
            squad,
        });
    }

    pub fn entries(&self) -> &[PeriodSquad] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn periods(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.period.as_str()).collect()
    }

    pub fn squad(&self, period: &str) -> Option<&Squad> {
        self.entries
            .iter()
            .find(|e| e.period == period)
            .map(|e| &e.squad)
    }

    pub fn last(&self) -> Option<&PeriodSquad> {
        self.entries.last()
    }

    /// Sum of every period's squad points. This is the plan's fitness,
    /// whatever objective picked the squads.
    pub fn total_points(&self) -> i64 {
        self.entries.iter().map(|e| e.squad.total_points()).sum()
    }

    /// Copy holding only the first `cut` periods.
    pub fn truncated(&self, cut: usize) -> Self {
        Self {
            entries: self.entries.iter().take(cut).cloned().collect(),
        }
    }

    /// Roster changes into each period after the first.
    pub fn transfers(&self) -> Vec<(String, Transfers)> {
        self.entries
            .windows(2)
            .map(|pair| {
                (
                    pair[1].period.clone(),
                    pair[1].squad.transfers_from(&pair[0].squad),
                )
            })
            .collect()
    }
}

/// On-disk form of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_points: i64,
    pub periods: Vec<PeriodSquad>,
}

impl From<HorizonPlan> for PlanDocument {
    fn from(plan: HorizonPlan) -> Self {
        Self {
            generated_at: Some(Utc::now()),
            total_points: plan.total_points(),
            periods: plan.entries,
        }
    }
}

impl From<PlanDocument> for HorizonPlan {
    fn from(document: PlanDocument) -> Self {
        Self {
            entries: document.periods,
        }
    }
}
