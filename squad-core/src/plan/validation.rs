use serde::{Deserialize, Serialize};

use crate::squad::SquadRules;

use super::models::HorizonPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAuditKind {
    TransferCap,
    SquadRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAuditFinding {
    pub period: String,
    pub kind: PlanAuditKind,
    pub note: String,
}

/// Flags every consecutive pair whose roster delta exceeds the cap.
pub fn verify_plan(plan: &HorizonPlan, max_substitutions: usize) -> Vec<PlanAuditFinding> {
    plan.transfers()
        .into_iter()
        .filter(|(_, transfers)| transfers.count() > max_substitutions)
        .map(|(period, transfers)| PlanAuditFinding {
            period,
            kind: PlanAuditKind::TransferCap,
            note: format!(
                "{} transfers in ({}), cap is {max_substitutions}",
                transfers.count(),
                transfers.ins.join(", ")
            ),
        })
        .collect()
}

/// [`verify_plan`] plus a legality check of every period's squad.
pub fn audit_plan(
    plan: &HorizonPlan,
    rules: &SquadRules,
    max_substitutions: usize,
) -> Vec<PlanAuditFinding> {
    let mut findings = Vec::new();
    for entry in plan.entries() {
        for violation in rules.check(entry.squad.players()) {
            findings.push(PlanAuditFinding {
                period: entry.period.clone(),
                kind: PlanAuditKind::SquadRule,
                note: violation.to_string(),
            });
        }
    }
    findings.extend(verify_plan(plan, max_substitutions));
    findings
}
