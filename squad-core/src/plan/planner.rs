use std::sync::Arc;

use rand::RngCore;
use tracing::{debug, info};

use crate::squad::{
    Objective, Squad, SquadError, SquadOptimizer, SquadResult, SquadRules, TransferLimit,
};
use crate::store::PlayerStore;

use super::models::HorizonPlan;
use super::selection::reborrow;

#[derive(Debug, Clone)]
pub struct HorizonRequest {
    pub periods: Vec<String>,
    pub starting_squad: Option<Squad>,
    pub objective: Objective,
    pub max_substitutions: usize,
}

impl HorizonRequest {
    pub fn new(periods: Vec<String>) -> Self {
        Self {
            periods,
            starting_squad: None,
            objective: Objective::default(),
            max_substitutions: 3,
        }
    }

    pub fn with_starting_squad(mut self, squad: Squad) -> Self {
        self.starting_squad = Some(squad);
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_max_substitutions(mut self, value: usize) -> Self {
        self.max_substitutions = value;
        self
    }
}

/// Runs the optimizer period after period, each pick limited to
/// `max_substitutions` newcomers relative to the previous squad.
#[derive(Clone)]
pub struct HorizonPlanner {
    store: Arc<dyn PlayerStore>,
    optimizer: SquadOptimizer,
    rules: SquadRules,
}

impl HorizonPlanner {
    pub fn new(store: Arc<dyn PlayerStore>, optimizer: SquadOptimizer, rules: SquadRules) -> Self {
        Self {
            store,
            optimizer,
            rules,
        }
    }

    pub fn rules(&self) -> &SquadRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn PlayerStore> {
        &self.store
    }

    pub fn plan_horizon(&self, request: &HorizonRequest) -> SquadResult<HorizonPlan> {
        self.plan_horizon_with(request, None)
    }

    /// Builds the whole plan or nothing. With an `rng` every period's pool
    /// is shuffled before solving.
    pub fn plan_horizon_with(
        &self,
        request: &HorizonRequest,
        mut rng: Option<&mut dyn RngCore>,
    ) -> SquadResult<HorizonPlan> {
        let Some((first, rest)) = request.periods.split_first() else {
            return Err(SquadError::EmptyHorizon);
        };

        let opening = match &request.starting_squad {
            Some(squad) => self.remap_starting_squad(first, squad)?,
            None => self.pick_period(
                first,
                &request.objective,
                &self.rules,
                None,
                reborrow(&mut rng),
            )?,
        };
        let mut prefix = HorizonPlan::new();
        prefix.push(first.clone(), opening);

        let plan = self.extend(
            prefix,
            rest,
            &request.objective,
            request.max_substitutions,
            rng,
        )?;
        info!(
            target: "planner",
            periods = plan.len(),
            objective = %request.objective,
            total_points = plan.total_points(),
            "horizon planned"
        );
        Ok(plan)
    }

    /// Appends one optimized squad per period in `periods`, each chained to
    /// the last squad of `prefix`.
    pub fn extend(
        &self,
        mut prefix: HorizonPlan,
        periods: &[String],
        objective: &Objective,
        max_substitutions: usize,
        mut rng: Option<&mut dyn RngCore>,
    ) -> SquadResult<HorizonPlan> {
        for period in periods {
            let previous = prefix
                .last()
                .map(|entry| TransferLimit::new(&entry.squad, max_substitutions));
            let squad = self.pick_period(
                period,
                objective,
                &self.rules,
                previous.as_ref(),
                reborrow(&mut rng),
            )?;
            if let Some(entry) = prefix.last() {
                debug!(
                    target: "planner",
                    period = %period,
                    transfers = squad.transfers_from(&entry.squad).count(),
                    points = squad.total_points(),
                    "period extended"
                );
            }
            prefix.push(period.clone(), squad);
        }
        Ok(prefix)
    }

    /// One period's selection. Pool infeasibility is reported against the
    /// period.
    pub fn pick_period(
        &self,
        period: &str,
        objective: &Objective,
        rules: &SquadRules,
        limit: Option<&TransferLimit>,
        rng: Option<&mut dyn RngCore>,
    ) -> SquadResult<Squad> {
        let pool = self.store.get_players_by_fixture(period)?;
        self.optimizer
            .select(&pool, objective, rules, limit, rng)
            .map_err(|err| match err {
                SquadError::InfeasiblePool { reason } => SquadError::InfeasibleHorizon {
                    period: period.to_string(),
                    reason,
                },
                other => other,
            })
    }

    /// The supplied squad with each player's points replaced by `period`'s.
    pub fn remap_starting_squad(&self, period: &str, squad: &Squad) -> SquadResult<Squad> {
        let names: Vec<String> = squad.players().iter().map(|p| p.name.clone()).collect();
        let players = self.store.get_players_by_fixture_names(period, &names)?;
        if let Some(violation) = self.rules.check(&players).first() {
            return Err(SquadError::InfeasibleHorizon {
                period: period.to_string(),
                reason: format!("starting squad is illegal: {violation}"),
            });
        }
        Ok(Squad::new(players))
    }
}
