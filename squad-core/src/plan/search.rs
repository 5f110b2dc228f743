use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SearchSection;
use crate::squad::{Objective, Squad, SquadError, SquadResult};

use super::models::HorizonPlan;
use super::planner::HorizonPlanner;
use super::selection::{derive_seed, jittered_budget, pick_partner, random_objective};
use super::validation::audit_plan;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_probability: f64,
    pub seed: u64,
    pub max_build_attempts: usize,
    pub budget_jitter: i64,
    pub max_substitutions: usize,
    /// Objective used to regenerate tails when no mutation happens.
    pub objective: Objective,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from_section(&SearchSection::default(), 3)
    }
}

impl SearchConfig {
    pub fn from_section(section: &SearchSection, max_substitutions: usize) -> Self {
        Self {
            population_size: section.population_size,
            generations: section.generations,
            mutation_probability: section.mutation_probability,
            seed: section.seed,
            max_build_attempts: section.max_build_attempts,
            budget_jitter: section.budget_jitter,
            max_substitutions,
            objective: Objective::default(),
        }
    }

    pub fn validate(&self) -> SquadResult<()> {
        let probability = self.mutation_probability;
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(SquadError::InvalidSearch(format!(
                "mutation probability {probability} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub population: usize,
    pub children: usize,
    pub best_fitness: i64,
    pub best_ever: i64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: HorizonPlan,
    pub best_fitness: i64,
    /// Entry 0 describes the initial population.
    pub history: Vec<GenerationStats>,
    /// Candidates dropped because a solve failed or the plan was illegal.
    pub discarded: usize,
}

/// Generational search over transfer-limited plans: keep the fitter half,
/// rebuild each survivor's tail from a random cut, repeat.
pub struct SequenceSearch {
    planner: HorizonPlanner,
    config: SearchConfig,
}

struct Candidate {
    plan: HorizonPlan,
    fitness: i64,
}

impl Candidate {
    fn new(plan: HorizonPlan) -> Self {
        let fitness = plan.total_points();
        Self { plan, fitness }
    }
}

impl SequenceSearch {
    pub fn new(planner: HorizonPlanner, config: SearchConfig) -> Self {
        Self { planner, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn search(&self, periods: &[String]) -> SquadResult<SearchOutcome> {
        self.config.validate()?;
        let Some(first) = periods.first() else {
            return Err(SquadError::EmptyHorizon);
        };
        let mut rng = ChaCha20Rng::seed_from_u64(derive_seed(self.config.seed, "search"));
        let mut discarded = 0;

        let mut population = Vec::with_capacity(self.config.population_size);
        for _ in 0..self.config.population_size {
            match self.build_random(periods, &mut rng) {
                Ok(plan) => population.push(Candidate::new(plan)),
                Err(err) if err.is_candidate_failure() => {
                    debug!(target: "search", error = %err, "initial candidate discarded");
                    discarded += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if population.is_empty() {
            return Err(SquadError::InfeasibleHorizon {
                period: first.clone(),
                reason: format!("no initial plan could be built ({discarded} attempts failed)"),
            });
        }
        sort_by_fitness(&mut population);

        let mut best = population[0].plan.clone();
        let mut best_fitness = population[0].fitness;
        let mut history = vec![GenerationStats {
            generation: 0,
            population: population.len(),
            children: 0,
            best_fitness,
            best_ever: best_fitness,
        }];
        info!(
            target: "search",
            population = population.len(),
            best_fitness,
            discarded,
            "initial population built"
        );

        for generation in 1..=self.config.generations {
            population.truncate((population.len() + 1) / 2);
            let fitness: Vec<i64> = population.iter().map(|c| c.fitness).collect();

            let mut children = Vec::with_capacity(population.len());
            for (index, parent) in population.iter().enumerate() {
                let outcome =
                    self.reproduce(periods, index, parent, &population, &fitness, &mut rng);
                let child = match outcome {
                    Ok(plan) => plan,
                    Err(err) if err.is_candidate_failure() => {
                        debug!(target: "search", generation, error = %err, "child discarded");
                        discarded += 1;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let findings =
                    audit_plan(&child, self.planner.rules(), self.config.max_substitutions);
                if findings.is_empty() {
                    children.push(Candidate::new(child));
                } else {
                    warn!(
                        target: "search",
                        generation,
                        findings = findings.len(),
                        "illegal child discarded"
                    );
                    discarded += 1;
                }
            }

            let child_count = children.len();
            population.extend(children);
            sort_by_fitness(&mut population);
            if population[0].fitness > best_fitness {
                best_fitness = population[0].fitness;
                best = population[0].plan.clone();
            }
            history.push(GenerationStats {
                generation,
                population: population.len(),
                children: child_count,
                best_fitness: population[0].fitness,
                best_ever: best_fitness,
            });
            info!(
                target: "search",
                generation,
                population = population.len(),
                children = child_count,
                generation_best = population[0].fitness,
                best_fitness,
                "generation complete"
            );
        }

        Ok(SearchOutcome {
            best,
            best_fitness,
            history,
            discarded,
        })
    }

    /// Random opening squad from a drawn objective and jittered budget, then
    /// extended across the remaining periods with the default objective.
    fn build_random(
        &self,
        periods: &[String],
        rng: &mut ChaCha20Rng,
    ) -> SquadResult<HorizonPlan> {
        let Some((first, rest)) = periods.split_first() else {
            return Err(SquadError::EmptyHorizon);
        };
        let opening = self.random_opening(first, rng)?;
        let mut prefix = HorizonPlan::new();
        prefix.push(first.clone(), opening);
        self.planner.extend(
            prefix,
            rest,
            &self.config.objective,
            self.config.max_substitutions,
            Some(&mut *rng as &mut dyn RngCore),
        )
    }

    fn random_opening(&self, period: &str, rng: &mut ChaCha20Rng) -> SquadResult<Squad> {
        let rules = self.planner.rules();
        let mut last_error = None;
        for _ in 0..self.config.max_build_attempts.max(1) {
            let objective = random_objective(rng);
            let budget =
                jittered_budget(rules.budget, self.config.budget_jitter, rules.min_budget, rng);
            let attempt_rules = rules.clone().with_budget(budget);
            match self.planner.pick_period(
                period,
                &objective,
                &attempt_rules,
                None,
                Some(&mut *rng as &mut dyn RngCore),
            ) {
                Ok(squad) => return Ok(squad),
                Err(err) if err.is_candidate_failure() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(SquadError::InfeasiblePool {
            reason: format!(
                "no randomized squad for {period} after {} attempts{}",
                self.config.max_build_attempts,
                last_error
                    .map(|err| format!(": {err}"))
                    .unwrap_or_default()
            ),
        })
    }

    /// One child: either the parent's head spliced onto a partner's tail, or
    /// the parent's head with a regenerated tail. Mutation regenerates with a
    /// random objective. The partner splice is the recombination step; when
    /// its junction would break the cap the tail is regenerated instead.
    fn reproduce(
        &self,
        periods: &[String],
        index: usize,
        parent: &Candidate,
        population: &[Candidate],
        fitness: &[i64],
        rng: &mut ChaCha20Rng,
    ) -> SquadResult<HorizonPlan> {
        if periods.len() < 2 {
            return self.build_random(periods, rng);
        }
        let cut = rng.gen_range(1..periods.len());
        let head = parent.plan.truncated(cut);
        let mutate = rng.gen_bool(self.config.mutation_probability);

        if mutate {
            let objective = random_objective(rng);
            debug!(target: "search", cut, objective = %objective, "mutating tail");
            return self.planner.extend(
                head,
                &periods[cut..],
                &objective,
                self.config.max_substitutions,
                Some(&mut *rng as &mut dyn RngCore),
            );
        }

        if let Some(partner) = pick_partner(fitness, index, rng) {
            let donor = &population[partner].plan;
            if let Some(spliced) = splice(&head, donor, cut, self.config.max_substitutions) {
                debug!(target: "search", cut, partner, "tail spliced from partner");
                return Ok(spliced);
            }
        }
        self.planner.extend(
            head,
            &periods[cut..],
            &self.config.objective,
            self.config.max_substitutions,
            Some(&mut *rng as &mut dyn RngCore),
        )
    }
}

/// `head` followed by `donor`'s periods from `cut` on, provided the junction
/// stays within the transfer cap.
fn splice(
    head: &HorizonPlan,
    donor: &HorizonPlan,
    cut: usize,
    max_substitutions: usize,
) -> Option<HorizonPlan> {
    let junction = head.last()?;
    let tail = donor.entries().get(cut..)?;
    let first = tail.first()?;
    if first.squad.transfers_from(&junction.squad).count() > max_substitutions {
        return None;
    }
    let mut child = head.clone();
    for entry in tail {
        child.push(entry.period.clone(), entry.squad.clone());
    }
    Some(child)
}

fn sort_by_fitness(population: &mut [Candidate]) {
    population.sort_by(|a, b| b.fitness.cmp(&a.fitness));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::{SquadOptimizer, SquadRules};
    use crate::store::{InMemoryPlayerStore, Player, Position};
    use std::sync::Arc;

    fn roster(names: &[&str]) -> Squad {
        Squad::new(
            names
                .iter()
                .map(|name| Player::new(*name, Position::Midfielder, *name, 5, 1))
                .collect(),
        )
    }

    #[test]
    fn splice_respects_junction_cap() {
        let mut head = HorizonPlan::new();
        head.push("f1", roster(&["a", "b", "c", "d"]));
        let mut donor = HorizonPlan::new();
        donor.push("f1", roster(&["w", "x", "y", "z"]));
        donor.push("f2", roster(&["a", "b", "x", "y"]));

        let child = splice(&head, &donor, 1, 2).unwrap();
        assert_eq!(child.periods(), vec!["f1", "f2"]);
        assert_eq!(child.squad("f1"), head.squad("f1"));
        assert!(splice(&head, &donor, 1, 1).is_none());
    }

    #[test]
    fn empty_period_list_is_rejected() {
        let planner = HorizonPlanner::new(
            Arc::new(InMemoryPlayerStore::default()),
            SquadOptimizer::new(),
            SquadRules::default(),
        );
        let search = SequenceSearch::new(planner, SearchConfig::default());
        assert!(matches!(search.search(&[]), Err(SquadError::EmptyHorizon)));
    }

    #[test]
    fn non_finite_mutation_probability_is_rejected() {
        let planner = HorizonPlanner::new(
            Arc::new(InMemoryPlayerStore::default()),
            SquadOptimizer::new(),
            SquadRules::default(),
        );
        let config = SearchConfig {
            mutation_probability: f64::NAN,
            ..SearchConfig::default()
        };
        let search = SequenceSearch::new(planner, config);
        let err = search.search(&["f1".to_string()]).unwrap_err();
        assert!(matches!(err, SquadError::InvalidSearch(_)));
        assert!(!err.is_candidate_failure());
    }
}
