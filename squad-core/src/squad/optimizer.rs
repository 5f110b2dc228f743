use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, warn};

use crate::store::{Player, Position};

use super::models::{Objective, Squad, TransferLimit};
use super::rules::SquadRules;
use super::{SquadError, SquadResult};

/// Backend that picks a squad out of a prepared pool. Implementations return
/// indices into `pool`.
pub trait SquadSolver: Send + Sync {
    fn solve(
        &self,
        pool: &[Player],
        objective: &Objective,
        rules: &SquadRules,
        limit: Option<&TransferLimit>,
    ) -> SquadResult<Vec<usize>>;
}

/// 0/1 integer program solved exactly with `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IlpSolver;

impl SquadSolver for IlpSolver {
    fn solve(
        &self,
        pool: &[Player],
        objective: &Objective,
        rules: &SquadRules,
        limit: Option<&TransferLimit>,
    ) -> SquadResult<Vec<usize>> {
        let mut vars = ProblemVariables::new();
        let picks: Vec<Variable> = pool
            .iter()
            .map(|_| vars.add(variable().binary()))
            .collect();

        let score: Expression = pool
            .iter()
            .zip(&picks)
            .map(|(player, pick)| objective.score(player) * *pick)
            .sum();
        let mut model = vars.maximise(score).using(default_solver);

        let selected: Expression = picks.iter().copied().sum();
        let size = rules.squad_size as f64;
        model = model.with(constraint!(selected == size));

        let cost: Expression = pool
            .iter()
            .zip(&picks)
            .map(|(player, pick)| player.price as f64 * *pick)
            .sum();
        let budget = rules.budget as f64;
        model = model.with(constraint!(cost.clone() <= budget));
        if rules.min_budget > 0 {
            let min_budget = rules.min_budget as f64;
            model = model.with(constraint!(cost >= min_budget));
        }

        for position in Position::ALL {
            let bounds = rules.bounds(position);
            let count: Expression = pool
                .iter()
                .zip(&picks)
                .filter(|(player, _)| player.position == position)
                .map(|(_, pick)| *pick)
                .sum();
            let (min, max) = (bounds.min as f64, bounds.max as f64);
            model = model.with(constraint!(count.clone() >= min));
            model = model.with(constraint!(count <= max));
        }

        let mut clubs: BTreeMap<&str, Vec<Variable>> = BTreeMap::new();
        for (player, pick) in pool.iter().zip(&picks) {
            clubs.entry(player.club.as_str()).or_default().push(*pick);
        }
        let cap = rules.max_per_club as f64;
        for members in clubs.into_values() {
            if members.len() > rules.max_per_club {
                let count: Expression = members.into_iter().sum();
                model = model.with(constraint!(count <= cap));
            }
        }

        if let Some(limit) = limit {
            let incoming: Expression = pool
                .iter()
                .zip(&picks)
                .filter(|(player, _)| !limit.previous.contains(&player.name))
                .map(|(_, pick)| *pick)
                .sum();
            let max_in = limit.max_substitutions as f64;
            model = model.with(constraint!(incoming <= max_in));
        }

        let solution = model.solve().map_err(|err| match err {
            ResolutionError::Infeasible => {
                SquadError::infeasible("no selection satisfies every constraint")
            }
            other => SquadError::Solver(other.to_string()),
        })?;

        Ok(picks
            .iter()
            .enumerate()
            .filter(|(_, pick)| solution.value(**pick) > 0.5)
            .map(|(index, _)| index)
            .collect())
    }
}

/// Picks a maximum-objective squad from one period's pool.
#[derive(Clone)]
pub struct SquadOptimizer {
    solver: Arc<dyn SquadSolver>,
}

impl fmt::Debug for SquadOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SquadOptimizer").finish_non_exhaustive()
    }
}

impl Default for SquadOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SquadOptimizer {
    pub fn new() -> Self {
        Self::with_solver(Arc::new(IlpSolver))
    }

    pub fn with_solver(solver: Arc<dyn SquadSolver>) -> Self {
        Self { solver }
    }

    pub fn select_squad(
        &self,
        players: &[Player],
        objective: &Objective,
        rules: &SquadRules,
    ) -> SquadResult<Squad> {
        self.select(players, objective, rules, None, None)
    }

    /// Like [`select_squad`](Self::select_squad) but at most
    /// `limit.max_substitutions` players may come from outside `limit.previous`.
    pub fn select_with_transfers(
        &self,
        players: &[Player],
        objective: &Objective,
        rules: &SquadRules,
        limit: &TransferLimit,
    ) -> SquadResult<Squad> {
        self.select(players, objective, rules, Some(limit), None)
    }

    /// Full entry point. When `rng` is given the pool is shuffled first so
    /// ties between equally scored squads are broken by the seed instead of
    /// input order.
    pub fn select(
        &self,
        players: &[Player],
        objective: &Objective,
        rules: &SquadRules,
        limit: Option<&TransferLimit>,
        rng: Option<&mut dyn RngCore>,
    ) -> SquadResult<Squad> {
        rules.validate().map_err(SquadError::InvalidRules)?;

        let mut seen = HashSet::new();
        let mut pool: Vec<Player> = players
            .iter()
            .filter(|player| seen.insert(player.name.as_str()))
            .cloned()
            .collect();
        precheck(&pool, rules)?;

        if let Some(rng) = rng {
            pool.shuffle(rng);
        }

        let picked = self.solver.solve(&pool, objective, rules, limit)?;
        let chosen: Vec<Player> = picked
            .into_iter()
            .filter_map(|index| pool.get(index).cloned())
            .collect();

        let violations = rules.check(&chosen);
        if let Some(violation) = violations.first() {
            warn!(target: "optimizer", %violation, "solver returned an illegal squad");
            return Err(SquadError::Solver(format!(
                "solver returned an illegal squad: {violation}"
            )));
        }
        if let Some(limit) = limit {
            if !limit.allows(&chosen) {
                return Err(SquadError::Solver(format!(
                    "solver exceeded the transfer cap of {}",
                    limit.max_substitutions
                )));
            }
        }

        let squad = Squad::new(chosen);
        debug!(
            target: "optimizer",
            objective = %objective,
            pool = pool.len(),
            points = squad.total_points(),
            cost = squad.total_cost(),
            "squad selected"
        );
        Ok(squad)
    }
}

/// Rejects pools that cannot possibly yield a legal squad, before any solve.
fn precheck(pool: &[Player], rules: &SquadRules) -> SquadResult<()> {
    if pool.len() < rules.squad_size {
        return Err(SquadError::infeasible(format!(
            "pool has {} players, squad needs {}",
            pool.len(),
            rules.squad_size
        )));
    }

    let clubs: HashSet<&str> = pool.iter().map(|p| p.club.as_str()).collect();
    if clubs.len() * rules.max_per_club < rules.squad_size {
        return Err(SquadError::infeasible(format!(
            "{} clubs with at most {} players each cannot fill {} places",
            clubs.len(),
            rules.max_per_club,
            rules.squad_size
        )));
    }

    let mut floor = 0;
    let mut spare = Vec::new();
    let mut required = 0;
    for position in Position::ALL {
        let bounds = rules.bounds(position);
        let mut prices: Vec<i64> = pool
            .iter()
            .filter(|p| p.position == position)
            .map(|p| p.price)
            .collect();
        if prices.len() < bounds.min {
            return Err(SquadError::infeasible(format!(
                "{} {position} available, at least {} required",
                prices.len(),
                bounds.min
            )));
        }
        prices.sort_unstable();
        floor += prices[..bounds.min].iter().sum::<i64>();
        required += bounds.min;
        spare.extend(
            prices[bounds.min..]
                .iter()
                .copied()
                .take(bounds.max - bounds.min),
        );
    }

    let open = rules.squad_size.saturating_sub(required);
    if spare.len() < open {
        return Err(SquadError::infeasible(
            "position maxima leave too few eligible players",
        ));
    }
    spare.sort_unstable();
    floor += spare[..open].iter().sum::<i64>();
    if floor > rules.budget {
        return Err(SquadError::infeasible(format!(
            "cheapest legal squad costs {floor}, budget is {}",
            rules.budget
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::ObjectiveKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn pool() -> Vec<Player> {
        let mut players = Vec::new();
        for i in 0..2 {
            players.push(Player::new(format!("gk{i}"), Position::Goalkeeper, format!("G{i}"), 5, 10 + i));
        }
        for i in 0..6 {
            players.push(Player::new(format!("cb{i}"), Position::Defender, format!("C{}", i % 3), 6, 5 + i));
            players.push(Player::new(format!("md{i}"), Position::Midfielder, format!("M{}", i % 3), 9, 8 + i));
        }
        for i in 0..4 {
            players.push(Player::new(format!("fw{i}"), Position::Forward, format!("F{i}"), 11, 12 + i));
        }
        players
    }

    struct FixedSolver(Vec<usize>);

    impl SquadSolver for FixedSolver {
        fn solve(
            &self,
            _pool: &[Player],
            _objective: &Objective,
            _rules: &SquadRules,
            _limit: Option<&TransferLimit>,
        ) -> SquadResult<Vec<usize>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn selects_a_legal_squad() {
        let rules = SquadRules::default();
        let squad = SquadOptimizer::new()
            .select_squad(&pool(), &Objective::default(), &rules)
            .unwrap();
        assert!(rules.is_satisfied_by(squad.players()));
        assert!(squad.contains("gk1"));
    }

    #[test]
    fn missing_goalkeeper_is_infeasible() {
        let players: Vec<_> = pool()
            .into_iter()
            .filter(|p| p.position != Position::Goalkeeper)
            .collect();
        let err = SquadOptimizer::new()
            .select_squad(&players, &Objective::default(), &SquadRules::default())
            .unwrap_err();
        assert!(matches!(err, SquadError::InfeasiblePool { .. }));
    }

    #[test]
    fn budget_floor_is_checked_before_solving() {
        let rules = SquadRules::default().with_budget(60);
        let optimizer = SquadOptimizer::with_solver(Arc::new(FixedSolver(Vec::new())));
        let err = optimizer
            .select_squad(&pool(), &Objective::default(), &rules)
            .unwrap_err();
        match err {
            SquadError::InfeasiblePool { reason } => assert!(reason.contains("cheapest")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn illegal_solver_output_is_rejected() {
        let optimizer = SquadOptimizer::with_solver(Arc::new(FixedSolver(vec![0, 1, 2])));
        let err = optimizer
            .select_squad(&pool(), &Objective::default(), &SquadRules::default())
            .unwrap_err();
        assert!(matches!(err, SquadError::Solver(_)));
    }

    #[test]
    fn transfer_limit_bounds_new_players() {
        let rules = SquadRules::default();
        let optimizer = SquadOptimizer::new();
        let first = optimizer
            .select_squad(&pool(), &Objective::single(ObjectiveKey::Price), &rules)
            .unwrap();
        let limit = TransferLimit::new(&first, 1);
        let second = optimizer
            .select_with_transfers(&pool(), &Objective::default(), &rules, &limit)
            .unwrap();
        assert!(second.transfers_from(&first).count() <= 1);
        assert!(rules.is_satisfied_by(second.players()));
    }

    #[test]
    fn seeded_selection_is_reproducible() {
        let rules = SquadRules::default();
        let optimizer = SquadOptimizer::new();
        let flat: Vec<Player> = pool()
            .into_iter()
            .map(|mut p| {
                p.points = 1;
                p
            })
            .collect();
        let run = |seed: u64| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            optimizer
                .select(&flat, &Objective::default(), &rules, None, Some(&mut rng))
                .unwrap()
        };
        assert_eq!(run(7), run(7));
    }
}
