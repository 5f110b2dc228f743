use itertools::Itertools;
use squad_core::{
    Objective, ObjectiveKey, Player, Position, SquadError, SquadOptimizer, SquadRules,
};

const CLUBS: [&str; 7] = ["Hapoel", "Maccabi", "Beitar", "Bnei", "Ashdod", "Sakhnin", "Netanya"];

/// Twenty synthetic players spread over every position and seven clubs.
fn synthetic_pool() -> Vec<Player> {
    (0..20)
        .map(|i: i64| {
            let position = match i {
                0..=1 => Position::Goalkeeper,
                2..=7 => Position::Defender,
                8..=14 => Position::Midfielder,
                _ => Position::Forward,
            };
            let price = 5 + (i * 7) % 11;
            let points = 10 + (i * 13) % 29;
            let stars = 1 + ((i * 3) % 5) as u8;
            Player::new(
                format!("player{i:02}"),
                position,
                CLUBS[(i as usize) % CLUBS.len()],
                price,
                points,
            )
            .with_stars(stars)
        })
        .collect()
}

fn brute_force_best(pool: &[Player], objective: &Objective, rules: &SquadRules) -> Option<f64> {
    pool.iter()
        .combinations(rules.squad_size)
        .filter_map(|combo| {
            let players: Vec<Player> = combo.into_iter().cloned().collect();
            rules
                .is_satisfied_by(&players)
                .then(|| players.iter().map(|p| objective.score(p)).sum::<f64>())
        })
        .max_by(|a, b| a.partial_cmp(b).unwrap())
}

#[test]
fn optimizer_matches_exhaustive_search() {
    let pool = synthetic_pool();
    let rules = SquadRules::default();
    let optimizer = SquadOptimizer::new();

    for objective in [
        Objective::default(),
        Objective::single(ObjectiveKey::Stars),
        Objective::blended(ObjectiveKey::Points, ObjectiveKey::Stars, 0.5),
    ] {
        let expected = brute_force_best(&pool, &objective, &rules).unwrap();
        let squad = optimizer.select_squad(&pool, &objective, &rules).unwrap();
        let achieved: f64 = squad.players().iter().map(|p| objective.score(p)).sum();
        assert!(
            (achieved - expected).abs() < 1e-6,
            "{objective}: solver {achieved}, exhaustive {expected}"
        );
        assert!(rules.is_satisfied_by(squad.players()));
    }
}

#[test]
fn tight_budget_still_matches_exhaustive_search() {
    let pool = synthetic_pool();
    let rules = SquadRules::default().with_budget(90);
    let expected = brute_force_best(&pool, &Objective::default(), &rules).unwrap();
    let squad = SquadOptimizer::new()
        .select_squad(&pool, &Objective::default(), &rules)
        .unwrap();
    assert_eq!(squad.total_points() as f64, expected);
    assert!(squad.total_cost() <= 90);
}

#[test]
fn exact_fit_pool_is_selected_whole() {
    let mut pool = vec![Player::new("keeper", Position::Goalkeeper, "Hapoel", 8, 7)];
    for i in 0..4 {
        pool.push(Player::new(format!("back{i}"), Position::Defender, CLUBS[1 + i % 2], 10, 3 + i as i64));
        pool.push(Player::new(format!("mid{i}"), Position::Midfielder, CLUBS[3 + i % 2], 10, 5));
    }
    pool.push(Player::new("striker0", Position::Forward, CLUBS[5], 10, 9));
    pool.push(Player::new("striker1", Position::Forward, "Hapoel", 10, 11));

    let rules = SquadRules::default();
    let squad = SquadOptimizer::new()
        .select_squad(&pool, &Objective::default(), &rules)
        .unwrap();
    assert_eq!(squad.len(), 11);
    assert_eq!(squad.total_cost(), rules.budget);
    assert_eq!(squad.total_points(), pool.iter().map(|p| p.points).sum::<i64>());
    let expected: std::collections::BTreeSet<String> = pool.iter().map(|p| p.name.clone()).collect();
    assert_eq!(squad.names(), expected);
}

#[test]
fn pool_without_goalkeepers_is_infeasible() {
    let pool: Vec<Player> = synthetic_pool()
        .into_iter()
        .filter(|p| p.position != Position::Goalkeeper)
        .collect();
    let err = SquadOptimizer::new()
        .select_squad(&pool, &Objective::default(), &SquadRules::default())
        .unwrap_err();
    assert!(matches!(err, SquadError::InfeasiblePool { .. }));
}

#[test]
fn unreachable_minimum_spend_is_infeasible() {
    let mut rules = SquadRules::default();
    rules.min_budget = 107;
    rules.budget = 108;
    let pool: Vec<Player> = synthetic_pool()
        .into_iter()
        .map(|mut p| {
            p.price = 5;
            p
        })
        .collect();
    let err = SquadOptimizer::new()
        .select_squad(&pool, &Objective::default(), &rules)
        .unwrap_err();
    assert!(matches!(err, SquadError::InfeasiblePool { .. }));
}

#[test]
fn duplicated_names_count_once() {
    let mut pool = synthetic_pool();
    pool.extend(synthetic_pool());
    let rules = SquadRules::default();
    let squad = SquadOptimizer::new()
        .select_squad(&pool, &Objective::default(), &rules)
        .unwrap();
    assert_eq!(squad.names().len(), rules.squad_size);
}
