use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use tracing::debug;

use crate::store::{Player, Position};

use super::models::Squad;
use super::rules::SquadRules;
use super::{SquadError, SquadResult};

/// Order in which positions are nested, outermost first.
const NESTING: [Position; 4] = [
    Position::Goalkeeper,
    Position::Midfielder,
    Position::Defender,
    Position::Forward,
];

/// Enumerates every legal squad with fixed per-position counts from a
/// filtered pool. Each call to [`iter`](Self::iter) starts a fresh, lazy
/// pass.
#[derive(Debug, Clone)]
pub struct SquadEnumerator {
    groups: BTreeMap<Position, Vec<Player>>,
    counts: BTreeMap<Position, usize>,
    rules: SquadRules,
}

impl SquadEnumerator {
    /// Keeps fit players with at least `min_points`. `counts` must fill the
    /// squad exactly and respect the position bounds of `rules`.
    pub fn new(
        players: &[Player],
        min_points: i64,
        counts: &BTreeMap<Position, usize>,
        rules: &SquadRules,
    ) -> SquadResult<Self> {
        rules.validate().map_err(SquadError::InvalidRules)?;
        let total: usize = counts.values().sum();
        if total != rules.squad_size {
            return Err(SquadError::InvalidRules(format!(
                "position counts add up to {total}, squad size is {}",
                rules.squad_size
            )));
        }
        let mut normalized = BTreeMap::new();
        for position in Position::ALL {
            let count = counts.get(&position).copied().unwrap_or(0);
            if !rules.bounds(position).contains(count) {
                return Err(SquadError::InvalidRules(format!(
                    "{count} {position} is outside the allowed bounds"
                )));
            }
            normalized.insert(position, count);
        }

        let mut groups: BTreeMap<Position, Vec<Player>> = BTreeMap::new();
        for player in players {
            if player.points >= min_points && !player.injured {
                groups
                    .entry(player.position)
                    .or_default()
                    .push(player.clone());
            }
        }
        let enumerator = Self {
            groups,
            counts: normalized,
            rules: rules.clone(),
        };
        debug!(
            target: "enumerator",
            min_points,
            candidates = enumerator.groups.values().map(Vec::len).sum::<usize>(),
            combinations = %enumerator.combination_count(),
            "enumerator prepared"
        );
        Ok(enumerator)
    }

    fn group(&self, position: Position) -> &[Player] {
        self.groups.get(&position).map(Vec::as_slice).unwrap_or(&[])
    }

    fn count(&self, position: Position) -> usize {
        self.counts.get(&position).copied().unwrap_or(0)
    }

    /// Size of the unpruned product, before club and budget filtering.
    pub fn combination_count(&self) -> u128 {
        Position::ALL
            .iter()
            .map(|position| binomial(self.group(*position).len(), self.count(*position)))
            .product()
    }

    pub fn iter(&self) -> impl Iterator<Item = Squad> + '_ {
        self.descend(0, Vec::new()).filter_map(move |picked| {
            let players: Vec<Player> = picked.into_iter().cloned().collect();
            self.rules
                .is_satisfied_by(&players)
                .then(|| Squad::new(players))
        })
    }

    fn descend<'a>(
        &'a self,
        depth: usize,
        partial: Vec<&'a Player>,
    ) -> Box<dyn Iterator<Item = Vec<&'a Player>> + 'a> {
        let Some(&position) = NESTING.get(depth) else {
            return Box::new(std::iter::once(partial));
        };
        let candidates: Vec<&'a Player> = {
            let saturated = saturated_clubs(&partial, self.rules.max_per_club);
            self.group(position)
                .iter()
                .filter(|player| !saturated.contains_key(player.club.as_str()))
                .collect()
        };
        let budget = self.rules.budget;
        let max_per_club = self.rules.max_per_club;
        Box::new(
            candidates
                .into_iter()
                .combinations(self.count(position))
                .filter_map(move |combo| {
                    let mut next = partial.clone();
                    next.extend(combo);
                    let cost: i64 = next.iter().map(|p| p.price).sum();
                    (cost <= budget && within_club_cap(&next, max_per_club)).then_some(next)
                })
                .flat_map(move |next| self.descend(depth + 1, next)),
        )
    }
}

fn club_counts<'a>(players: &[&'a Player]) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for player in players {
        *counts.entry(player.club.as_str()).or_default() += 1;
    }
    counts
}

fn within_club_cap(players: &[&Player], max_per_club: usize) -> bool {
    club_counts(players).values().all(|count| *count <= max_per_club)
}

/// Clubs that already hold `max_per_club` players in the partial pick.
fn saturated_clubs<'a>(players: &[&'a Player], max_per_club: usize) -> HashMap<&'a str, usize> {
    club_counts(players)
        .into_iter()
        .filter(|(_, count)| *count >= max_per_club)
        .collect()
}

fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u128, |acc, i| acc * (n - i) as u128 / (i + 1) as u128)
}
