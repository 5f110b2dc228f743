use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{Player, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBounds {
    pub min: usize,
    pub max: usize,
}

impl PositionBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// Legality constraints shared by the optimizer, the enumerator and the
/// plan verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadRules {
    pub squad_size: usize,
    pub budget: i64,
    pub min_budget: i64,
    pub max_per_club: usize,
    pub positions: BTreeMap<Position, PositionBounds>,
}

impl Default for SquadRules {
    fn default() -> Self {
        let positions = [
            (Position::Goalkeeper, PositionBounds::new(1, 1)),
            (Position::Defender, PositionBounds::new(3, 5)),
            (Position::Midfielder, PositionBounds::new(3, 5)),
            (Position::Forward, PositionBounds::new(1, 3)),
        ]
        .into_iter()
        .collect();
        Self {
            squad_size: 11,
            budget: 108,
            min_budget: 0,
            max_per_club: 2,
            positions,
        }
    }
}

impl SquadRules {
    /// Bounds for `position`; positions absent from the rules may not be
    /// picked at all.
    pub fn bounds(&self, position: Position) -> PositionBounds {
        self.positions
            .get(&position)
            .copied()
            .unwrap_or(PositionBounds::new(0, 0))
    }

    pub fn with_budget(mut self, budget: i64) -> Self {
        self.budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.squad_size == 0 {
            return Err("squad size must be positive".to_string());
        }
        if self.max_per_club == 0 {
            return Err("max players per club must be positive".to_string());
        }
        for (position, bounds) in &self.positions {
            if bounds.min > bounds.max {
                return Err(format!(
                    "{position} minimum {} exceeds maximum {}",
                    bounds.min, bounds.max
                ));
            }
        }
        let min_total: usize = self.positions.values().map(|b| b.min).sum();
        let max_total: usize = self.positions.values().map(|b| b.max).sum();
        if min_total > self.squad_size || max_total < self.squad_size {
            return Err(format!(
                "position bounds allow {min_total}..={max_total} players, squad size is {}",
                self.squad_size
            ));
        }
        if self.budget < self.min_budget {
            return Err(format!(
                "budget {} is below the minimum spend {}",
                self.budget, self.min_budget
            ));
        }
        Ok(())
    }

    /// Every rule the given selection breaks; empty means legal.
    pub fn check(&self, players: &[Player]) -> Vec<RuleViolation> {
        let mut violations = Vec::new();
        if players.len() != self.squad_size {
            violations.push(RuleViolation::SquadSize {
                expected: self.squad_size,
                actual: players.len(),
            });
        }

        let mut seen = BTreeSet::new();
        for player in players {
            if !seen.insert(player.name.as_str()) {
                violations.push(RuleViolation::DuplicatePlayer {
                    name: player.name.clone(),
                });
            }
        }

        for position in Position::ALL {
            let count = players.iter().filter(|p| p.position == position).count();
            let bounds = self.bounds(position);
            if !bounds.contains(count) {
                violations.push(RuleViolation::Position {
                    position,
                    count,
                    bounds,
                });
            }
        }

        let cost: i64 = players.iter().map(|p| p.price).sum();
        if cost > self.budget {
            violations.push(RuleViolation::OverBudget {
                cost,
                budget: self.budget,
            });
        }
        if cost < self.min_budget {
            violations.push(RuleViolation::UnderMinimumSpend {
                cost,
                min_budget: self.min_budget,
            });
        }

        let mut clubs: BTreeMap<&str, usize> = BTreeMap::new();
        for player in players {
            *clubs.entry(player.club.as_str()).or_default() += 1;
        }
        for (club, count) in clubs {
            if count > self.max_per_club {
                violations.push(RuleViolation::ClubCap {
                    club: club.to_string(),
                    count,
                    max: self.max_per_club,
                });
            }
        }
        violations
    }

    pub fn is_satisfied_by(&self, players: &[Player]) -> bool {
        self.check(players).is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleViolation {
    SquadSize {
        expected: usize,
        actual: usize,
    },
    Position {
        position: Position,
        count: usize,
        bounds: PositionBounds,
    },
    OverBudget {
        cost: i64,
        budget: i64,
    },
    UnderMinimumSpend {
        cost: i64,
        min_budget: i64,
    },
    ClubCap {
        club: String,
        count: usize,
        max: usize,
    },
    DuplicatePlayer {
        name: String,
    },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::SquadSize { expected, actual } => {
                write!(f, "squad has {actual} players, expected {expected}")
            }
            RuleViolation::Position {
                position,
                count,
                bounds,
            } => write!(
                f,
                "{count} players at {position}, allowed {}..={}",
                bounds.min, bounds.max
            ),
            RuleViolation::OverBudget { cost, budget } => {
                write!(f, "cost {cost} exceeds budget {budget}")
            }
            RuleViolation::UnderMinimumSpend { cost, min_budget } => {
                write!(f, "cost {cost} is below minimum spend {min_budget}")
            }
            RuleViolation::ClubCap { club, count, max } => {
                write!(f, "{count} players from {club}, at most {max} allowed")
            }
            RuleViolation::DuplicatePlayer { name } => write!(f, "{name} picked twice"),
        }
    }
}
