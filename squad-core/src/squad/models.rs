use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{Player, Position};

/// A selected squad. Players are kept ordered by position then name so two
/// squads with the same members compare and serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Squad {
    players: Vec<Player>,
}

impl Squad {
    pub fn new(mut players: Vec<Player>) -> Self {
        players.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.name.cmp(&b.name))
        });
        Self { players }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn into_players(self) -> Vec<Player> {
        self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn total_points(&self) -> i64 {
        self.players.iter().map(|p| p.points).sum()
    }

    pub fn total_cost(&self) -> i64 {
        self.players.iter().map(|p| p.price).sum()
    }

    pub fn total_stars(&self) -> i64 {
        self.players
            .iter()
            .map(|p| i64::from(p.stars.unwrap_or(0)))
            .sum()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    pub fn position_counts(&self) -> BTreeMap<Position, usize> {
        let mut counts = BTreeMap::new();
        for player in &self.players {
            *counts.entry(player.position).or_default() += 1;
        }
        counts
    }

    /// Players in GK, CB, MD, FW order.
    pub fn sorted_by_position(&self) -> Vec<&Player> {
        self.players.iter().collect()
    }

    pub fn transfers_from(&self, previous: &Squad) -> Transfers {
        let before = previous.names();
        let after = self.names();
        Transfers {
            ins: after.difference(&before).cloned().collect(),
            outs: before.difference(&after).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfers {
    pub ins: Vec<String>,
    pub outs: Vec<String>,
}

impl Transfers {
    pub fn count(&self) -> usize {
        self.ins.len()
    }
}

/// Player attribute maximised during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKey {
    Points,
    Stars,
    Price,
}

impl ObjectiveKey {
    pub const ALL: [ObjectiveKey; 3] = [ObjectiveKey::Points, ObjectiveKey::Stars, ObjectiveKey::Price];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveKey::Points => "points",
            ObjectiveKey::Stars => "stars",
            ObjectiveKey::Price => "price",
        }
    }

    /// Unrated players count as zero stars.
    pub fn value(&self, player: &Player) -> f64 {
        match self {
            ObjectiveKey::Points => player.points as f64,
            ObjectiveKey::Stars => f64::from(player.stars.unwrap_or(0)),
            ObjectiveKey::Price => player.price as f64,
        }
    }
}

impl fmt::Display for ObjectiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "points" => Ok(ObjectiveKey::Points),
            "stars" => Ok(ObjectiveKey::Stars),
            "price" => Ok(ObjectiveKey::Price),
            other => Err(format!("unknown objective key: {other}")),
        }
    }
}

/// Primary key plus an optional weighted secondary key, e.g.
/// `stars + 0.5 * points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub key: ObjectiveKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<(ObjectiveKey, f64)>,
}

impl Default for Objective {
    fn default() -> Self {
        Self::single(ObjectiveKey::Points)
    }
}

impl Objective {
    pub fn single(key: ObjectiveKey) -> Self {
        Self {
            key,
            secondary: None,
        }
    }

    pub fn blended(key: ObjectiveKey, secondary: ObjectiveKey, weight: f64) -> Self {
        Self {
            key,
            secondary: Some((secondary, weight)),
        }
    }

    pub fn score(&self, player: &Player) -> f64 {
        let base = self.key.value(player);
        match self.secondary {
            Some((key, weight)) => base + weight * key.value(player),
            None => base,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.secondary {
            Some((key, weight)) => write!(f, "{} + {weight} * {key}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Caps how many players may enter relative to a previous roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLimit {
    pub previous: BTreeSet<String>,
    pub max_substitutions: usize,
}

impl TransferLimit {
    pub fn new(previous: &Squad, max_substitutions: usize) -> Self {
        Self {
            previous: previous.names(),
            max_substitutions,
        }
    }

    pub fn allows(&self, players: &[Player]) -> bool {
        players
            .iter()
            .filter(|p| !self.previous.contains(&p.name))
            .count()
            <= self.max_substitutions
    }
}
