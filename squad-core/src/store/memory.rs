use std::collections::BTreeMap;

use super::models::{Player, Position};
use super::{PlayerStore, StoreResult};

/// Player store backed by plain vectors: a season table plus one snapshot
/// per period.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlayerStore {
    players: Vec<Player>,
    fixtures: BTreeMap<String, Vec<Player>>,
}

impl InMemoryPlayerStore {
    pub fn new(players: Vec<Player>) -> Self {
        Self {
            players,
            fixtures: BTreeMap::new(),
        }
    }

    /// Registers the snapshot of one period. Players unknown to the season
    /// table are added to it.
    pub fn with_fixture(mut self, period: impl Into<String>, snapshot: Vec<Player>) -> Self {
        for player in &snapshot {
            if !self.players.iter().any(|known| known.name == player.name) {
                self.players.push(player.clone());
            }
        }
        self.fixtures.insert(period.into(), snapshot);
        self
    }
}

impl PlayerStore for InMemoryPlayerStore {
    fn get_all_players(&self) -> StoreResult<Vec<Player>> {
        Ok(self.players.clone())
    }

    fn get_players_by_fixture(&self, period: &str) -> StoreResult<Vec<Player>> {
        Ok(self.fixtures.get(period).cloned().unwrap_or_default())
    }

    fn get_players_min_points(&self, threshold: i64) -> StoreResult<Vec<Player>> {
        Ok(self
            .players
            .iter()
            .filter(|player| player.points > threshold)
            .cloned()
            .collect())
    }

    fn get_players_by_position_and_club(
        &self,
        position: Position,
        club: &str,
    ) -> StoreResult<Vec<Player>> {
        Ok(self
            .players
            .iter()
            .filter(|player| player.position == position && player.club == club && !player.injured)
            .cloned()
            .collect())
    }

    fn get_player(&self, name: &str) -> StoreResult<Option<Player>> {
        Ok(self.players.iter().find(|player| player.name == name).cloned())
    }
}
