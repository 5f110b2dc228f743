mod error;
mod memory;
mod models;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryPlayerStore;
pub use models::{
    ImportSummary, ImportedEvent, ImportedFixture, ImportedPlayer, ParsePositionError, Player,
    PlayerImport, PlayerTotals, Position, StoreCounts, Team,
};
pub use sqlite::{SqlitePlayerStore, SqlitePlayerStoreBuilder};

/// Read side of the player database as consumed by the optimizer and planner.
pub trait PlayerStore: Send + Sync {
    fn get_all_players(&self) -> StoreResult<Vec<Player>>;

    /// Players that took part in `period`; `points` holds that period's points.
    fn get_players_by_fixture(&self, period: &str) -> StoreResult<Vec<Player>>;

    /// Players whose season points are strictly above `threshold`.
    fn get_players_min_points(&self, threshold: i64) -> StoreResult<Vec<Player>>;

    /// Fit players of one club at one position.
    fn get_players_by_position_and_club(
        &self,
        position: Position,
        club: &str,
    ) -> StoreResult<Vec<Player>>;

    fn get_player(&self, name: &str) -> StoreResult<Option<Player>>;

    /// Period snapshot of the named players. Names without a fixture row for
    /// `period` are returned from the season table with zero points.
    fn get_players_by_fixture_names(
        &self,
        period: &str,
        names: &[String],
    ) -> StoreResult<Vec<Player>> {
        let snapshot = self.get_players_by_fixture(period)?;
        let mut players = Vec::with_capacity(names.len());
        for name in names {
            match snapshot.iter().find(|player| &player.name == name) {
                Some(player) => players.push(player.clone()),
                None => {
                    let mut player = self
                        .get_player(name)?
                        .ok_or_else(|| StoreError::PlayerNotFound { name: name.clone() })?;
                    player.points = 0;
                    players.push(player);
                }
            }
        }
        Ok(players)
    }
}
