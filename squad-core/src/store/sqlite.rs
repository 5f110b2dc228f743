use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use tracing::{debug, info};

use super::models::{ImportSummary, Player, PlayerImport, PlayerTotals, Position, StoreCounts, Team};
use super::{PlayerStore, StoreError, StoreResult};

const PLAYER_SCHEMA: &str = include_str!("../../../sql/players.sql");

const PLAYER_COLUMNS: &str = "name, position, team_name, price, points, stars, injury";

#[derive(Debug, Clone)]
pub struct SqlitePlayerStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqlitePlayerStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqlitePlayerStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<SqlitePlayerStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };

        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        Ok(SqlitePlayerStore { path, flags })
    }
}

#[derive(Debug, Clone)]
pub struct SqlitePlayerStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqlitePlayerStore {
    pub fn builder() -> SqlitePlayerStoreBuilder {
        SqlitePlayerStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqlitePlayerStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        let read_only = self.flags.contains(OpenFlags::SQLITE_OPEN_READ_ONLY);
        configure_connection(&conn, read_only).map_err(|source| StoreError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(PLAYER_SCHEMA)?;
        Ok(())
    }

    /// Runs `PRAGMA integrity_check` and returns the first reported line.
    pub fn integrity_check(&self) -> StoreResult<String> {
        let conn = self.open()?;
        let result = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result)
    }

    pub fn insert_team(&self, team: &Team) -> StoreResult<bool> {
        let conn = self.open()?;
        Ok(insert_team(&conn, team)?)
    }

    pub fn insert_player(&self, player: &Player) -> StoreResult<bool> {
        let conn = self.open()?;
        Ok(insert_player(&conn, player)?)
    }

    /// Records a player's points for one fixture and returns the fixture row
    /// id. An existing (player, fixture) row is reused untouched.
    pub fn insert_fixture(
        &self,
        player_name: &str,
        fixture_name: &str,
        points: i64,
        club: &str,
    ) -> StoreResult<i64> {
        let conn = self.open()?;
        let (fixture_id, _) = insert_fixture(&conn, player_name, fixture_name, points, club)?;
        Ok(fixture_id)
    }

    pub fn insert_event(
        &self,
        fixture_id: i64,
        event_name: &str,
        quantity: i64,
        points: i64,
    ) -> StoreResult<bool> {
        let conn = self.open()?;
        Ok(insert_event(&conn, fixture_id, event_name, quantity, points)?)
    }

    pub fn update_player(
        &self,
        name: &str,
        club: &str,
        points: i64,
        injured: bool,
    ) -> StoreResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE players SET points = ?2, team_name = ?3, injury = ?4 WHERE name = ?1",
            params![name, points, club, injured as i64],
        )?;
        if affected == 0 {
            return Err(StoreError::PlayerNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn update_stars(&self, ratings: &[(String, u8)]) -> StoreResult<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        for (name, stars) in ratings {
            updated += tx.execute(
                "UPDATE players SET stars = ?2 WHERE name = ?1",
                params![name, *stars as i64],
            )?;
        }
        tx.commit()?;
        info!(target: "store", updated, "star ratings stored");
        Ok(updated)
    }

    pub fn import(&self, import: &PlayerImport) -> StoreResult<ImportSummary> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let summary = import_in(&tx, import)?;
        tx.commit()?;
        info!(
            target: "store",
            teams = summary.teams,
            players = summary.players,
            fixtures = summary.fixtures,
            events = summary.events,
            "import committed"
        );
        Ok(summary)
    }

    /// Known period ids, in the order they were first recorded.
    pub fn list_fixtures(&self) -> StoreResult<Vec<String>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT fixture_name FROM fixtures
             GROUP BY fixture_name
             ORDER BY MIN(fixture_id) ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    pub fn list_teams(&self) -> StoreResult<Vec<Team>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT * FROM teams ORDER BY team_name")?;
        let rows = stmt
            .query_map([], |row| Team::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Season aggregates per player: games played and summed event
    /// quantities across every recorded fixture.
    pub fn totals_with_events(&self) -> StoreResult<Vec<PlayerTotals>> {
        let conn = self.open()?;
        let mut totals: BTreeMap<String, PlayerTotals> = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT p.name, p.team_name, p.price, p.points, COUNT(f.fixture_id)
                 FROM players p
                 LEFT JOIN fixtures f ON f.player_name = p.name
                 GROUP BY p.name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(PlayerTotals {
                    name: row.get(0)?,
                    club: row.get(1)?,
                    price: row.get(2)?,
                    points: row.get(3)?,
                    games_played: row.get(4)?,
                    events: BTreeMap::new(),
                })
            })?;
            for row in rows {
                let row = row?;
                totals.insert(row.name.clone(), row);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT f.player_name, e.event_name, SUM(e.event_quantity)
             FROM events e
             INNER JOIN fixtures f ON f.fixture_id = e.fixture_id
             GROUP BY f.player_name, e.event_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (name, event, quantity) = row?;
            if let Some(entry) = totals.get_mut(&name) {
                entry.events.insert(event, quantity);
            }
        }
        Ok(totals.into_values().collect())
    }

    pub fn counts(&self) -> StoreResult<StoreCounts> {
        let conn = self.open()?;
        let count = |table: &str| -> StoreResult<usize> {
            let value: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(value as usize)
        };
        Ok(StoreCounts {
            teams: count("teams")?,
            players: count("players")?,
            fixtures: count("fixtures")?,
            events: count("events")?,
        })
    }

    fn query_players<P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Vec<Player>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| Player::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl PlayerStore for SqlitePlayerStore {
    fn get_all_players(&self) -> StoreResult<Vec<Player>> {
        self.query_players(
            &format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY name"),
            [],
        )
    }

    fn get_players_by_fixture(&self, period: &str) -> StoreResult<Vec<Player>> {
        let players = self.query_players(
            "SELECT p.name, p.position, p.team_name, p.price,
                    f.fixture_points AS points, p.stars, p.injury
             FROM players p
             INNER JOIN fixtures f ON f.player_name = p.name
             WHERE f.fixture_name = ?1
             ORDER BY p.name",
            [period],
        )?;
        debug!(target: "store", period, players = players.len(), "fixture snapshot loaded");
        Ok(players)
    }

    fn get_players_min_points(&self, threshold: i64) -> StoreResult<Vec<Player>> {
        self.query_players(
            &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE points > ?1 ORDER BY name"),
            [threshold],
        )
    }

    fn get_players_by_position_and_club(
        &self,
        position: Position,
        club: &str,
    ) -> StoreResult<Vec<Player>> {
        self.query_players(
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE team_name = ?1 AND position = ?2 AND injury = 0
                 ORDER BY name"
            ),
            params![club, position.as_str()],
        )
    }

    fn get_player(&self, name: &str) -> StoreResult<Option<Player>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE name = ?1"
        ))?;
        let player = stmt
            .query_row([name], |row| Player::from_row(row))
            .optional()?;
        Ok(player)
    }
}

/// Busy timeout on every handle; WAL and relaxed syncing on writable ones only.
fn configure_connection(conn: &Connection, read_only: bool) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    if read_only {
        return Ok(());
    }
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA temp_store = MEMORY;\n",
    )
}

fn insert_team(conn: &Connection, team: &Team) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO teams (team_name, overall, attack, defend)
         VALUES (?1, ?2, ?3, ?4)",
        params![team.name, team.overall, team.attack, team.defend],
    )?;
    Ok(inserted > 0)
}

fn insert_player(conn: &Connection, player: &Player) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO players (name, position, team_name, price, points, stars, injury)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            player.name,
            player.position.as_str(),
            player.club,
            player.price,
            player.points,
            player.stars.map(i64::from),
            player.injured as i64,
        ],
    )?;
    Ok(inserted > 0)
}

fn insert_fixture(
    conn: &Connection,
    player_name: &str,
    fixture_name: &str,
    points: i64,
    club: &str,
) -> rusqlite::Result<(i64, bool)> {
    let existing = conn
        .query_row(
            "SELECT fixture_id FROM fixtures WHERE player_name = ?1 AND fixture_name = ?2",
            params![player_name, fixture_name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(fixture_id) = existing {
        return Ok((fixture_id, false));
    }
    conn.execute(
        "INSERT INTO fixtures (player_name, fixture_name, fixture_points, team_name)
         VALUES (?1, ?2, ?3, ?4)",
        params![player_name, fixture_name, points, club],
    )?;
    Ok((conn.last_insert_rowid(), true))
}

fn insert_event(
    conn: &Connection,
    fixture_id: i64,
    event_name: &str,
    quantity: i64,
    points: i64,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO events (fixture_id, event_name, event_quantity, event_points)
         VALUES (?1, ?2, ?3, ?4)",
        params![fixture_id, event_name, quantity, points],
    )?;
    Ok(inserted > 0)
}

fn import_in(tx: &Transaction<'_>, import: &PlayerImport) -> rusqlite::Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for team in &import.teams {
        if insert_team(tx, team)? {
            summary.teams += 1;
        }
    }
    for entry in &import.players {
        if insert_player(tx, &entry.player)? {
            summary.players += 1;
        }
        for (fixture_name, fixture) in &entry.fixtures {
            let (fixture_id, created) = insert_fixture(
                tx,
                &entry.player.name,
                fixture_name,
                fixture.points,
                &entry.player.club,
            )?;
            if created {
                summary.fixtures += 1;
            }
            for (event_name, event) in &fixture.events {
                if insert_event(tx, fixture_id, event_name, event.quantity, event.points)? {
                    summary.events += 1;
                }
            }
        }
    }
    Ok(summary)
}
