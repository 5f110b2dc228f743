use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GK")]
    Goalkeeper,
    #[serde(rename = "CB")]
    Defender,
    #[serde(rename = "MD")]
    Midfielder,
    #[serde(rename = "FW")]
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "CB",
            Position::Midfielder => "MD",
            Position::Forward => "FW",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown position: {0}")]
pub struct ParsePositionError(pub String);

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GK" => Ok(Position::Goalkeeper),
            "CB" => Ok(Position::Defender),
            "MD" => Ok(Position::Midfielder),
            "FW" => Ok(Position::Forward),
            _ => Err(ParsePositionError(s.to_string())),
        }
    }
}

/// One player as seen for a single period: `points` always refers to the
/// snapshot the record was read for (season total or one fixture).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub position: Position,
    #[serde(alias = "team")]
    pub club: String,
    pub price: i64,
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u8>,
    #[serde(default)]
    pub injured: bool,
}

impl Player {
    pub fn new(
        name: impl Into<String>,
        position: Position,
        club: impl Into<String>,
        price: i64,
        points: i64,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            club: club.into(),
            price,
            points,
            stars: None,
            injured: false,
        }
    }

    pub fn with_stars(mut self, stars: u8) -> Self {
        self.stars = Some(stars);
        self
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let position: String = row.get("position")?;
        let position = position.parse::<Position>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(err))
        })?;
        Ok(Self {
            name: row.get("name")?,
            position,
            club: row.get("team_name")?,
            price: row.get("price")?,
            points: row.get("points")?,
            stars: row
                .get::<_, Option<i64>>("stars")?
                .and_then(|value| u8::try_from(value).ok())
                .filter(|value| (1..=5).contains(value)),
            injured: row.get::<_, Option<i64>>("injury")?.unwrap_or(0) != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub overall: f64,
    #[serde(default)]
    pub attack: f64,
    #[serde(default)]
    pub defend: f64,
}

impl Team {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get("team_name")?,
            overall: row.get("overall")?,
            attack: row.get("attack")?,
            defend: row.get("defend")?,
        })
    }
}

/// Bulk import document: teams plus players with their per-fixture points
/// and event breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerImport {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub players: Vec<ImportedPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedPlayer {
    #[serde(flatten)]
    pub player: Player,
    #[serde(default)]
    pub fixtures: BTreeMap<String, ImportedFixture>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedFixture {
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub events: BTreeMap<String, ImportedEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedEvent {
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub points: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub teams: usize,
    pub players: usize,
    pub fixtures: usize,
    pub events: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub teams: usize,
    pub players: usize,
    pub fixtures: usize,
    pub events: usize,
}

/// Season aggregates for one player, the input of the star-rating pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTotals {
    pub name: String,
    pub club: String,
    pub price: i64,
    pub points: i64,
    pub games_played: i64,
    pub events: BTreeMap<String, i64>,
}
