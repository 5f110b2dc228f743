use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::predict::{Matchup, DEFAULT_TOP_CLUBS};
use crate::squad::{PositionBounds, SquadRules};
use crate::store::Position;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SquadConfig {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub rules: RulesSection,
    #[serde(default)]
    pub enumeration: EnumerationSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub ratings: RatingsSection,
    #[serde(default)]
    pub predict: PredictSection,
}

impl SquadConfig {
    /// Validates every section that can hold out-of-range values.
    pub fn validate(&self) -> Result<()> {
        self.rules()?;
        self.search.validate()?;
        Ok(())
    }

    /// Builds the validated squad rules described by `[rules]`.
    pub fn rules(&self) -> Result<SquadRules> {
        let mut positions = BTreeMap::new();
        for (key, [min, max]) in &self.rules.positions {
            let position = parse_position(key)?;
            positions.insert(position, PositionBounds::new(*min, *max));
        }
        let rules = SquadRules {
            squad_size: self.rules.squad_size,
            budget: self.rules.budget,
            min_budget: self.rules.min_budget,
            max_per_club: self.rules.max_players_per_team,
            positions,
        };
        rules.validate().map_err(ConfigError::Invalid)?;
        Ok(rules)
    }

    /// Fixed per-position counts used by the feasibility enumerator.
    pub fn enumeration_counts(&self) -> Result<BTreeMap<Position, usize>> {
        self.enumeration
            .counts
            .iter()
            .map(|(key, count)| Ok((parse_position(key)?, *count)))
            .collect()
    }

    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.data_dir).join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.database)
    }

    /// Archive file holding the accepted squads of one period.
    pub fn archive_path(&self, period: &str) -> PathBuf {
        self.resolve_path(&self.paths.archive_dir)
            .join(format!("{period}.json"))
    }
}

fn parse_position(key: &str) -> Result<Position> {
    key.parse::<Position>()
        .map_err(|err| ConfigError::Invalid(err.to_string()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub data_dir: String,
    pub database: String,
    pub archive_dir: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            database: "players.sqlite".to_string(),
            archive_dir: "best_teams".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    pub budget: i64,
    pub min_budget: i64,
    pub squad_size: usize,
    pub max_players_per_team: usize,
    pub max_substitutions: usize,
    pub positions: BTreeMap<String, [usize; 2]>,
}

impl Default for RulesSection {
    fn default() -> Self {
        let positions = [("GK", [1, 1]), ("CB", [3, 5]), ("MD", [3, 5]), ("FW", [1, 3])]
            .into_iter()
            .map(|(key, bounds)| (key.to_string(), bounds))
            .collect();
        Self {
            budget: 108,
            min_budget: 0,
            squad_size: 11,
            max_players_per_team: 2,
            max_substitutions: 3,
            positions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnumerationSection {
    pub min_points: i64,
    pub counts: BTreeMap<String, usize>,
}

impl Default for EnumerationSection {
    fn default() -> Self {
        let counts = [("GK", 1), ("CB", 4), ("MD", 4), ("FW", 2)]
            .into_iter()
            .map(|(key, count)| (key.to_string(), count))
            .collect();
        Self {
            min_points: 0,
            counts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_probability: f64,
    pub seed: u64,
    pub max_build_attempts: usize,
    pub budget_jitter: i64,
}

impl SearchSection {
    pub fn validate(&self) -> Result<()> {
        let probability = self.mutation_probability;
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::Invalid(format!(
                "search.mutation_probability {probability} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 10,
            mutation_probability: 0.2,
            seed: 42,
            max_build_attempts: 25,
            budget_jitter: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatingsSection {
    pub percentiles: Vec<f64>,
    pub games_played_weight: f64,
    pub points_weight: f64,
    pub price_weight: f64,
    pub event_weights: BTreeMap<String, f64>,
}

impl Default for RatingsSection {
    fn default() -> Self {
        Self {
            percentiles: vec![95.0, 85.0, 55.0, 25.0],
            games_played_weight: 0.2,
            points_weight: 1.0,
            price_weight: 0.3,
            event_weights: BTreeMap::new(),
        }
    }
}

/// Club pairings per fixture feeding the matchup-based pool prediction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictSection {
    pub top_clubs: usize,
    pub matchups: BTreeMap<String, Vec<Matchup>>,
}

impl Default for PredictSection {
    fn default() -> Self {
        Self {
            top_clubs: DEFAULT_TOP_CLUBS,
            matchups: BTreeMap::new(),
        }
    }
}

impl PredictSection {
    pub fn matchups(&self, fixture: &str) -> Option<&[Matchup]> {
        self.matchups.get(fixture).map(Vec::as_slice)
    }
}

pub fn load_squad_config<P: AsRef<Path>>(path: P) -> Result<SquadConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
