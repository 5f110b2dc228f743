use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{Player, PlayerStore, Position, StoreResult, Team};

pub const DEFAULT_TOP_CLUBS: usize = 7;

/// One fixture pairing. Deserializes from `["Home", "Away"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct Matchup {
    pub home: String,
    pub away: String,
}

impl Matchup {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
        }
    }
}

impl From<[String; 2]> for Matchup {
    fn from([home, away]: [String; 2]) -> Self {
        Self { home, away }
    }
}

impl From<Matchup> for [String; 2] {
    fn from(matchup: Matchup) -> Self {
        [matchup.home, matchup.away]
    }
}

/// Shifts club attack/defend ratings by each matchup. The home side moves
/// first with a +1 edge; the away side then reacts to the updated home
/// ratings with a -1 handicap. Pairings naming an unknown club are skipped.
pub fn apply_matchups(teams: &mut [Team], matchups: &[Matchup]) -> usize {
    let mut applied = 0;
    for matchup in matchups {
        let home = teams.iter().position(|team| team.name == matchup.home);
        let away = teams.iter().position(|team| team.name == matchup.away);
        let (Some(home), Some(away)) = (home, away) else {
            warn!(
                target: "predict",
                home = %matchup.home,
                away = %matchup.away,
                "matchup names an unknown club"
            );
            continue;
        };
        if home == away {
            continue;
        }

        let (attack, defend) = (teams[away].attack, teams[away].defend);
        let host = &mut teams[home];
        let form = (host.overall / 2.0).floor();
        host.attack += host.attack - defend + 1.0 + form;
        host.defend += host.defend - attack + 1.0 + form;

        let (attack, defend) = (teams[home].attack, teams[home].defend);
        let visitor = &mut teams[away];
        let form = (visitor.overall / 2.0).floor();
        visitor.attack += visitor.attack - defend - 1.0 + form;
        visitor.defend += visitor.defend - attack - 1.0 + form;
        applied += 1;
    }
    applied
}

/// The `n` strongest attacking clubs and the `n` strongest defending clubs.
/// Equal ratings keep name order.
pub fn top_clubs(teams: &[Team], n: usize) -> (Vec<String>, Vec<String>) {
    let ranked = |key: fn(&Team) -> f64| {
        let mut order: Vec<&Team> = teams.iter().collect();
        order.sort_by(|a, b| {
            key(*b)
                .partial_cmp(&key(*a))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        order
            .into_iter()
            .take(n)
            .map(|team| team.name.clone())
            .collect::<Vec<_>>()
    };
    (ranked(|team| team.attack), ranked(|team| team.defend))
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictedPool {
    pub attacking_clubs: Vec<String>,
    pub defending_clubs: Vec<String>,
    pub players: Vec<Player>,
}

/// Candidate pool for a fixture: midfielders and forwards of the top
/// attacking clubs plus goalkeepers and defenders of the top defending ones.
pub fn predict_pool(
    store: &dyn PlayerStore,
    mut teams: Vec<Team>,
    matchups: &[Matchup],
    top: usize,
) -> StoreResult<PredictedPool> {
    let applied = apply_matchups(&mut teams, matchups);
    let (attacking_clubs, defending_clubs) = top_clubs(&teams, top);
    debug!(
        target: "predict",
        applied,
        attacking = ?attacking_clubs,
        defending = ?defending_clubs,
        "clubs ranked"
    );

    let mut players = Vec::new();
    for club in &attacking_clubs {
        for position in [Position::Midfielder, Position::Forward] {
            players.extend(store.get_players_by_position_and_club(position, club)?);
        }
    }
    for club in &defending_clubs {
        for position in [Position::Goalkeeper, Position::Defender] {
            players.extend(store.get_players_by_position_and_club(position, club)?);
        }
    }
    info!(
        target: "predict",
        matchups = matchups.len(),
        applied,
        pool = players.len(),
        "candidate pool assembled"
    );
    Ok(PredictedPool {
        attacking_clubs,
        defending_clubs,
        players,
    })
}
