use serde::Serialize;
use tracing::info;

use crate::config::RatingsSection;
use crate::store::PlayerTotals;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRating {
    pub name: String,
    pub overall: f64,
    pub stars: u8,
}

/// Weighted season score. Players without a game score zero.
pub fn overall_score(totals: &PlayerTotals, weights: &RatingsSection) -> f64 {
    if totals.games_played <= 0 {
        return 0.0;
    }
    let events: f64 = totals
        .events
        .iter()
        .map(|(event, quantity)| {
            *quantity as f64 * weights.event_weights.get(event).copied().unwrap_or(0.0)
        })
        .sum();
    events
        + totals.games_played as f64 * weights.games_played_weight
        + totals.points as f64 * weights.points_weight
        + totals.price as f64 * weights.price_weight
}

/// Linear-interpolated percentile of an ascending slice.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let fraction = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * fraction)
}

/// Star ratings from percentile thresholds over the scores of players who
/// played. Clearing none of `n` thresholds is 1 star and each threshold
/// cleared adds one, capped at 5.
pub fn rate_players(totals: &[PlayerTotals], weights: &RatingsSection) -> Vec<PlayerRating> {
    let scored: Vec<(&PlayerTotals, f64)> = totals
        .iter()
        .map(|player| (player, overall_score(player, weights)))
        .collect();

    let mut played: Vec<f64> = scored
        .iter()
        .filter(|(player, _)| player.games_played > 0)
        .map(|(_, score)| *score)
        .collect();
    played.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let thresholds: Vec<f64> = weights
        .percentiles
        .iter()
        .filter_map(|pct| percentile(&played, *pct))
        .collect();

    let ratings: Vec<PlayerRating> = scored
        .into_iter()
        .map(|(player, overall)| {
            let above = thresholds
                .iter()
                .position(|threshold| overall >= *threshold)
                .unwrap_or(thresholds.len());
            let stars = (thresholds.len() + 1 - above).clamp(1, 5) as u8;
            PlayerRating {
                name: player.name.clone(),
                overall,
                stars,
            }
        })
        .collect();
    info!(
        target: "ratings",
        players = ratings.len(),
        played = played.len(),
        thresholds = ?thresholds,
        "ratings computed"
    );
    ratings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn totals(name: &str, games: i64, points: i64) -> PlayerTotals {
        PlayerTotals {
            name: name.to_string(),
            club: "A".to_string(),
            price: 0,
            points,
            games_played: games,
            events: BTreeMap::new(),
        }
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 25.0), Some(2.0));
        assert!((percentile(&values, 95.0).unwrap() - 4.8).abs() < 1e-9);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn overall_score_weights_events_and_totals() {
        let mut player = totals("a", 10, 40);
        player.price = 10;
        player.events.insert("Goals".to_string(), 3);
        let mut weights = RatingsSection::default();
        weights.event_weights.insert("Goals".to_string(), 2.0);
        assert!((overall_score(&player, &weights) - (6.0 + 2.0 + 40.0 + 3.0)).abs() < 1e-9);
        assert_eq!(overall_score(&totals("b", 0, 40), &weights), 0.0);
    }

    #[test]
    fn stars_follow_percentile_bands() {
        let players: Vec<PlayerTotals> = (1..=20)
            .map(|i| totals(&format!("p{i}"), 1, i * 10))
            .chain(std::iter::once(totals("bench", 0, 500)))
            .collect();
        let ratings = rate_players(&players, &RatingsSection::default());
        let stars: BTreeMap<&str, u8> = ratings.iter().map(|r| (r.name.as_str(), r.stars)).collect();
        assert_eq!(stars["p20"], 5);
        assert_eq!(stars["p18"], 4);
        assert_eq!(stars["p12"], 3);
        assert_eq!(stars["p6"], 2);
        assert_eq!(stars["p1"], 1);
        assert_eq!(stars["bench"], 1);
    }

    #[test]
    fn shorter_percentile_lists_still_start_at_one_star() {
        let players: Vec<PlayerTotals> =
            (1..=20).map(|i| totals(&format!("p{i}"), 1, i * 10)).collect();
        let weights = RatingsSection {
            percentiles: vec![90.0, 50.0, 10.0],
            ..RatingsSection::default()
        };
        let ratings = rate_players(&players, &weights);
        let stars: BTreeMap<&str, u8> = ratings.iter().map(|r| (r.name.as_str(), r.stars)).collect();
        assert_eq!(stars["p20"], 4);
        assert_eq!(stars["p12"], 3);
        assert_eq!(stars["p5"], 2);
        assert_eq!(stars["p1"], 1);
    }
}
