use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::squad::Squad;

pub const DEFAULT_MIN_COMMON: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerFrequency {
    pub name: String,
    pub count: usize,
}

/// How often each player appears across `squads`, most frequent first and
/// ties by name.
pub fn player_frequency(squads: &[Squad]) -> Vec<PlayerFrequency> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for squad in squads {
        for name in squad.names() {
            *counts.entry(name).or_default() += 1;
        }
    }
    let mut frequency: Vec<PlayerFrequency> = counts
        .into_iter()
        .map(|(name, count)| PlayerFrequency { name, count })
        .collect();
    frequency.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    frequency
}

/// Index of the first squad whose player set repeats an earlier one.
pub fn find_duplicate(squads: &[Squad]) -> Option<usize> {
    let mut seen: HashMap<BTreeSet<String>, usize> = HashMap::new();
    for (index, squad) in squads.iter().enumerate() {
        if seen.insert(squad.names(), index).is_some() {
            return Some(index);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SquadNode {
    pub index: usize,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SquadEdge {
    pub a: usize,
    pub b: usize,
    pub shared: Vec<String>,
}

/// Undirected graph linking squads that share at least `min_common` players.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimilarityGraph {
    pub min_common: usize,
    pub nodes: Vec<SquadNode>,
    pub edges: Vec<SquadEdge>,
}

impl SimilarityGraph {
    pub fn build(squads: &[Squad], min_common: usize) -> Self {
        let names: Vec<BTreeSet<String>> = squads.iter().map(Squad::names).collect();
        let nodes = squads
            .iter()
            .enumerate()
            .map(|(index, squad)| SquadNode {
                index,
                total_points: squad.total_points(),
            })
            .collect();
        let mut edges = Vec::new();
        for a in 0..names.len() {
            for b in (a + 1)..names.len() {
                let shared: Vec<String> = names[a].intersection(&names[b]).cloned().collect();
                if shared.len() >= min_common {
                    edges.push(SquadEdge { a, b, shared });
                }
            }
        }
        Self {
            min_common,
            nodes,
            edges,
        }
    }

    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter_map(|edge| {
                if edge.a == index {
                    Some(edge.b)
                } else if edge.b == index {
                    Some(edge.a)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn degree(&self, index: usize) -> usize {
        self.neighbors(index).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Player, Position};

    fn squad(names: &[&str]) -> Squad {
        Squad::new(
            names
                .iter()
                .map(|name| Player::new(*name, Position::Forward, "A", 5, 1))
                .collect(),
        )
    }

    #[test]
    fn frequency_sorts_by_count_then_name() {
        let squads = vec![squad(&["a", "b", "c"]), squad(&["b", "c"]), squad(&["c", "d"])];
        let frequency = player_frequency(&squads);
        let flat: Vec<_> = frequency.iter().map(|f| (f.name.as_str(), f.count)).collect();
        assert_eq!(flat, vec![("c", 3), ("b", 2), ("a", 1), ("d", 1)]);
    }

    #[test]
    fn graph_links_squads_with_enough_overlap() {
        let squads = vec![
            squad(&["a", "b", "c", "d"]),
            squad(&["a", "b", "c", "e"]),
            squad(&["a", "x", "y", "z"]),
        ];
        let graph = SimilarityGraph::build(&squads, DEFAULT_MIN_COMMON);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].shared, vec!["a", "b", "c"]);
        assert_eq!(graph.neighbors(1), vec![0]);
        assert_eq!(graph.degree(2), 0);
        assert_eq!(graph.nodes[0].total_points, 4);
    }

    #[test]
    fn duplicate_found_by_name_set() {
        let squads = vec![squad(&["a", "b"]), squad(&["c", "d"]), squad(&["b", "a"])];
        assert_eq!(find_duplicate(&squads), Some(2));
        assert_eq!(find_duplicate(&squads[..2]), None);
    }
}
