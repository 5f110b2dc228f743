use rand::distributions::Open01;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::squad::{Objective, ObjectiveKey};

/// Mixes a base seed with a stage label so each randomized stage gets its
/// own reproducible stream.
pub fn derive_seed(base: u64, salt: &str) -> u64 {
    // FNV-1a over the label, then a splitmix64 finalizer.
    let mut label: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in salt.as_bytes() {
        label ^= u64::from(*byte);
        label = label.wrapping_mul(0x0100_0000_01b3);
    }
    let mut z = base ^ label;
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Shorter-lived reborrow of an optional RNG, for passing it down a loop.
pub fn reborrow<'a>(rng: &'a mut Option<&mut dyn RngCore>) -> Option<&'a mut dyn RngCore> {
    match rng {
        Some(rng) => Some(&mut **rng),
        None => None,
    }
}

/// Draws a selection objective, half of the time blended with a different
/// secondary key at weight 0.5.
pub fn random_objective<R>(rng: &mut R) -> Objective
where
    R: Rng + ?Sized,
{
    let key = *ObjectiveKey::ALL
        .choose(rng)
        .unwrap_or(&ObjectiveKey::Points);
    if rng.gen_bool(0.5) {
        let others: Vec<ObjectiveKey> = ObjectiveKey::ALL
            .into_iter()
            .filter(|other| *other != key)
            .collect();
        if let Some(secondary) = others.choose(rng) {
            return Objective::blended(key, *secondary, 0.5);
        }
    }
    Objective::single(key)
}

/// Budget lowered by up to `jitter` units, never below `floor`.
pub fn jittered_budget<R>(budget: i64, jitter: i64, floor: i64, rng: &mut R) -> i64
where
    R: Rng + ?Sized,
{
    if jitter <= 0 {
        return budget;
    }
    (budget - rng.gen_range(0..=jitter)).max(floor)
}

/// Min-max normalized fitness values; a flat population maps to all ones.
pub fn normalize_fitness(fitness: &[i64]) -> Vec<f64> {
    let Some(min) = fitness.iter().min().copied() else {
        return Vec::new();
    };
    let max = fitness.iter().max().copied().unwrap_or(min);
    if max == min {
        return vec![1.0; fitness.len()];
    }
    let span = (max - min) as f64;
    fitness
        .iter()
        .map(|value| (value - min) as f64 / span)
        .collect()
}

/// Gumbel-max draw over normalized fitness, skipping `exclude`. Fitter plans
/// are favoured without starving the rest.
pub fn pick_partner<R>(fitness: &[i64], exclude: usize, rng: &mut R) -> Option<usize>
where
    R: Rng + ?Sized,
{
    normalize_fitness(fitness)
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| *idx != exclude)
        .map(|(idx, score)| {
            let u: f64 = rng.sample(Open01);
            (idx, score - (-u.ln()).ln())
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn derived_seeds_differ_per_stage() {
        assert_eq!(derive_seed(42, "search"), derive_seed(42, "search"));
        assert_ne!(derive_seed(42, "search"), derive_seed(42, "shuffle"));
        assert_ne!(derive_seed(42, "search"), derive_seed(43, "search"));
    }

    #[test]
    fn partner_draw_is_deterministic_and_skips_parent() {
        let fitness = vec![120, 80, 95, 60];
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let picks: Vec<_> = (0..20)
            .map(|_| pick_partner(&fitness, 0, &mut rng).unwrap())
            .collect();
        assert!(picks.iter().all(|idx| *idx != 0 && *idx < 4));

        let mut again = ChaCha20Rng::seed_from_u64(7);
        let replay: Vec<_> = (0..20)
            .map(|_| pick_partner(&fitness, 0, &mut again).unwrap())
            .collect();
        assert_eq!(picks, replay);
        assert_eq!(pick_partner(&[10], 0, &mut rng), None);
    }

    #[test]
    fn normalize_fitness_behaviour() {
        assert_eq!(normalize_fitness(&[10, 20, 30]), vec![0.0, 0.5, 1.0]);
        assert_eq!(normalize_fitness(&[5, 5]), vec![1.0, 1.0]);
        assert!(normalize_fitness(&[]).is_empty());
    }

    #[test]
    fn jitter_respects_floor() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..50 {
            let budget = jittered_budget(108, 6, 104, &mut rng);
            assert!((104..=108).contains(&budget));
        }
        assert_eq!(jittered_budget(108, 0, 0, &mut rng), 108);
    }

    #[test]
    fn random_objective_never_blends_a_key_with_itself() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..50 {
            let objective = random_objective(&mut rng);
            if let Some((secondary, weight)) = objective.secondary {
                assert_ne!(secondary, objective.key);
                assert_eq!(weight, 0.5);
            }
        }
    }
}
