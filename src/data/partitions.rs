//! Enumeration of partitions obtained by hiding causal features

use rand::{rngs::StdRng, seq::index};
use tracing::debug;

use crate::{Error, Result, types::FeaturePartition};

/// Every partition obtained by moving `n_drops` causal features into the
/// unobserved block.
///
/// Combinations are produced in lexicographic order over causal positions.
/// Dropped features are appended to `unobserved` in their causal order; the
/// effect block never changes. `n_drops = 0` yields the input partition alone.
///
/// # Errors
///
/// Returns [`Error::TooManyDrops`] unless at least one causal feature stays
/// observed, that is when `n_drops >= |causal|`.
pub fn generate_partitions_for_feature_drops(
    partition: &FeaturePartition,
    n_drops: usize,
) -> Result<Vec<FeaturePartition>> {
    let causal = partition.causal();
    if n_drops >= causal.len() {
        return Err(Error::TooManyDrops {
            n_drops,
            available: causal.len(),
        });
    }

    let mut partitions = Vec::new();
    for dropped in combinations(causal.len(), n_drops) {
        let kept: Vec<usize> = causal
            .iter()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, &c)| c)
            .collect();
        let mut unobserved = partition.unobserved().to_vec();
        unobserved.extend(dropped.iter().map(|&i| causal[i]));
        partitions.push(FeaturePartition::new(
            kept,
            partition.effect().to_vec(),
            unobserved,
            partition.total_dim(),
        )?);
    }
    debug!(n_drops, count = partitions.len(), "generated feature-drop partitions");
    Ok(partitions)
}

/// At most `max` partitions: all of them in order when they fit, otherwise a
/// sample without replacement drawn from `rng`.
pub fn sample_partitions(
    partitions: Vec<FeaturePartition>,
    max: usize,
    rng: &mut StdRng,
) -> Vec<FeaturePartition> {
    if partitions.len() <= max {
        return partitions;
    }
    let chosen = index::sample(rng, partitions.len(), max).into_vec();
    chosen.into_iter().map(|i| partitions[i].clone()).collect()
}

/// `k`-subsets of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    if k > n {
        return out;
    }
    loop {
        out.push(current.clone());
        // rightmost position that can still advance
        let Some(pos) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return out;
        };
        current[pos] += 1;
        for j in pos + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn base() -> FeaturePartition {
        FeaturePartition::with_remaining_unobserved(vec![1, 8, 5], vec![2, 3], 15).unwrap()
    }

    #[test]
    fn combinations_are_lexicographic() {
        assert_eq!(
            combinations(4, 2),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(combinations(3, 0), vec![Vec::<usize>::new()]);
        assert_eq!(combinations(2, 2), vec![vec![0, 1]]);
    }

    #[test]
    fn zero_drops_returns_input() {
        let parts = generate_partitions_for_feature_drops(&base(), 0).unwrap();
        assert_eq!(parts, vec![base()]);
    }

    #[test]
    fn single_drop_moves_feature_to_unobserved() {
        let parts = generate_partitions_for_feature_drops(&base(), 1).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].causal(), &[8, 5]);
        assert_eq!(parts[0].unobserved().last(), Some(&1));
        assert_eq!(parts[2].causal(), &[1, 8]);
        assert!(parts.iter().all(|p| p.effect() == [2, 3]));
    }

    #[test]
    fn too_many_drops_is_a_configuration_error() {
        let err = generate_partitions_for_feature_drops(&base(), 4).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyDrops {
                n_drops: 4,
                available: 3
            }
        ));
        // at least one causal feature must stay observed
        let err = generate_partitions_for_feature_drops(&base(), 3).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyDrops {
                n_drops: 3,
                available: 3
            }
        ));
        assert!(err.is_configuration());
        assert_eq!(generate_partitions_for_feature_drops(&base(), 2).unwrap().len(), 3);
    }

    #[test]
    fn sampling_caps_and_is_seeded() {
        let parts = generate_partitions_for_feature_drops(&base(), 1).unwrap();
        let all = sample_partitions(parts.clone(), 30, &mut StdRng::seed_from_u64(0));
        assert_eq!(all, parts);
        let a = sample_partitions(parts.clone(), 2, &mut StdRng::seed_from_u64(7));
        let b = sample_partitions(parts, 2, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
    }
}
