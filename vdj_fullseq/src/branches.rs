//! Splitting a clonotype into branches and merging back the ones that are
//! not supported by a distinguishing variant.

use crate::caller::VariantCaller;
use crate::report::FullSeqReport;
use crate::variants::PackedVariant;
use bit_set::BitSet;
use std::collections::HashSet;

/// One reconstructed sub-variant of a clonotype. `states` holds one call per
/// row of the raw matrix.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Branch {
    pub weight: f64,
    pub states: Vec<PackedVariant>,
    pub reads: BitSet,
}

// Branch histories share prefixes, so they are stored as a tree of states
// referring to their parent by index.
struct StateNode {
    parent: Option<usize>,
    state: PackedVariant,
}

struct LiveBranch {
    weight: f64,
    reads: BitSet,
    tip: Option<usize>,
}

/// Walk the rows in order and split every branch on the significant
/// variants of each row. Weights are apportioned by the number of reads
/// voting for each variant.
pub(crate) fn enumerate_branches(
    rows: &[Vec<PackedVariant>],
    n_reads: usize,
    count: f64,
    caller: &VariantCaller<'_>,
) -> Vec<Branch> {
    let mut arena: Vec<StateNode> = Vec::new();
    let mut live = vec![LiveBranch {
        weight: count,
        reads: (0..n_reads).collect(),
        tip: None,
    }];

    for row in rows {
        let mut next = Vec::with_capacity(live.len());
        for branch in live {
            let variants = caller.call(row, &branch.reads);
            let sum_significant: usize = variants.iter().map(|v| v.n_significant).sum();
            for variant in variants {
                arena.push(StateNode {
                    parent: branch.tip,
                    state: variant.state,
                });
                let weight = if variant.is_absent() {
                    branch.weight
                } else {
                    branch.weight * variant.n_significant as f64 / sum_significant as f64
                };
                next.push(LiveBranch {
                    weight,
                    reads: variant.reads,
                    tip: Some(arena.len() - 1),
                });
            }
        }
        live = next;
    }

    live.into_iter()
        .map(|branch| {
            let mut states = Vec::with_capacity(rows.len());
            let mut node = branch.tip;
            while let Some(i) = node {
                states.push(arena[i].state);
                node = arena[i].parent;
            }
            states.reverse();
            Branch {
                weight: branch.weight,
                states,
                reads: branch.reads,
            }
        })
        .collect()
}

/// Sum of the lower quality over positions where the calls of the two
/// branches differ. A position called in only one of the branches counts with
/// the quality of that call.
fn distance(a: &Branch, b: &Branch) -> u64 {
    a.states
        .iter()
        .zip(&b.states)
        .map(|(x, y)| match (x.is_absent(), y.is_absent()) {
            (true, true) => 0,
            (true, false) => y.quality(),
            (false, true) => x.quality(),
            (false, false) if x.id() != y.id() => x.quality().min(y.quality()),
            (false, false) => 0,
        })
        .map(u64::from)
        .sum()
}

/// Drop branches that carry no variant unseen in a heavier branch, handing
/// their weight to the heavier branches in proportion to `10^(-Q/10)`, where
/// `Q` is the [`distance`] between the two. Total weight is preserved.
/// Returns the kept branches, heaviest first.
pub(crate) fn cluster_branches(mut branches: Vec<Branch>, report: &mut FullSeqReport) -> Vec<Branch> {
    branches.sort_by(|a, b| a.weight.total_cmp(&b.weight));
    let n_positions = branches.first().map_or(0, |b| b.states.len());
    let mut observed: Vec<HashSet<u32>> = vec![HashSet::new(); n_positions];
    let mut kept = vec![true; branches.len()];

    for i in (0..branches.len()).rev() {
        let brings_new_variant = branches[i]
            .states
            .iter()
            .zip(&observed)
            .any(|(s, seen)| !s.is_absent() && !seen.contains(&s.id()));
        let larger: Vec<(usize, u64)> = (i + 1..branches.len())
            .filter(|&j| kept[j])
            .map(|j| (j, distance(&branches[i], &branches[j])))
            .collect();

        if brings_new_variant || larger.is_empty() {
            for (s, seen) in branches[i].states.iter().zip(observed.iter_mut()) {
                if !s.is_absent() {
                    seen.insert(s.id());
                }
            }
            continue;
        }

        // normalize against the closest branch so the exponent stays in range
        let q_min = larger.iter().map(|&(_, q)| q).min().unwrap_or(0);
        let similarity: Vec<f64> = larger
            .iter()
            .map(|&(_, q)| 10f64.powf(-((q - q_min) as f64) / 10.0))
            .collect();
        let total: f64 = similarity.iter().sum();
        let weight = branches[i].weight;
        for (&(j, _), s) in larger.iter().zip(&similarity) {
            branches[j].weight += weight * s / total;
        }
        kept[i] = false;
        report.on_clustered(weight);
    }

    let mut result: Vec<Branch> = branches
        .into_iter()
        .zip(kept)
        .filter_map(|(b, k)| k.then_some(b))
        .collect();
    result.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FullSeqParams;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn v(id: u32, q: u8) -> PackedVariant {
        PackedVariant::new(id, q, true)
    }

    fn reads(ids: &[usize]) -> BitSet {
        ids.iter().copied().collect()
    }

    fn branch(weight: f64, states: &[PackedVariant]) -> Branch {
        Branch {
            weight,
            states: states.to_vec(),
            reads: BitSet::new(),
        }
    }

    #[test]
    fn test_enumerate_two_splits() {
        let params = FullSeqParams::default();
        let caller = VariantCaller {
            params: &params,
            required_minimal_sum_quality: 0,
        };
        let rows = vec![
            vec![v(0, 40), v(0, 40), v(0, 40), v(0, 40), v(1, 40), v(1, 40), v(1, 40), v(1, 40)],
            vec![v(2, 40), v(2, 40), v(3, 40), v(3, 40), v(2, 40), v(2, 40), v(3, 40), v(3, 40)],
            vec![PackedVariant::ABSENT; 8],
        ];
        let branches = enumerate_branches(&rows, 8, 100.0, &caller);
        assert_eq!(branches.len(), 4);
        for b in &branches {
            assert_eq!(b.weight, 25.0);
            assert_eq!(b.states.len(), 3);
            assert!(b.states[2].is_absent());
        }
        assert_eq!(branches[0].states[0].id(), 0);
        assert_eq!(branches[0].states[1].id(), 2);
        assert_eq!(branches[0].reads, reads(&[0, 1]));
        assert_eq!(branches[3].states[0].id(), 1);
        assert_eq!(branches[3].states[1].id(), 3);
        assert_eq!(branches[3].reads, reads(&[6, 7]));
    }

    #[test]
    fn test_enumerate_uneven_split() {
        let params = FullSeqParams::default();
        let caller = VariantCaller {
            params: &params,
            required_minimal_sum_quality: 0,
        };
        // three reads of 50 against one read of 120
        let rows = vec![vec![v(0, 50), v(0, 50), v(0, 50), v(1, 120)]];
        let branches = enumerate_branches(&rows, 4, 8.0, &caller);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].weight, 6.0);
        assert_eq!(branches[1].weight, 2.0);
    }

    #[test]
    fn test_enumerate_without_reads() {
        let params = FullSeqParams::default();
        let caller = VariantCaller {
            params: &params,
            required_minimal_sum_quality: 0,
        };
        let branches = enumerate_branches(&[], 0, 10.0, &caller);
        assert_eq!(branches, vec![branch(10.0, &[])]);
    }

    #[test]
    fn test_cluster_four_branches() {
        let q = 127;
        let branches = vec![
            branch(25.0, &[v(0, q), v(0, q)]),
            branch(25.0, &[v(0, q), v(1, q)]),
            branch(25.0, &[v(1, q), v(0, q)]),
            branch(25.0, &[v(1, q), v(1, q)]),
        ];
        let mut report = FullSeqReport::default();
        let result = cluster_branches(branches, &mut report);
        assert_eq!(result.len(), 3);
        let weights: Vec<f64> = result.iter().map(|b| b.weight).collect();
        assert!((weights[0] - 37.5).abs() < 1e-9);
        assert!((weights[1] - 37.5).abs() < 1e-9);
        assert!((weights[2] - 25.0).abs() < 1e-9);
        assert_eq!(result[2].states, vec![v(1, q), v(1, q)]);
        assert_eq!(report.clonotypes_clustered, 1);
        assert_eq!(report.reads_clustered, 25.0);
    }

    #[test]
    fn test_cluster_keeps_distinct_branches() {
        let branches = vec![
            branch(10.0, &[v(0, 30), PackedVariant::ABSENT]),
            branch(90.0, &[v(1, 30), v(2, 30)]),
        ];
        let mut report = FullSeqReport::default();
        let result = cluster_branches(branches, &mut report);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].weight, 90.0);
        assert_eq!(report.clonotypes_clustered, 0);
    }

    #[test]
    fn test_cluster_prefers_similar_branch() {
        // the light branch differs from A at one low-quality position and
        // from B at one high-quality position
        let branches = vec![
            branch(1.0, &[v(0, 10), v(1, 40)]),
            branch(50.0, &[v(2, 10), v(1, 40)]),
            branch(60.0, &[v(0, 10), v(3, 40)]),
        ];
        let mut report = FullSeqReport::default();
        let result = cluster_branches(branches, &mut report);
        assert_eq!(result.len(), 2);
        let share_a = 1.0 / (1.0 + 10f64.powf(-3.0));
        assert!((result[0].weight - (60.0 + 1.0 - share_a)).abs() < 1e-9);
        assert!((result[1].weight - (50.0 + share_a)).abs() < 1e-9);
    }

    #[test]
    fn test_distance_counts_one_sided_calls() {
        let a = branch(1.0, &[PackedVariant::ABSENT, v(5, 30), PackedVariant::ABSENT]);
        let b = branch(1.0, &[v(1, 40), v(5, 30), PackedVariant::ABSENT]);
        let c = branch(1.0, &[PackedVariant::ABSENT, v(6, 30), v(2, 20)]);
        assert_eq!(distance(&a, &b), 40);
        assert_eq!(distance(&b, &a), 40);
        assert_eq!(distance(&a, &c), 30 + 20);
        assert_eq!(distance(&a, &a), 0);
    }

    #[test]
    fn test_cluster_uncalled_position_separates_branches() {
        // the light branch is uncalled where A has a confident call, so A is
        // further away than B, which only disagrees at the second position
        let branches = vec![
            branch(1.0, &[PackedVariant::ABSENT, v(5, 30)]),
            branch(50.0, &[v(1, 40), v(5, 30)]),
            branch(60.0, &[PackedVariant::ABSENT, v(6, 30)]),
        ];
        let mut report = FullSeqReport::default();
        let result = cluster_branches(branches, &mut report);
        assert_eq!(result.len(), 2);
        let share_a = 0.1 / 1.1;
        assert!((result[0].weight - (60.0 + 1.0 - share_a)).abs() < 1e-9);
        assert!((result[1].weight - (50.0 + share_a)).abs() < 1e-9);
        assert_eq!(report.clonotypes_clustered, 1);
    }

    fn column(n_reads: usize) -> impl Strategy<Value = Vec<PackedVariant>> {
        proptest::collection::vec(
            proptest::option::weighted(0.8, (0u32..4, 0u8..=60, any::<bool>())),
            n_reads,
        )
        .prop_map(|cells| {
            cells
                .into_iter()
                .map(|c| c.map_or(PackedVariant::ABSENT, |(id, q, t)| PackedVariant::new(id, q, t)))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_enumeration_and_clustering_conserve_weight(
            (n_reads, rows) in (1usize..16).prop_flat_map(|n| (Just(n), proptest::collection::vec(column(n), 0..5))),
            count in 1.0f64..1000.0,
        ) {
            let params = FullSeqParams::default();
            let caller = VariantCaller { params: &params, required_minimal_sum_quality: 0 };
            let branches = enumerate_branches(&rows, n_reads, count, &caller);
            let total: f64 = branches.iter().map(|b| b.weight).sum();
            prop_assert!((total - count).abs() < 1e-6 * count);

            // every read stays in some branch
            let mut covered = BitSet::new();
            for b in &branches {
                covered.union_with(&b.reads);
            }
            prop_assert_eq!(covered.len(), n_reads);

            let mut report = FullSeqReport::default();
            let clustered = cluster_branches(branches, &mut report);
            let total: f64 = clustered.iter().map(|b| b.weight).sum();
            prop_assert!((total - count).abs() < 1e-6 * count);
            prop_assert!(clustered.windows(2).all(|w| w[0].weight >= w[1].weight));
        }

        #[test]
        fn prop_clustering_conserves_weight(
            branches in proptest::collection::vec(
                (0.01f64..100.0, proptest::collection::vec((0u32..3, 0u8..=127), 4)),
                1..12,
            )
        ) {
            let branches: Vec<Branch> = branches
                .into_iter()
                .map(|(w, states)| branch(w, &states.into_iter().map(|(id, q)| v(id, q)).collect::<Vec<_>>()))
                .collect();
            let before: f64 = branches.iter().map(|b| b.weight).sum();
            let mut report = FullSeqReport::default();
            let n = branches.len();
            let result = cluster_branches(branches, &mut report);
            let after: f64 = result.iter().map(|b| b.weight).sum();
            prop_assert!((before - after).abs() < 1e-9 * before);
            prop_assert_eq!(result.len() + report.clonotypes_clustered as usize, n);
        }
    }
}
