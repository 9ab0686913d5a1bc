//! Variant calling at a single position.

use crate::config::FullSeqParams;
use crate::variants::{PackedVariant, MAX_QUALITY};
use bit_set::BitSet;
use itertools::Itertools;

/// A call at one position for one branch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Variant {
    pub state: PackedVariant,
    pub reads: BitSet,
    /// Number of reads voting for this variant.
    pub n_significant: usize,
}

impl Variant {
    fn absent(reads: &BitSet) -> Self {
        Variant {
            state: PackedVariant::ABSENT,
            reads: reads.clone(),
            n_significant: 0,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.state.is_absent()
    }
}

pub(crate) struct VariantCaller<'a> {
    pub params: &'a FullSeqParams,
    /// Summed quality below which no variant is significant, derived from
    /// the clonotype count.
    pub required_minimal_sum_quality: u64,
}

impl VariantCaller<'_> {
    /// Call variants in `column` among `reads`. Returns a single absent
    /// variant when there is nothing to call.
    pub fn call(&self, column: &[PackedVariant], reads: &BitSet) -> Vec<Variant> {
        let params = self.params;
        let mut unassigned = BitSet::new();
        let mut observed = Vec::new();
        let mut total: u64 = 0;
        for read in reads.iter() {
            let state = column[read];
            if state.is_absent() {
                unassigned.insert(read);
            } else {
                total += u64::from(state.quality());
                observed.push((state, read));
            }
        }
        if observed.is_empty() {
            return vec![Variant::absent(reads)];
        }
        observed.sort_by_key(|&(state, read)| (state.id(), read));

        let mut variants = Vec::new();
        let mut best: Option<(u32, u64)> = None;
        for (id, group) in &observed.iter().group_by(|(state, _)| state.id()) {
            let group: Vec<_> = group.collect();
            let sum: u64 = group.iter().map(|(s, _)| u64::from(s.quality())).sum();
            let trusted = group.iter().filter(|(s, _)| s.is_trusted()).count();

            let significant = trusted as f64 / group.len() as f64 >= params.minimal_non_edge_points_fraction
                && sum >= self.required_minimal_sum_quality
                && ((sum >= params.branching_minimal_sum_quality
                    && sum as f64 >= params.branching_minimal_quality_share * total as f64)
                    || sum >= params.decisive_branching_sum_quality_threshold);

            if significant {
                variants.push(Variant {
                    state: PackedVariant::new(id, sum.min(u64::from(MAX_QUALITY)) as u8, true),
                    reads: group.iter().map(|&&(_, read)| read).collect(),
                    n_significant: group.len(),
                });
            } else {
                unassigned.extend(group.iter().map(|&&(_, read)| read));
                if best.map_or(true, |(_, best_sum)| sum > best_sum) {
                    best = Some((id, sum));
                }
            }
        }

        if !variants.is_empty() {
            for variant in &mut variants {
                variant.reads.union_with(&unassigned);
            }
            return variants;
        }

        // Nothing significant: fall back to the best supported variant if it
        // meets the output criteria.
        let Some((id, best_sum)) = best else {
            return vec![Variant::absent(reads)];
        };
        if (best_sum as f64) < params.output_minimal_quality_share * total as f64
            || best_sum < params.output_minimal_sum_quality
        {
            return vec![Variant::absent(reads)];
        }
        let p = 1.0 - best_sum as f64 / total as f64;
        let phred = if p == 0.0 {
            best_sum
        } else {
            ((-10.0 * p.log10()) as u64).min(best_sum)
        };
        vec![Variant {
            state: PackedVariant::new(id, phred.min(u64::from(MAX_QUALITY)) as u8, true),
            reads: reads.clone(),
            n_significant: 1,
        }]
    }
}
