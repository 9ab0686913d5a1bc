//! Turning the calls of a branch back into contiguous sequences.

use crate::branches::Branch;
use crate::config::QualityTrimmingParams;
use crate::coords::CoordinateGrid;
use crate::errors::FullSeqError;
use crate::trim::{all_islands, islands_from_initial_range};
use crate::variants::VariantDictionary;
use std::ops::Range;
use vdj_align::SeqWithQuality;

/// A contiguous stretch of the global axis and the bases called over it.
/// `seq` may be longer or shorter than `range` because of indels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Contig {
    pub range: Range<usize>,
    pub seq: SeqWithQuality,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BranchSequences {
    pub weight: f64,
    /// Ordered by position on the global axis.
    pub contigs: Vec<Contig>,
    /// Index of the contig holding the clonal feature.
    pub cf_target: usize,
    /// Offset of the clonal feature within that contig.
    pub cf_offset: usize,
}

// A contig under construction, with the global position of each of its bases.
struct Block {
    range: Range<usize>,
    seq: SeqWithQuality,
    positions: Vec<usize>,
}

impl Block {
    fn push_call(&mut self, position: usize, bases: &[u8], quality: u8) {
        self.seq.extend_with_quality(bases, quality);
        self.positions.extend(std::iter::repeat(position).take(bases.len()));
    }

    fn append(&mut self, other: Block) {
        self.seq.extend(&other.seq);
        self.positions.extend(other.positions);
        self.range.end = other.range.end;
    }

    // The part of the block covering `bases`, a range of base indices.
    fn cut(&self, bases: Range<usize>) -> Block {
        let start = if bases.start == 0 {
            self.range.start
        } else {
            self.positions[bases.start]
        };
        let end = if bases.end == self.seq.len() {
            self.range.end
        } else {
            self.positions[bases.end - 1] + 1
        };
        Block {
            range: start..end,
            seq: self.seq.slice(bases.clone()),
            positions: self.positions[bases].to_vec(),
        }
    }
}

pub(crate) fn reassemble(
    branch: &Branch,
    points: &[usize],
    dictionary: &VariantDictionary,
    grid: &CoordinateGrid,
    clonal_feature: &SeqWithQuality,
    trimming: Option<&QualityTrimmingParams>,
    minimal_contig_length: usize,
) -> Result<BranchSequences, FullSeqError> {
    let mut calls: Vec<_> = points
        .iter()
        .copied()
        .zip(branch.states.iter().copied())
        .filter(|(_, state)| !state.is_absent())
        .collect();
    calls.sort_by_key(|&(position, _)| position);

    let mut blocks: Vec<Block> = Vec::new();
    for (position, state) in calls {
        let bases = dictionary.sequence(state.id());
        match blocks.last_mut() {
            Some(block) if block.range.end == position => {
                block.range.end += 1;
                block.push_call(position, bases, state.quality());
            }
            _ => {
                let mut block = Block {
                    range: position..position + 1,
                    seq: SeqWithQuality::default(),
                    positions: Vec::new(),
                };
                block.push_call(position, bases, state.quality());
                blocks.push(block);
            }
        }
    }

    let (cf_begin, cf_end) = (grid.cf_begin(), grid.cf_end());
    if let Some(block) = blocks
        .iter()
        .find(|b| b.range.start < cf_end && b.range.end > cf_begin)
    {
        return Err(FullSeqError::InvariantViolation(format!(
            "contig {:?} overlaps the clonal feature {:?}",
            block.range,
            cf_begin..cf_end
        )));
    }

    let clonal = Block {
        range: cf_begin..cf_end,
        seq: clonal_feature.clone(),
        positions: (0..clonal_feature.len())
            .map(|k| (cf_begin + k).min(cf_end.saturating_sub(1)))
            .collect(),
    };
    let left = blocks.iter().position(|b| b.range.end == cf_begin);
    let right = blocks.iter().position(|b| b.range.start == cf_end);
    let (cf_target, cf_offset) = match (left, right) {
        (Some(l), Some(r)) => {
            let right = blocks.remove(r);
            let block = &mut blocks[l];
            let offset = block.seq.len();
            block.append(clonal);
            block.append(right);
            (l, offset)
        }
        (Some(l), None) => {
            let block = &mut blocks[l];
            let offset = block.seq.len();
            block.append(clonal);
            (l, offset)
        }
        (None, Some(r)) => {
            let right = std::mem::replace(&mut blocks[r], clonal);
            blocks[r].append(right);
            (r, 0)
        }
        (None, None) => {
            let at = blocks.partition_point(|b| b.range.end <= cf_begin);
            blocks.insert(at, clonal);
            (at, 0)
        }
    };

    let (blocks, cf_target, cf_offset) = match trimming {
        Some(params) => trim_blocks(blocks, cf_target, cf_offset, clonal_feature.len(), params),
        None => (blocks, cf_target, cf_offset),
    };

    // drop short contigs, keeping the clonal feature
    let mut contigs = Vec::with_capacity(blocks.len());
    let mut new_cf_target = 0;
    for (i, block) in blocks.into_iter().enumerate() {
        if i == cf_target {
            new_cf_target = contigs.len();
        } else if block.seq.is_empty() || block.seq.len() < minimal_contig_length {
            continue;
        }
        contigs.push(Contig {
            range: block.range,
            seq: block.seq,
        });
    }

    Ok(BranchSequences {
        weight: branch.weight,
        contigs,
        cf_target: new_cf_target,
        cf_offset,
    })
}

/// Cut every block down to its good-quality islands. The block holding the
/// clonal feature keeps the feature whole in one of its pieces.
fn trim_blocks(
    blocks: Vec<Block>,
    cf_target: usize,
    cf_offset: usize,
    cf_len: usize,
    params: &QualityTrimmingParams,
) -> (Vec<Block>, usize, usize) {
    let mut trimmed = Vec::with_capacity(blocks.len());
    let (mut new_target, mut new_offset) = (0, cf_offset);
    for (i, block) in blocks.into_iter().enumerate() {
        if i != cf_target {
            let islands = all_islands(block.seq.qual(), params);
            trimmed.extend(islands.into_iter().map(|island| block.cut(island)));
            continue;
        }
        let cf = cf_offset..cf_offset + cf_len;
        for island in islands_from_initial_range(block.seq.qual(), params, cf.clone()) {
            if island.start <= cf.start && cf.end <= island.end {
                new_target = trimmed.len();
                new_offset = cf_offset - island.start;
            }
            trimmed.push(block.cut(island));
        }
    }
    (trimmed, new_target, new_offset)
}
