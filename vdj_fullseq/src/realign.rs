//! Realignment of assembled contigs against the V and J genes, and
//! construction of the output clonotype.

use crate::clonotype::{Clonotype, Hit};
use crate::coords::{CoordinateGrid, N_LEFT_DUMMIES};
use crate::errors::FullSeqError;
use crate::reassemble::BranchSequences;
use crate::report::FullSeqReport;
use std::collections::BTreeMap;
use std::ops::Range;
use vdj_align::{align, Alignment, AlignmentMode, LinearGapScoring};
use vdj_types::VdjRegion;

pub(crate) struct Realigner<'a> {
    pub grid: &'a CoordinateGrid,
    pub clonotype: &'a Clonotype,
    pub v_hit: &'a Hit,
    pub j_hit: &'a Hit,
    pub v_scoring: LinearGapScoring,
    pub j_scoring: LinearGapScoring,
    /// Let the left end of the first contig slide along V.
    pub v_floating_left: bool,
    /// Let the right end of the last contig slide along J.
    pub j_floating_right: bool,
}

/// Reference range and mode for a segment whose global range ends at or
/// before the start of the clonal feature.
fn v_segment(from: usize, to: usize, floating: bool) -> (Range<usize>, AlignmentMode) {
    if from < N_LEFT_DUMMIES {
        (
            0..to - N_LEFT_DUMMIES,
            AlignmentMode::SemiLocalFromRight {
                to_reference_end: !floating,
            },
        )
    } else if floating {
        (
            from - N_LEFT_DUMMIES..to - N_LEFT_DUMMIES,
            AlignmentMode::SemiLocalFromRight {
                to_reference_end: false,
            },
        )
    } else {
        (from - N_LEFT_DUMMIES..to - N_LEFT_DUMMIES, AlignmentMode::Global)
    }
}

/// Mirror of [`v_segment`] for a segment starting at or after the end of the
/// clonal feature.
fn j_segment(grid: &CoordinateGrid, from: usize, to: usize, floating: bool) -> (Range<usize>, AlignmentMode) {
    let cf_end = grid.cf_end();
    let start = grid.j_offset + (from - cf_end);
    if to >= cf_end + grid.j_length {
        (
            start..grid.j_offset + grid.j_length,
            AlignmentMode::SemiLocalFromLeft {
                to_reference_end: !floating,
            },
        )
    } else if floating {
        (
            start..start + (to - from),
            AlignmentMode::SemiLocalFromLeft {
                to_reference_end: false,
            },
        )
    } else {
        (start..start + (to - from), AlignmentMode::Global)
    }
}

impl Realigner<'_> {
    pub fn build(&self, branch: &BranchSequences, report: &mut FullSeqReport) -> Result<Clonotype, FullSeqError> {
        let grid = self.grid;
        let (cf_begin, cf_end) = (grid.cf_begin(), grid.cf_end());
        let n_contigs = branch.contigs.len();
        let mut v_alignments: Vec<Option<Alignment>> = vec![None; n_contigs];
        let mut j_alignments: Vec<Option<Alignment>> = vec![None; n_contigs];
        let v_reference = &self.v_hit.gene.sequence;
        let j_reference = &self.j_hit.gene.sequence;

        for (i, contig) in branch.contigs.iter().enumerate() {
            let seq = contig.seq.seq();
            let (from, to) = (contig.range.start, contig.range.end);
            let v_floating = self.v_floating_left && i == 0;
            let j_floating = self.j_floating_right && i + 1 == n_contigs;

            if i == branch.cf_target {
                let cf_offset = branch.cf_offset;
                let cf_read_end = cf_offset + grid.cf_length;

                let clonal_v = self.v_hit.alignment(0).map(|al| al.moved(cf_offset));
                let v_flank = (grid.has_v && cf_offset > 0).then(|| {
                    let (ref_range, mode) = v_segment(from, cf_begin, v_floating);
                    align(&self.v_scoring, v_reference, ref_range, seq, 0..cf_offset, mode)
                });
                v_alignments[i] = match (v_flank, clonal_v) {
                    (Some(flank), Some(clonal)) => Some(flank.concat(&clonal)?),
                    (flank, clonal) => flank.or(clonal),
                };

                let clonal_j = self.j_hit.alignment(0).map(|al| al.moved(cf_offset));
                let j_flank = (grid.has_j && cf_read_end < seq.len()).then(|| {
                    let (ref_range, mode) = j_segment(grid, cf_end, to, j_floating);
                    align(&self.j_scoring, j_reference, ref_range, seq, cf_read_end..seq.len(), mode)
                });
                j_alignments[i] = match (clonal_j, j_flank) {
                    (Some(clonal), Some(flank)) => Some(clonal.concat(&flank)?),
                    (clonal, flank) => clonal.or(flank),
                };
            } else if to <= cf_begin {
                if !grid.has_v || to <= N_LEFT_DUMMIES {
                    continue;
                }
                let (ref_range, mode) = v_segment(from, to, v_floating);
                v_alignments[i] =
                    Some(align(&self.v_scoring, v_reference, ref_range, seq, 0..seq.len(), mode));
            } else if from >= cf_end {
                if !grid.has_j || from >= cf_end + grid.j_length {
                    continue;
                }
                let (ref_range, mode) = j_segment(grid, from, to, j_floating);
                j_alignments[i] =
                    Some(align(&self.j_scoring, j_reference, ref_range, seq, 0..seq.len(), mode));
            } else {
                return Err(FullSeqError::InvariantViolation(format!(
                    "contig {:?} crosses the clonal feature {:?} but does not hold it",
                    contig.range,
                    cf_begin..cf_end
                )));
            }
        }

        let mut hits = BTreeMap::new();
        for (&region, region_hits) in &self.clonotype.hits {
            let rebuilt = match region {
                VdjRegion::V => {
                    let alignments = std::mem::take(&mut v_alignments);
                    self.rebuild_hits(region, region_hits, self.v_hit, alignments, branch, report)?
                }
                VdjRegion::J => {
                    let alignments = std::mem::take(&mut j_alignments);
                    self.rebuild_hits(region, region_hits, self.j_hit, alignments, branch, report)?
                }
                VdjRegion::D | VdjRegion::C => region_hits
                    .iter()
                    .map(|hit| relocate(hit, branch))
                    .collect::<Result<Vec<_>, _>>()?,
            };
            hits.insert(region, rebuilt);
        }

        Ok(Clonotype {
            count: branch.weight,
            assembling_features: self.clonotype.assembling_features.clone(),
            targets: branch.contigs.iter().map(|c| c.seq.clone()).collect(),
            hits,
        })
    }

    /// Put the realigned alignments into the hit of the base gene and
    /// relocate the others. A base gene that is not the top hit is promoted
    /// above it.
    fn rebuild_hits(
        &self,
        region: VdjRegion,
        hits: &[Hit],
        base: &Hit,
        alignments: Vec<Option<Alignment>>,
        branch: &BranchSequences,
        report: &mut FullSeqReport,
    ) -> Result<Vec<Hit>, FullSeqError> {
        let index = hits
            .iter()
            .position(|h| h.gene.name == base.gene.name)
            .ok_or_else(|| {
                FullSeqError::InvariantViolation(format!(
                    "{region} gene {} is missing from the clonotype hits",
                    base.gene.name
                ))
            })?;
        let mut rebuilt = hits
            .iter()
            .map(|hit| relocate(hit, branch))
            .collect::<Result<Vec<_>, _>>()?;
        rebuilt[index].alignments = alignments;
        if index != 0 {
            report.on_hit_reorder(region);
            rebuilt[index].score = hits[0].score + 1.0;
            rebuilt.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        Ok(rebuilt)
    }
}

/// Move the single alignment of a clonotype hit onto the contig holding the
/// clonal feature.
fn relocate(hit: &Hit, branch: &BranchSequences) -> Result<Hit, FullSeqError> {
    if hit.alignments.len() != 1 {
        return Err(FullSeqError::MalformedClonotype(format!(
            "hit {} has {} alignments, expected one",
            hit.gene.name,
            hit.alignments.len()
        )));
    }
    let mut alignments = vec![None; branch.contigs.len()];
    alignments[branch.cf_target] = hit.alignments[0].as_ref().map(|al| al.moved(branch.cf_offset));
    Ok(Hit {
        gene: hit.gene.clone(),
        score: hit.score,
        alignments,
    })
}
