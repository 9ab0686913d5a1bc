//! The global coordinate axis shared by all reads of a clonotype.
//!
//! ```text
//!  N_LEFT_DUMMIES   cf_begin       cf_end
//!  ------|--------------|--------------|------------------------>
//!        ↓              ↓              ↓
//!  0000000vvvvvvvvvvvvvvCDR3CDR3CDR3CDR3jjjjjjjjjjjjjjjjCCCCCCCCC
//! ```
//!
//! V gene position `p` sits at `N_LEFT_DUMMIES + p`. The clonal feature
//! occupies `cf_begin..cf_end`, and J gene position `p` sits at
//! `cf_end - j_offset + p`.

use crate::clonotype::Gene;
use std::ops::Range;
use vdj_types::{GeneFeature, VdjRegion};

/// Number of positions to the left of the V gene start. Keeps positions of
/// read bases upstream of V non-negative.
pub const N_LEFT_DUMMIES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateGrid {
    pub has_v: bool,
    pub has_j: bool,
    /// Length of the V gene part upstream of the clonal feature.
    pub length_v: usize,
    /// Length of the clonal feature in the clonotype.
    pub cf_length: usize,
    /// Position of the clonal feature end within the J gene.
    pub j_offset: usize,
    /// Length of the J gene part downstream of the clonal feature.
    pub j_length: usize,
    sub_cloning_region: Option<Range<usize>>,
}

impl CoordinateGrid {
    /// `v_gene` must define the first point of `clonal_feature` if that point
    /// belongs to V, and likewise `j_gene` the last point if it belongs to J.
    /// The caller checks this.
    pub fn new(
        clonal_feature: &GeneFeature,
        cf_length: usize,
        v_gene: &Gene,
        j_gene: &Gene,
        sub_cloning_region: Option<&GeneFeature>,
    ) -> Self {
        let has_v = clonal_feature.first_point().region() == VdjRegion::V;
        let has_j = clonal_feature.last_point().region() == VdjRegion::J;
        let length_v = if has_v {
            v_gene.point(clonal_feature.first_point()).unwrap_or(0)
        } else {
            0
        };
        let (j_offset, j_length) = if has_j {
            let offset = j_gene.point(clonal_feature.last_point()).unwrap_or(0);
            (offset, j_gene.len().saturating_sub(offset))
        } else {
            (0, 0)
        };
        let mut grid = CoordinateGrid {
            has_v,
            has_j,
            length_v,
            cf_length,
            j_offset,
            j_length,
            sub_cloning_region: None,
        };
        grid.sub_cloning_region = sub_cloning_region.and_then(|region| {
            let (mut begin, mut end) = (None, None);
            // J defined positions take precedence
            if has_v {
                begin = v_gene.point(region.first_point()).map(|p| N_LEFT_DUMMIES + p);
                end = v_gene.point(region.last_point()).map(|p| N_LEFT_DUMMIES + p);
            }
            if has_j {
                let to_global = |p: usize| grid.j_position(p);
                begin = j_gene.point(region.first_point()).map(to_global).or(begin);
                end = j_gene.point(region.last_point()).map(to_global).or(end);
            }
            Some(begin?..end?)
        });
        grid
    }

    pub fn cf_begin(&self) -> usize {
        N_LEFT_DUMMIES + self.length_v
    }

    pub fn cf_end(&self) -> usize {
        self.cf_begin() + self.cf_length
    }

    pub fn v_position(&self, ref_pos: usize) -> usize {
        N_LEFT_DUMMIES + ref_pos
    }

    pub fn j_position(&self, ref_pos: usize) -> usize {
        self.cf_end() - self.j_offset + ref_pos
    }

    /// Global position minus read position for reads anchored at the J side.
    pub fn j_shift(&self) -> isize {
        self.cf_end() as isize - self.j_offset as isize
    }

    pub fn in_clonal_feature(&self, position: usize) -> bool {
        (self.cf_begin()..self.cf_end()).contains(&position)
    }

    /// Whether differences at this position may create branches. Without a
    /// configured sub-cloning region every position qualifies.
    pub fn in_sub_cloning_region(&self, position: usize) -> bool {
        self.sub_cloning_region
            .as_ref()
            .map_or(true, |r| r.contains(&position))
    }

    pub fn sub_cloning_region(&self) -> Option<Range<usize>> {
        self.sub_cloning_region.clone()
    }
}
