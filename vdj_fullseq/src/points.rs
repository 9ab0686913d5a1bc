//! Conversion of read alignments into per-position observations on the
//! global axis.

use crate::clonotype::{Gene, ReadAlignments};
use crate::config::FullSeqParams;
use crate::coords::{CoordinateGrid, N_LEFT_DUMMIES};
use crate::variants::MAX_QUALITY;
use std::cmp::Reverse;
use std::ops::Range;
use vdj_align::{Alignment, SeqWithQuality};
use vdj_types::VdjRegion;

/// The bases a read shows at one global position. Empty for a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PointSequence {
    pub position: usize,
    pub bases: Vec<u8>,
    pub quality: u8,
    pub trusted: bool,
}

pub(crate) struct PointExtractor<'a> {
    pub grid: &'a CoordinateGrid,
    pub params: &'a FullSeqParams,
    pub v_gene: &'a Gene,
    pub j_gene: &'a Gene,
}

impl PointExtractor<'_> {
    /// Observations of one read, at most one per position. When targets
    /// overlap, the higher quality observation wins.
    pub fn extract(&self, read: &ReadAlignments) -> Vec<PointSequence> {
        let mut points = Vec::new();
        for target in 0..read.targets.len() {
            self.extract_target(read, target, &mut points);
        }
        points.sort_by_key(|p| (p.position, Reverse(p.quality)));
        points.dedup_by_key(|p| p.position);
        points
    }

    fn extract_target(&self, read: &ReadAlignments, target: usize, out: &mut Vec<PointSequence>) {
        let grid = self.grid;
        let aligned_only = self.params.aligned_regions_only;
        let seq = &read.targets[target];
        let anchors = read.anchors(target);

        let v_alignment = read
            .hit_for_gene(VdjRegion::V, &self.v_gene.name)
            .and_then(|h| h.alignment(target))
            .filter(|al| al.ref_range().start <= grid.length_v)
            .map(Alignment::shift_indels_left);
        let j_alignment = read
            .hit_for_gene(VdjRegion::J, &self.j_gene.name)
            .and_then(|h| h.alignment(target))
            .filter(|al| al.ref_range().end >= grid.j_offset)
            .map(Alignment::shift_indels_left);

        let v_start = |al: &Alignment| if aligned_only { al.read_range().start } else { 0 };
        match (anchors.clonal_begin, &v_alignment) {
            (Some(left_stop), Some(al)) if grid.has_v => {
                self.by_alignment(out, al, seq, v_start(al)..left_stop, N_LEFT_DUMMIES as isize);
            }
            (Some(left_stop), _) if !aligned_only => {
                let shift = grid.cf_begin() as isize - left_stop as isize;
                self.ungapped(out, seq, 0..left_stop, shift);
            }
            (None, Some(al)) if grid.has_v => {
                self.by_alignment(
                    out,
                    al,
                    seq,
                    v_start(al)..al.read_range().end,
                    N_LEFT_DUMMIES as isize,
                );
            }
            _ => {}
        }

        let j_end = |al: &Alignment| {
            if aligned_only {
                al.read_range().end
            } else {
                seq.len()
            }
        };
        match (anchors.clonal_end, &j_alignment) {
            (Some(right_start), Some(al)) if grid.has_j => {
                self.by_alignment(out, al, seq, right_start..j_end(al), grid.j_shift());
            }
            (Some(right_start), _) if !aligned_only => {
                let shift = grid.cf_end() as isize - right_start as isize;
                self.ungapped(out, seq, right_start..seq.len(), shift);
            }
            (None, Some(al)) if grid.has_j => {
                self.by_alignment(
                    out,
                    al,
                    seq,
                    al.read_range().start..j_end(al),
                    grid.j_shift(),
                );
            }
            _ => {}
        }
    }

    /// Emit points for `seq_range` of the read. Bases covered by the alignment
    /// are placed by their reference position plus `offset`; bases outside it
    /// are placed ungapped relative to the nearest alignment end.
    fn by_alignment(
        &self,
        out: &mut Vec<PointSequence>,
        alignment: &Alignment,
        seq: &SeqWithQuality,
        seq_range: Range<usize>,
        offset: isize,
    ) {
        let seq_range = seq_range.start..seq_range.end.min(seq.len());
        let aligned = alignment.read_range();
        let overlap = aligned.start.max(seq_range.start)..aligned.end.min(seq_range.end);
        if overlap.start > overlap.end {
            return;
        }
        let ref_range = alignment.ref_range();

        let shift = offset + ref_range.start as isize - aligned.start as isize;
        for i in seq_range.start..overlap.start {
            self.push(out, i as isize + shift, seq, i..i + 1, &aligned);
        }

        let read_ranges = alignment.read_ranges();
        for r in alignment.ref_range_within(&overlap) {
            let rr = read_ranges[r - ref_range.start].clone();
            self.push(out, r as isize + offset, seq, rr, &aligned);
        }

        let shift = offset + ref_range.end as isize - aligned.end as isize;
        for i in overlap.end..seq_range.end {
            self.push(out, i as isize + shift, seq, i..i + 1, &aligned);
        }
    }

    fn ungapped(&self, out: &mut Vec<PointSequence>, seq: &SeqWithQuality, seq_range: Range<usize>, shift: isize) {
        let seq_range = seq_range.start..seq_range.end.min(seq.len());
        for i in seq_range.clone() {
            self.push(out, i as isize + shift, seq, i..i + 1, &seq_range);
        }
    }

    fn push(
        &self,
        out: &mut Vec<PointSequence>,
        position: isize,
        seq: &SeqWithQuality,
        range: Range<usize>,
        aligned: &Range<usize>,
    ) {
        if position < 0 || self.grid.in_clonal_feature(position as usize) {
            return;
        }
        let position = position as usize;
        let qual = seq.qual();
        let quality = if range.is_empty() {
            // deletion: average of the flanking bases
            let left = range.start.checked_sub(1).map(|i| qual[i]);
            let right = qual.get(range.start).copied();
            match (left, right) {
                (Some(l), Some(r)) => ((u16::from(l) + u16::from(r)) / 2) as u8,
                (Some(q), None) | (None, Some(q)) => q,
                (None, None) => 0,
            }
        } else {
            qual[range.clone()].iter().copied().min().unwrap_or(0)
        };

        let params = self.params;
        let len = seq.len();
        let near_right_edge = len.saturating_sub(aligned.end) < params.aligned_sequence_edge_delta
            && len - range.end <= params.alignment_edge_region_size;
        let near_left_edge = aligned.start < params.aligned_sequence_edge_delta
            && range.start <= params.alignment_edge_region_size;
        let trusted = self.grid.in_sub_cloning_region(position) && !near_right_edge && !near_left_edge;

        out.push(PointSequence {
            position,
            bases: seq.seq()[range].to_vec(),
            quality: quality.min(MAX_QUALITY),
            trusted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clonotype::{Hit, TargetAnchors};
    use std::sync::Arc;
    use vdj_align::Mutation;
    use vdj_types::{GeneFeature, ReferencePoint};

    struct Fixture {
        v: Arc<Gene>,
        j: Arc<Gene>,
        grid: CoordinateGrid,
    }

    const V_SEQ: &[u8] = b"ACGTTGCAAGCTTGACCATGGTACCAGTTC";
    const J_SEQ: &[u8] = b"GATCGGCTAACTGGTCACCGTCTCCTCAGG";

    fn fixture(sub_cloning: Option<&GeneFeature>) -> Fixture {
        let v = Arc::new(Gene::new(
            "V1",
            VdjRegion::V,
            V_SEQ,
            &[(ReferencePoint::VBegin, 0), (ReferencePoint::CDR3Begin, 20)],
        ));
        let j = Arc::new(Gene::new(
            "J1",
            VdjRegion::J,
            J_SEQ,
            &[(ReferencePoint::CDR3End, 10), (ReferencePoint::FR4End, 30)],
        ));
        let grid = CoordinateGrid::new(&GeneFeature::cdr3(), 12, &v, &j, sub_cloning);
        Fixture { v, j, grid }
    }

    fn hit(gene: &Arc<Gene>, al: Alignment) -> Hit {
        Hit {
            gene: gene.clone(),
            score: 50.0,
            alignments: vec![Some(al)],
        }
    }

    // V[0..20] + 12 clonal bases + J[10..30]
    fn read(f: &Fixture, mutations: Vec<Mutation>) -> ReadAlignments {
        let cf = b"TGTGCCAGCAGC";
        let v_al = Alignment::new(f.v.sequence.clone(), mutations, 0..20, 0..20, 100);
        let mut seq = v_al.aligned_read();
        let cf_begin = seq.len();
        seq.extend_from_slice(cf);
        let cf_end = seq.len();
        seq.extend_from_slice(&J_SEQ[10..]);
        let read_len = seq.len();
        let v_al = Alignment::new(f.v.sequence.clone(), v_al.mutations().to_vec(), 0..20, 0..cf_begin, 100);
        let j_al = Alignment::new(f.j.sequence.clone(), vec![], 10..30, cf_end..read_len, 100);
        let mut read = ReadAlignments {
            targets: vec![SeqWithQuality::with_quality(seq, 30)],
            anchors: vec![TargetAnchors {
                clonal_begin: Some(cf_begin),
                clonal_end: Some(cf_end),
            }],
            ..ReadAlignments::default()
        };
        read.hits.insert(VdjRegion::V, vec![hit(&f.v, v_al)]);
        read.hits.insert(VdjRegion::J, vec![hit(&f.j, j_al)]);
        read
    }

    fn extractor<'a>(f: &'a Fixture, params: &'a FullSeqParams) -> PointExtractor<'a> {
        PointExtractor {
            grid: &f.grid,
            params,
            v_gene: &f.v,
            j_gene: &f.j,
        }
    }

    #[test]
    fn test_exact_read() {
        let f = fixture(None);
        let params = FullSeqParams::default();
        let points = extractor(&f, &params).extract(&read(&f, vec![]));
        assert_eq!(points.len(), 40);
        assert_eq!(points[0].position, 1024);
        assert_eq!(points[0].bases, b"A");
        assert_eq!(points[19].position, 1043);
        // the clonal feature is skipped
        assert_eq!(points[20].position, f.grid.cf_end());
        assert_eq!(points[20].bases, &J_SEQ[10..11]);
        assert_eq!(points[39].position, f.grid.cf_end() + 19);
        // edge windows are untrusted
        assert!(!points[0].trusted);
        assert!(!points[7].trusted);
        assert!(points[8].trusted);
        assert!(points[31].trusted);
        assert!(!points[32].trusted);
        assert!(points.iter().all(|p| p.quality == 30));
    }

    #[test]
    fn test_deletion_and_insertion() {
        let f = fixture(None);
        let params = FullSeqParams::default();
        // V_SEQ[10] = 'C' deleted, 'A' inserted between V_SEQ[14] = 'A' and V_SEQ[15] = 'C'
        let read = read(
            &f,
            vec![
                Mutation::Deletion { pos: 10, from: b'C' },
                Mutation::Insertion { pos: 15, to: b'A' },
            ],
        );
        let points = extractor(&f, &params).extract(&read);
        assert_eq!(points.len(), 40);
        let at = |pos: usize| points.iter().find(|p| p.position == pos).unwrap();
        assert_eq!(at(1034).bases, b"");
        assert_eq!(at(1034).quality, 30);
        // the insertion is moved to the left end of the A run
        assert_eq!(at(1037).bases, b"G");
        assert_eq!(at(1038).bases, b"AA");
        assert_eq!(at(1039).bases, b"C");
    }

    #[test]
    fn test_foreign_gene_falls_back_to_ungapped() {
        let f = fixture(None);
        let params = FullSeqParams::default();
        let mut read = read(&f, vec![]);
        let other = Arc::new(Gene::new("V2", VdjRegion::V, V_SEQ, &[]));
        let al = read.hits[&VdjRegion::V][0].alignments[0].clone().unwrap();
        read.hits.insert(VdjRegion::V, vec![hit(&other, al)]);
        let points = extractor(&f, &params).extract(&read);
        assert_eq!(points.len(), 40);
        assert_eq!(points[0].position, 1024);
        assert_eq!(points[19].position, 1043);

        let aligned_only = FullSeqParams {
            aligned_regions_only: true,
            ..FullSeqParams::default()
        };
        let points = extractor(&f, &aligned_only).extract(&read);
        assert_eq!(points.len(), 20);
        assert_eq!(points[0].position, f.grid.cf_end());
    }

    #[test]
    fn test_sub_cloning_region_trust() {
        let f = fixture(Some(&GeneFeature::cdr3()));
        let params = FullSeqParams::default();
        let points = extractor(&f, &params).extract(&read(&f, vec![]));
        assert!(points.iter().all(|p| !p.trusted));
    }

    #[test]
    fn test_overlapping_targets_keep_best_quality() {
        let f = fixture(None);
        let params = FullSeqParams::default();
        let mut read = read(&f, vec![]);
        let seq = read.targets[0].seq().to_vec();
        read.targets.push(SeqWithQuality::with_quality(seq, 35));
        read.anchors.push(read.anchors[0]);
        for hits in read.hits.values_mut() {
            let al = hits[0].alignments[0].clone();
            hits[0].alignments.push(al);
        }
        let points = extractor(&f, &params).extract(&read);
        assert_eq!(points.len(), 40);
        assert!(points.iter().all(|p| p.quality == 35));
    }
}
