//! Linear-gap alignment of a read segment against a reference segment, on top
//! of the rust-bio pairwise aligner.
//!
//! The read is the `x` sequence and the reference the `y` sequence of the
//! underlying aligner. Which ends may float is set through its clip penalties.

use crate::alignment::{Alignment, Mutation};
use crate::scoring::LinearGapScoring;
use bio::alignment::pairwise::{self, Scoring, MIN_SCORE};
use bio::alignment::AlignmentOperation;
use std::ops::Range;
use std::sync::Arc;

/// How the ends of the two segments are constrained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignmentMode {
    /// Both segments are consumed entirely.
    Global,
    /// Both segments start at their left ends. The right end of the read is
    /// free; with `to_reference_end` the reference is consumed entirely,
    /// otherwise its right end is free too.
    SemiLocalFromLeft { to_reference_end: bool },
    /// Mirror of `SemiLocalFromLeft`: both segments end at their right ends.
    SemiLocalFromRight { to_reference_end: bool },
}

impl AlignmentMode {
    // (read prefix, read suffix, reference prefix, reference suffix)
    fn clip_penalties(self) -> (i32, i32, i32, i32) {
        let reference_end = |to_reference_end: bool| if to_reference_end { MIN_SCORE } else { 0 };
        match self {
            AlignmentMode::Global => (MIN_SCORE, MIN_SCORE, MIN_SCORE, MIN_SCORE),
            AlignmentMode::SemiLocalFromLeft { to_reference_end } => {
                (MIN_SCORE, 0, MIN_SCORE, reference_end(to_reference_end))
            }
            AlignmentMode::SemiLocalFromRight { to_reference_end } => {
                (0, MIN_SCORE, reference_end(to_reference_end), MIN_SCORE)
            }
        }
    }

    fn consumes_whole_reference(self) -> bool {
        match self {
            AlignmentMode::Global => true,
            AlignmentMode::SemiLocalFromLeft { to_reference_end }
            | AlignmentMode::SemiLocalFromRight { to_reference_end } => to_reference_end,
        }
    }
}

/// Align `read[read_range]` against `reference[ref_range]`. The returned
/// alignment uses absolute coordinates of both sequences.
pub fn align(
    scoring: &LinearGapScoring,
    reference: &Arc<[u8]>,
    ref_range: Range<usize>,
    read: &[u8],
    read_range: Range<usize>,
    mode: AlignmentMode,
) -> Alignment {
    let ref_seg = &reference[ref_range.clone()];
    let read_seg = &read[read_range.clone()];

    if ref_seg.is_empty() || read_seg.is_empty() {
        return align_gap_only(scoring, reference, ref_range, read, read_range, mode);
    }

    let (xclip_prefix, xclip_suffix, yclip_prefix, yclip_suffix) = mode.clip_penalties();
    let mut bio_scoring = Scoring::new(0, scoring.gap_penalty, |a: u8, b: u8| {
        scoring.substitution(a, b)
    });
    bio_scoring.xclip_prefix = xclip_prefix;
    bio_scoring.xclip_suffix = xclip_suffix;
    bio_scoring.yclip_prefix = yclip_prefix;
    bio_scoring.yclip_suffix = yclip_suffix;
    let mut aligner =
        pairwise::Aligner::with_capacity_and_scoring(read_seg.len(), ref_seg.len(), bio_scoring);
    let al = aligner.custom(read_seg, ref_seg);

    let ref_aligned = ref_range.start + al.ystart..ref_range.start + al.yend;
    let read_aligned = read_range.start + al.xstart..read_range.start + al.xend;
    let mutations = mutations_from_ops(
        reference,
        read,
        ref_aligned.start,
        read_aligned.start,
        &al.operations,
    );
    Alignment::new(reference.clone(), mutations, ref_aligned, read_aligned, al.score)
}

// One of the segments is empty: whatever the mode forces to be consumed is
// gapped.
fn align_gap_only(
    scoring: &LinearGapScoring,
    reference: &Arc<[u8]>,
    ref_range: Range<usize>,
    read: &[u8],
    read_range: Range<usize>,
    mode: AlignmentMode,
) -> Alignment {
    let ref_aligned = if mode.consumes_whole_reference() {
        ref_range
    } else {
        match mode {
            AlignmentMode::SemiLocalFromRight { .. } => ref_range.end..ref_range.end,
            _ => ref_range.start..ref_range.start,
        }
    };
    let read_aligned = match mode {
        AlignmentMode::Global => read_range,
        AlignmentMode::SemiLocalFromLeft { .. } => read_range.start..read_range.start,
        AlignmentMode::SemiLocalFromRight { .. } => read_range.end..read_range.end,
    };
    let mut mutations: Vec<Mutation> = ref_aligned
        .clone()
        .map(|pos| Mutation::Deletion {
            pos,
            from: reference[pos],
        })
        .collect();
    mutations.extend(read_aligned.clone().map(|q| Mutation::Insertion {
        pos: ref_aligned.start,
        to: read[q],
    }));
    let score = scoring.gap_penalty * mutations.len() as i32;
    Alignment::new(reference.clone(), mutations, ref_aligned, read_aligned, score)
}

fn mutations_from_ops(
    reference: &[u8],
    read: &[u8],
    ref_start: usize,
    read_start: usize,
    ops: &[AlignmentOperation],
) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    let (mut r, mut q) = (ref_start, read_start);
    for op in ops {
        match op {
            // ranges already exclude the clipped ends
            AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
            AlignmentOperation::Match | AlignmentOperation::Subst => {
                if !reference[r].eq_ignore_ascii_case(&read[q]) {
                    mutations.push(Mutation::Substitution {
                        pos: r,
                        from: reference[r],
                        to: read[q],
                    });
                }
                r += 1;
                q += 1;
            }
            AlignmentOperation::Del => {
                mutations.push(Mutation::Deletion {
                    pos: r,
                    from: reference[r],
                });
                r += 1;
            }
            AlignmentOperation::Ins => {
                mutations.push(Mutation::Insertion { pos: r, to: read[q] });
                q += 1;
            }
        }
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn reference(s: &[u8]) -> Arc<[u8]> {
        Arc::from(s)
    }

    #[test]
    fn test_global_exact() {
        let r = reference(b"GGGACGTACGTAAA");
        let al = align(
            &LinearGapScoring::default(),
            &r,
            3..11,
            b"ACGTACGT",
            0..8,
            AlignmentMode::Global,
        );
        assert_eq!(al.ref_range(), 3..11);
        assert_eq!(al.read_range(), 0..8);
        assert!(al.mutations().is_empty());
        assert_eq!(al.score(), 40);
    }

    #[test]
    fn test_global_mutations() {
        let r = reference(b"ACGTACGTAC");
        // one substitution and one deleted base
        let read = b"ACCTACTAC";
        let al = align(
            &LinearGapScoring::default(),
            &r,
            0..10,
            read,
            0..9,
            AlignmentMode::Global,
        );
        assert_eq!(al.aligned_read(), read.to_vec());
        assert_eq!(
            al.mutations()
                .iter()
                .filter(|m| matches!(m, Mutation::Substitution { .. }))
                .count(),
            1
        );
        assert_eq!(
            al.mutations()
                .iter()
                .filter(|m| matches!(m, Mutation::Deletion { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_semi_local_from_right() {
        // read starts with junk that does not belong to the reference
        let r = reference(b"TTGCAGCATGCA");
        let read = b"CCCCCGCATGCA";
        let al = align(
            &LinearGapScoring::default(),
            &r,
            0..12,
            read,
            0..12,
            AlignmentMode::SemiLocalFromRight {
                to_reference_end: false,
            },
        );
        assert_eq!(al.ref_range().end, 12);
        assert_eq!(al.read_range().end, 12);
        assert!(al.ref_range().start >= 4);
        assert_eq!(al.aligned_read(), read[al.read_range()].to_vec());
    }

    #[test]
    fn test_semi_local_from_left_to_reference_end() {
        let r = reference(b"ACGTTGCA");
        let read = b"ACGTTGCAGGGGGG";
        let al = align(
            &LinearGapScoring::default(),
            &r,
            0..8,
            read,
            0..14,
            AlignmentMode::SemiLocalFromLeft {
                to_reference_end: true,
            },
        );
        assert_eq!(al.ref_range(), 0..8);
        assert_eq!(al.read_range(), 0..8);
        assert!(al.mutations().is_empty());
    }

    #[test]
    fn test_empty_segments() {
        let r = reference(b"ACGT");
        let al = align(
            &LinearGapScoring::default(),
            &r,
            2..2,
            b"AC",
            0..2,
            AlignmentMode::Global,
        );
        assert_eq!(al.ref_range(), 2..2);
        assert_eq!(al.mutations().len(), 2);
        assert_eq!(al.aligned_read(), b"AC".to_vec());

        let al = align(
            &LinearGapScoring::default(),
            &r,
            0..4,
            b"",
            0..0,
            AlignmentMode::SemiLocalFromRight {
                to_reference_end: false,
            },
        );
        assert_eq!(al.ref_range(), 4..4);
        assert_eq!(al.read_range(), 0..0);
    }

    #[test]
    fn test_global_insertion() {
        let r = reference(b"ACGTACGTAC");
        let read = b"ACGTACCGTAC";
        let al = align(
            &LinearGapScoring::default(),
            &r,
            0..10,
            read,
            0..11,
            AlignmentMode::Global,
        );
        assert_eq!(al.ref_range(), 0..10);
        assert_eq!(al.read_range(), 0..11);
        assert_eq!(al.mutations().len(), 1);
        assert!(matches!(al.mutations()[0], Mutation::Insertion { to: b'C', .. }));
        assert_eq!(al.score(), 10 * 5 - 12);
        assert_eq!(al.aligned_read(), read.to_vec());
    }

    #[test]
    fn test_semi_local_from_left_clips_read_tail() {
        let r = reference(b"TTACGTTGCAAG");
        let read = b"ACGTTGCTTTTTTTT";
        let al = align(
            &LinearGapScoring::default(),
            &r,
            2..12,
            read,
            0..15,
            AlignmentMode::SemiLocalFromLeft {
                to_reference_end: false,
            },
        );
        assert_eq!(al.ref_range(), 2..9);
        assert_eq!(al.read_range(), 0..7);
        assert!(al.mutations().is_empty());
        assert_eq!(al.score(), 35);
    }

    proptest! {
        #[test]
        fn prop_aligned_read_matches(
            ref_seq in "[ACGT]{0,40}",
            read_seq in "[ACGT]{0,40}",
        ) {
            let r = reference(ref_seq.as_bytes());
            let read = read_seq.as_bytes();
            for mode in [
                AlignmentMode::Global,
                AlignmentMode::SemiLocalFromLeft { to_reference_end: true },
                AlignmentMode::SemiLocalFromRight { to_reference_end: false },
            ] {
                let al = align(&LinearGapScoring::default(), &r, 0..r.len(), read, 0..read.len(), mode);
                prop_assert_eq!(al.aligned_read(), read[al.read_range()].to_vec());
            }
        }
    }
}
