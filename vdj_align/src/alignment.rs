//! Alignment of a read segment against a gene reference, stored as a list of
//! point mutations relative to the reference.

use std::ops::Range;
use std::sync::Arc;

/// A single difference between the reference and the read. Positions are in
/// absolute reference coordinates. An insertion at `pos` places its base
/// immediately before reference position `pos`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    Substitution { pos: usize, from: u8, to: u8 },
    Deletion { pos: usize, from: u8 },
    Insertion { pos: usize, to: u8 },
}

impl Mutation {
    pub fn pos(&self) -> usize {
        match *self {
            Mutation::Substitution { pos, .. }
            | Mutation::Deletion { pos, .. }
            | Mutation::Insertion { pos, .. } => pos,
        }
    }

    // insertions at a position precede the substitution/deletion of that position
    fn sort_key(&self) -> (usize, u8) {
        match self {
            Mutation::Insertion { pos, .. } => (*pos, 0),
            Mutation::Substitution { pos, .. } | Mutation::Deletion { pos, .. } => (*pos, 1),
        }
    }

    fn is_indel(&self) -> bool {
        !matches!(self, Mutation::Substitution { .. })
    }

    fn with_pos(self, pos: usize) -> Mutation {
        match self {
            Mutation::Substitution { from, to, .. } => Mutation::Substitution { pos, from, to },
            Mutation::Deletion { from, .. } => Mutation::Deletion { pos, from },
            Mutation::Insertion { to, .. } => Mutation::Insertion { pos, to },
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AlignmentError {
    #[error("cannot concatenate alignments against different reference sequences")]
    DifferentReference,
    #[error(
        "cannot concatenate alignments: reference ranges {left_ref:?} / {right_ref:?} \
         and read ranges {left_read:?} / {right_read:?} do not adjoin"
    )]
    NotAdjacent {
        left_ref: Range<usize>,
        right_ref: Range<usize>,
        left_read: Range<usize>,
        right_read: Range<usize>,
    },
}

/// Alignment of `read_range` of some read against `ref_range` of a reference.
#[derive(Clone, Debug)]
pub struct Alignment {
    reference: Arc<[u8]>,
    mutations: Vec<Mutation>,
    ref_range: Range<usize>,
    read_range: Range<usize>,
    score: i32,
}

impl PartialEq for Alignment {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
            && self.mutations == other.mutations
            && self.ref_range == other.ref_range
            && self.read_range == other.read_range
            && self.score == other.score
    }
}

impl Alignment {
    /// Build an alignment. Mutations are put into canonical order.
    ///
    /// # Panics
    ///
    /// If the read range length is inconsistent with the reference range and
    /// the indels, or a mutation lies outside the reference range.
    pub fn new(
        reference: Arc<[u8]>,
        mut mutations: Vec<Mutation>,
        ref_range: Range<usize>,
        read_range: Range<usize>,
        score: i32,
    ) -> Self {
        mutations.sort_by_key(Mutation::sort_key);
        let (mut ins, mut del) = (0, 0);
        for m in &mutations {
            match m {
                Mutation::Insertion { pos, .. } => {
                    assert!(ref_range.start <= *pos && *pos <= ref_range.end);
                    ins += 1;
                }
                Mutation::Deletion { pos, .. } | Mutation::Substitution { pos, .. } => {
                    assert!(ref_range.contains(pos));
                    if matches!(m, Mutation::Deletion { .. }) {
                        del += 1;
                    }
                }
            }
        }
        assert!(ref_range.end <= reference.len());
        assert_eq!(ref_range.len() + ins - del, read_range.len());
        Alignment {
            reference,
            mutations,
            ref_range,
            read_range,
            score,
        }
    }

    pub fn reference(&self) -> &Arc<[u8]> {
        &self.reference
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn ref_range(&self) -> Range<usize> {
        self.ref_range.clone()
    }

    pub fn read_range(&self) -> Range<usize> {
        self.read_range.clone()
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    /// For every reference position in `ref_range`, the read range it maps to.
    /// Deleted positions map to an empty range; bases inserted before a
    /// reference position are included in that position's range.
    pub fn read_ranges(&self) -> Vec<Range<usize>> {
        let mut out = Vec::with_capacity(self.ref_range.len());
        let mut read = self.read_range.start;
        let mut muts = self.mutations.iter().peekable();
        for r in self.ref_range.clone() {
            let from = read;
            while let Some(Mutation::Insertion { pos, .. }) = muts.peek() {
                if *pos != r {
                    break;
                }
                read += 1;
                muts.next();
            }
            match muts.peek() {
                Some(Mutation::Deletion { pos, .. }) if *pos == r => {
                    muts.next();
                }
                Some(Mutation::Substitution { pos, .. }) if *pos == r => {
                    muts.next();
                    read += 1;
                }
                _ => read += 1,
            }
            out.push(from..read);
        }
        // bases inserted after the last reference position belong to it
        if let Some(last) = out.last_mut() {
            last.end = self.read_range.end;
        }
        out
    }

    /// Read position of reference position `ref_pos`, which may equal the end
    /// of the reference range. Returns None outside the alignment.
    pub fn read_position(&self, ref_pos: usize) -> Option<usize> {
        if ref_pos < self.ref_range.start || ref_pos > self.ref_range.end {
            return None;
        }
        if ref_pos == self.ref_range.end {
            return Some(self.read_range.end);
        }
        Some(self.read_ranges()[ref_pos - self.ref_range.start].start)
    }

    /// The reference positions whose read ranges lie within `read_range`.
    /// A deleted position sitting exactly on the right edge of `read_range`
    /// is excluded.
    pub fn ref_range_within(&self, read_range: &Range<usize>) -> Range<usize> {
        let ranges = self.read_ranges();
        let inside = |r: &Range<usize>| {
            read_range.start <= r.start
                && r.end <= read_range.end
                && !(r.is_empty() && r.start == read_range.end)
        };
        let first = ranges.iter().position(inside);
        let last = ranges.iter().rposition(inside);
        match (first, last) {
            (Some(first), Some(last)) => {
                self.ref_range.start + first..self.ref_range.start + last + 1
            }
            _ => self.ref_range.start..self.ref_range.start,
        }
    }

    /// Same alignment, with read coordinates shifted by `offset`.
    pub fn moved(&self, offset: usize) -> Alignment {
        Alignment {
            read_range: self.read_range.start + offset..self.read_range.end + offset,
            ..self.clone()
        }
    }

    /// Join two alignments that cover adjacent reference and read segments of
    /// the same reference.
    pub fn concat(&self, right: &Alignment) -> Result<Alignment, AlignmentError> {
        if !Arc::ptr_eq(&self.reference, &right.reference) && self.reference != right.reference {
            return Err(AlignmentError::DifferentReference);
        }
        if self.ref_range.end != right.ref_range.start
            || self.read_range.end != right.read_range.start
        {
            return Err(AlignmentError::NotAdjacent {
                left_ref: self.ref_range(),
                right_ref: right.ref_range(),
                left_read: self.read_range(),
                right_read: right.read_range(),
            });
        }
        let mut mutations = self.mutations.clone();
        mutations.extend_from_slice(&right.mutations);
        Ok(Alignment::new(
            self.reference.clone(),
            mutations,
            self.ref_range.start..right.ref_range.end,
            self.read_range.start..right.read_range.end,
            self.score + right.score,
        ))
    }

    /// Move single-base indels inside homopolymer runs to the leftmost
    /// equivalent position, so that equal reads yield equal mutation lists.
    pub fn shift_indels_left(&self) -> Alignment {
        let mut mutations = self.mutations.clone();
        for i in 0..mutations.len() {
            let m = mutations[i];
            if !m.is_indel() {
                continue;
            }
            let base = match m {
                Mutation::Deletion { from, .. } => from,
                Mutation::Insertion { to, .. } => to,
                Mutation::Substitution { .. } => unreachable!(),
            };
            let mut pos = m.pos();
            while pos > self.ref_range.start
                && self.reference[pos - 1].eq_ignore_ascii_case(&base)
                && !mutations
                    .iter()
                    .enumerate()
                    .any(|(j, o)| j != i && (o.pos() == pos - 1 || (o.pos() == pos && o.is_indel())))
            {
                pos -= 1;
            }
            mutations[i] = m.with_pos(pos);
        }
        Alignment::new(
            self.reference.clone(),
            mutations,
            self.ref_range(),
            self.read_range(),
            self.score,
        )
    }

    /// The read bases implied by the reference and the mutations.
    pub fn aligned_read(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.read_range.len());
        let mut muts = self.mutations.iter().peekable();
        for r in self.ref_range.clone() {
            while let Some(Mutation::Insertion { pos, to }) = muts.peek() {
                if *pos != r {
                    break;
                }
                out.push(*to);
                muts.next();
            }
            match muts.peek() {
                Some(Mutation::Deletion { pos, .. }) if *pos == r => {
                    muts.next();
                }
                Some(Mutation::Substitution { pos, to, .. }) if *pos == r => {
                    out.push(*to);
                    muts.next();
                }
                _ => out.push(self.reference[r]),
            }
        }
        for m in muts {
            if let Mutation::Insertion { to, .. } = m {
                out.push(*to);
            }
        }
        out
    }
}
