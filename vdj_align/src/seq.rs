//! Nucleotide sequences carrying per-base quality scores.

use std::ops::Range;

/// Nucleotide letters, including IUPAC ambiguity codes. The index of a letter in
/// this table is its code; codes below 4 are the unambiguous bases.
pub const NUCLEOTIDES: &[u8; 15] = b"ACGTNRYSWKMBDHV";

/// Return the code of an (upper or lower case) nucleotide letter.
pub fn nucleotide_code(base: u8) -> Option<u8> {
    let upper = base.to_ascii_uppercase();
    NUCLEOTIDES
        .iter()
        .position(|&b| b == upper)
        .map(|p| p as u8)
}

/// True if the letter is an ambiguity code rather than one of A, C, G, T.
pub fn is_wildcard(base: u8) -> bool {
    nucleotide_code(base).map_or(true, |c| c >= 4)
}

/// A nucleotide sequence and its per-base quality scores.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SeqWithQuality {
    seq: Vec<u8>,
    qual: Vec<u8>,
}

impl SeqWithQuality {
    /// Create a sequence. Letters are upper-cased.
    ///
    /// # Panics
    ///
    /// If the sequence and quality lengths differ.
    pub fn new(seq: impl Into<Vec<u8>>, qual: impl Into<Vec<u8>>) -> Self {
        let mut seq = seq.into();
        let qual = qual.into();
        assert_eq!(seq.len(), qual.len(), "sequence and quality lengths differ");
        seq.make_ascii_uppercase();
        SeqWithQuality { seq, qual }
    }

    /// Create a sequence with the same quality at every base.
    pub fn with_quality(seq: impl Into<Vec<u8>>, quality: u8) -> Self {
        let seq = seq.into();
        let qual = vec![quality; seq.len()];
        SeqWithQuality::new(seq, qual)
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn qual(&self) -> &[u8] {
        &self.qual
    }

    /// Copy out a sub-range.
    pub fn slice(&self, range: Range<usize>) -> SeqWithQuality {
        SeqWithQuality {
            seq: self.seq[range.clone()].to_vec(),
            qual: self.qual[range].to_vec(),
        }
    }

    /// Lowest quality in the sequence, or None if it is empty.
    pub fn min_quality(&self) -> Option<u8> {
        self.qual.iter().copied().min()
    }

    /// Append another sequence.
    pub fn extend(&mut self, other: &SeqWithQuality) {
        self.seq.extend_from_slice(&other.seq);
        self.qual.extend_from_slice(&other.qual);
    }

    /// Append bases sharing one quality value.
    pub fn extend_with_quality(&mut self, seq: &[u8], quality: u8) {
        self.seq.extend(seq.iter().map(u8::to_ascii_uppercase));
        self.qual.extend(std::iter::repeat(quality).take(seq.len()));
    }

    /// Number of ambiguous letters.
    pub fn wildcard_count(&self) -> usize {
        self.seq.iter().filter(|&&b| is_wildcard(b)).count()
    }
}
