//! vdj_align
// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.
//!
//! Nucleotide sequences with qualities, alignments of read sequences against
//! germline gene references, and the pairwise aligner used to re-anchor
//! assembled contigs.

mod alignment;
pub mod pairwise;
mod scoring;
mod seq;

pub use alignment::{Alignment, AlignmentError, Mutation};
pub use pairwise::{align, AlignmentMode};
pub use scoring::{AffineGapScoring, AlignmentScoring, LinearGapScoring};
pub use seq::{is_wildcard, nucleotide_code, SeqWithQuality, NUCLEOTIDES};
