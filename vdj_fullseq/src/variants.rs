//! Observed sub-sequences and their compact per-read encoding.

use std::collections::HashMap;
use std::fmt;
use vdj_align::{nucleotide_code, NUCLEOTIDES};

/// Id of the empty sub-sequence, i.e. a deleted position.
pub const EMPTY_VARIANT_ID: u32 = NUCLEOTIDES.len() as u32;

/// Largest id a variant can take.
pub const MAX_VARIANT_ID: u32 = 0xFF_FFFE;

pub const MAX_QUALITY: u8 = 0x7F;

const TRUSTED_BIT: u32 = 0x80;

/// One read's observation at one position: a variant id, a quality in
/// `0..=127`, and a flag telling whether the observation may drive
/// branching. Packed as `id << 8 | trusted << 7 | quality`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedVariant(u32);

impl PackedVariant {
    /// No observation.
    pub const ABSENT: PackedVariant = PackedVariant(u32::MAX);

    pub fn new(id: u32, quality: u8, trusted: bool) -> Self {
        assert!(id <= MAX_VARIANT_ID, "variant id {id} out of range");
        let trusted = if trusted { TRUSTED_BIT } else { 0 };
        PackedVariant(id << 8 | trusted | u32::from(quality.min(MAX_QUALITY)))
    }

    pub fn is_absent(self) -> bool {
        self == PackedVariant::ABSENT
    }

    /// Variant id. Not meaningful for [`PackedVariant::ABSENT`].
    pub fn id(self) -> u32 {
        self.0 >> 8
    }

    pub fn quality(self) -> u8 {
        (self.0 & u32::from(MAX_QUALITY)) as u8
    }

    pub fn is_trusted(self) -> bool {
        self.0 & TRUSTED_BIT != 0
    }
}

impl fmt::Debug for PackedVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absent() {
            write!(f, "Absent")
        } else {
            write!(
                f,
                "Variant({}, q{}{})",
                self.id(),
                self.quality(),
                if self.is_trusted() { "" } else { ", edge" }
            )
        }
    }
}

/// Bidirectional mapping between observed sub-sequences and variant ids.
/// Single letters take their nucleotide code as id, the empty sequence takes
/// [`EMPTY_VARIANT_ID`], and longer sequences are numbered on first sight.
#[derive(Debug, Clone)]
pub struct VariantDictionary {
    sequences: Vec<Vec<u8>>,
    ids: HashMap<Vec<u8>, u32>,
}

impl Default for VariantDictionary {
    fn default() -> Self {
        let mut sequences: Vec<Vec<u8>> = NUCLEOTIDES.iter().map(|&b| vec![b]).collect();
        sequences.push(Vec::new());
        VariantDictionary {
            sequences,
            ids: HashMap::new(),
        }
    }
}

impl VariantDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for(&mut self, seq: &[u8]) -> u32 {
        match seq {
            [] => EMPTY_VARIANT_ID,
            // unknown letters are read as N
            [b] => u32::from(nucleotide_code(*b).unwrap_or(4)),
            _ => {
                let seq = seq.to_ascii_uppercase();
                if let Some(&id) = self.ids.get(&seq) {
                    return id;
                }
                let id = self.sequences.len() as u32;
                self.sequences.push(seq.clone());
                self.ids.insert(seq, id);
                id
            }
        }
    }

    /// # Panics
    ///
    /// If `id` was not handed out by this dictionary.
    pub fn sequence(&self, id: u32) -> &[u8] {
        &self.sequences[id as usize]
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
