//! Nucleotide alignment scoring schemes.

use serde::{Deserialize, Serialize};

/// Scoring with a fixed penalty per gapped base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearGapScoring {
    pub match_score: i32,
    pub mismatch: i32,
    pub gap_penalty: i32,
}

impl Default for LinearGapScoring {
    fn default() -> Self {
        LinearGapScoring {
            match_score: 5,
            mismatch: -9,
            gap_penalty: -12,
        }
    }
}

impl LinearGapScoring {
    /// Score of aligning two letters. Ambiguous letters score zero.
    pub fn substitution(&self, a: u8, b: u8) -> i32 {
        if crate::is_wildcard(a) || crate::is_wildcard(b) {
            0
        } else if a.eq_ignore_ascii_case(&b) {
            self.match_score
        } else {
            self.mismatch
        }
    }
}

/// Scoring with separate gap open and gap extension penalties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineGapScoring {
    pub match_score: i32,
    pub mismatch: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for AffineGapScoring {
    fn default() -> Self {
        AffineGapScoring {
            match_score: 10,
            mismatch: -19,
            gap_open: -62,
            gap_extend: -11,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlignmentScoring {
    Linear(LinearGapScoring),
    Affine(AffineGapScoring),
}

impl Default for AlignmentScoring {
    fn default() -> Self {
        AlignmentScoring::Linear(LinearGapScoring::default())
    }
}

impl AlignmentScoring {
    pub fn as_linear(&self) -> Option<&LinearGapScoring> {
        match self {
            AlignmentScoring::Linear(s) => Some(s),
            AlignmentScoring::Affine(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution() {
        let s = LinearGapScoring::default();
        assert_eq!(s.substitution(b'A', b'a'), 5);
        assert_eq!(s.substitution(b'A', b'C'), -9);
        assert_eq!(s.substitution(b'N', b'C'), 0);
    }

    #[test]
    fn test_scoring_serde() {
        let json = r#"{"type":"linear","match_score":4,"mismatch":-5,"gap_penalty":-8}"#;
        let scoring: AlignmentScoring = serde_json::from_str(json).unwrap();
        assert_eq!(
            scoring.as_linear(),
            Some(&LinearGapScoring {
                match_score: 4,
                mismatch: -5,
                gap_penalty: -8
            })
        );
        let affine = AlignmentScoring::Affine(AffineGapScoring::default());
        assert_eq!(affine.as_linear(), None);
        let back: AlignmentScoring =
            serde_json::from_str(&serde_json::to_string(&affine).unwrap()).unwrap();
        assert_eq!(back, affine);
    }
}
