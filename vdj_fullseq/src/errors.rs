use vdj_align::AlignmentError;
use vdj_types::VdjRegion;

/// Fatal conditions that abort the assembly of one clonotype.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum FullSeqError {
    #[error(
        "affine gap scoring is configured for {region} realignment, only linear gap scoring \
         is supported"
    )]
    UnsupportedScoring { region: VdjRegion },

    #[error("clonotype has no usable {region} hit: {reason}")]
    MissingReferenceHit { region: VdjRegion, reason: String },

    #[error("internal consistency check failed: {0}")]
    InvariantViolation(String),

    #[error("invalid assembler parameters: {0}")]
    InvalidParameters(String),

    #[error("malformed clonotype: {0}")]
    MalformedClonotype(String),
}

impl From<AlignmentError> for FullSeqError {
    fn from(err: AlignmentError) -> Self {
        FullSeqError::InvariantViolation(err.to_string())
    }
}
