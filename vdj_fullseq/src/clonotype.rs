//! Clonotypes, read alignments and the germline genes they are aligned to.

use std::collections::BTreeMap;
use std::sync::Arc;
use vdj_align::{Alignment, SeqWithQuality};
use vdj_types::{GeneFeature, ReferencePoint, VdjRegion};

/// A germline gene. `sequence` is the reference that alignments against this
/// gene refer to, and `points` gives reference point positions within it.
#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    pub name: String,
    pub region: VdjRegion,
    pub sequence: Arc<[u8]>,
    points: BTreeMap<ReferencePoint, usize>,
}

impl Gene {
    pub fn new(
        name: impl Into<String>,
        region: VdjRegion,
        sequence: &[u8],
        points: &[(ReferencePoint, usize)],
    ) -> Self {
        Gene {
            name: name.into(),
            region,
            sequence: Arc::from(sequence),
            points: points.iter().copied().collect(),
        }
    }

    /// Position of a reference point within `sequence`, if the gene defines it.
    pub fn point(&self, point: ReferencePoint) -> Option<usize> {
        self.points.get(&point).copied()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// A gene hit with one optional alignment per target.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub gene: Arc<Gene>,
    pub score: f32,
    pub alignments: Vec<Option<Alignment>>,
}

impl Hit {
    pub fn alignment(&self, target: usize) -> Option<&Alignment> {
        self.alignments.get(target).and_then(Option::as_ref)
    }
}

/// Whether the gene of `hit` defines every reference point of `feature`
/// that belongs to the gene's region.
pub fn is_gene_compatible(hit: &Hit, feature: &GeneFeature) -> bool {
    let region = hit.gene.region;
    let mut points = feature
        .regions()
        .iter()
        .flat_map(|&(first, last)| [first, last])
        .filter(|p| p.region() == region)
        .peekable();
    points.peek().is_some() && points.all(|p| hit.gene.point(p).is_some())
}

/// Positions of the clonal feature boundaries within one read target, as
/// determined by the upstream aligner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetAnchors {
    /// Position of the first point of the clonal feature.
    pub clonal_begin: Option<usize>,
    /// Position just past the last point of the clonal feature.
    pub clonal_end: Option<usize>,
}

/// The alignments of one read (possibly several targets, e.g. paired mates).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadAlignments {
    pub targets: Vec<SeqWithQuality>,
    pub anchors: Vec<TargetAnchors>,
    pub hits: BTreeMap<VdjRegion, Vec<Hit>>,
}

impl ReadAlignments {
    /// The first hit against the named gene.
    pub fn hit_for_gene(&self, region: VdjRegion, gene: &str) -> Option<&Hit> {
        self.hits.get(&region)?.iter().find(|h| h.gene.name == gene)
    }

    pub fn anchors(&self, target: usize) -> TargetAnchors {
        self.anchors.get(target).copied().unwrap_or_default()
    }
}

/// A clonotype. Assembler input holds a single target with the clonal
/// feature; assembler output holds the assembled contigs.
#[derive(Debug, Clone, PartialEq)]
pub struct Clonotype {
    pub count: f64,
    pub assembling_features: Vec<GeneFeature>,
    pub targets: Vec<SeqWithQuality>,
    pub hits: BTreeMap<VdjRegion, Vec<Hit>>,
}

impl Clonotype {
    pub fn hits(&self, region: VdjRegion) -> &[Hit] {
        self.hits.get(&region).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn best_hit(&self, region: VdjRegion) -> Option<&Hit> {
        self.hits(region).first()
    }

    /// Total length of all targets.
    pub fn contig_length(&self) -> usize {
        self.targets.iter().map(SeqWithQuality::len).sum()
    }

    pub fn wildcard_count(&self) -> usize {
        self.targets.iter().map(SeqWithQuality::wildcard_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(region: VdjRegion, points: &[(ReferencePoint, usize)]) -> Hit {
        Hit {
            gene: Arc::new(Gene::new("G", region, b"ACGTACGTAC", points)),
            score: 100.0,
            alignments: vec![None],
        }
    }

    #[test]
    fn test_gene_compatibility() {
        let cdr3 = GeneFeature::cdr3();
        let v = hit(
            VdjRegion::V,
            &[(ReferencePoint::CDR3Begin, 4), (ReferencePoint::VEnd, 10)],
        );
        assert!(is_gene_compatible(&v, &cdr3));
        let v = hit(VdjRegion::V, &[(ReferencePoint::VEnd, 10)]);
        assert!(!is_gene_compatible(&v, &cdr3));
        let j = hit(VdjRegion::J, &[(ReferencePoint::CDR3End, 3)]);
        assert!(is_gene_compatible(&j, &cdr3));
        let d = hit(VdjRegion::D, &[(ReferencePoint::DBegin, 0)]);
        assert!(!is_gene_compatible(&d, &cdr3));
    }

    #[test]
    fn test_read_lookup() {
        let mut read = ReadAlignments::default();
        read.hits.insert(VdjRegion::V, vec![hit(VdjRegion::V, &[])]);
        assert!(read.hit_for_gene(VdjRegion::V, "G").is_some());
        assert!(read.hit_for_gene(VdjRegion::V, "H").is_none());
        assert!(read.hit_for_gene(VdjRegion::J, "G").is_none());
        assert_eq!(read.anchors(3), TargetAnchors::default());
    }
}
