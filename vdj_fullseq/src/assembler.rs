//! The per-clonotype assembly engine and a driver running it over many
//! clonotypes.

use crate::branches::{cluster_branches, enumerate_branches};
use crate::caller::VariantCaller;
use crate::clonotype::{Clonotype, Hit, ReadAlignments};
use crate::config::{FullSeqParams, RealignerParams};
use crate::coords::CoordinateGrid;
use crate::errors::FullSeqError;
use crate::points::PointExtractor;
use crate::raw::RawVariantsData;
use crate::reassemble::reassemble;
use crate::realign::Realigner;
use crate::report::FullSeqReport;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::borrow::Borrow;
use vdj_align::LinearGapScoring;
use vdj_types::VdjRegion;

fn check_params(params: &FullSeqParams) -> Result<(), FullSeqError> {
    params
        .validate()
        .map_err(|err| FullSeqError::InvalidParameters(format!("{err:#}")))
}

/// Splits one clonotype into its full-length variants.
pub struct FullSeqAssembler<'a> {
    params: &'a FullSeqParams,
    clonotype: &'a Clonotype,
    v_hit: &'a Hit,
    j_hit: &'a Hit,
    grid: CoordinateGrid,
    v_scoring: LinearGapScoring,
    j_scoring: LinearGapScoring,
    v_floating_left: bool,
    j_floating_right: bool,
}

impl<'a> FullSeqAssembler<'a> {
    /// Assembler anchored on the best V and J hits of the clonotype.
    pub fn new(
        params: &'a FullSeqParams,
        realigner: &RealignerParams,
        clonotype: &'a Clonotype,
    ) -> Result<Self, FullSeqError> {
        let best = move |region| {
            clonotype
                .best_hit(region)
                .ok_or_else(|| FullSeqError::MissingReferenceHit {
                    region,
                    reason: "the clonotype has no hit".to_string(),
                })
        };
        // parameters are checked before anything about the clonotype
        check_params(params)?;
        realigner.v.linear_scoring(VdjRegion::V)?;
        realigner.j.linear_scoring(VdjRegion::J)?;
        let v_hit = best(VdjRegion::V)?;
        let j_hit = best(VdjRegion::J)?;
        Self::with_base_hits(params, realigner, clonotype, v_hit, j_hit)
    }

    /// Assembler anchored on the given V and J hits, which must be among the
    /// hits of the clonotype.
    pub fn with_base_hits(
        params: &'a FullSeqParams,
        realigner: &RealignerParams,
        clonotype: &'a Clonotype,
        v_hit: &'a Hit,
        j_hit: &'a Hit,
    ) -> Result<Self, FullSeqError> {
        check_params(params)?;
        let v_scoring = realigner.v.linear_scoring(VdjRegion::V)?;
        let j_scoring = realigner.j.linear_scoring(VdjRegion::J)?;

        let feature = match clonotype.assembling_features.as_slice() {
            [feature] if !feature.is_composite() => feature,
            [feature] => {
                return Err(FullSeqError::MalformedClonotype(format!(
                    "composite assembling feature {feature}"
                )))
            }
            features => {
                return Err(FullSeqError::MalformedClonotype(format!(
                    "expected a single assembling feature, got {}",
                    features.len()
                )))
            }
        };
        let clonal = match clonotype.targets.as_slice() {
            [target] if !target.is_empty() => target,
            [_] => {
                return Err(FullSeqError::MalformedClonotype(
                    "empty clonal sequence".to_string(),
                ))
            }
            targets => {
                return Err(FullSeqError::MalformedClonotype(format!(
                    "expected a single target, got {}",
                    targets.len()
                )))
            }
        };

        for (hit, region) in [(v_hit, VdjRegion::V), (j_hit, VdjRegion::J)] {
            if !clonotype.hits(region).iter().any(|h| h.gene.name == hit.gene.name) {
                return Err(FullSeqError::MissingReferenceHit {
                    region,
                    reason: format!("{} is not among the clonotype hits", hit.gene.name),
                });
            }
        }
        let (first, last) = (feature.first_point(), feature.last_point());
        if first.region() == VdjRegion::V && v_hit.gene.point(first).is_none() {
            return Err(FullSeqError::MissingReferenceHit {
                region: VdjRegion::V,
                reason: format!("{} does not define {first}", v_hit.gene.name),
            });
        }
        if last.region() == VdjRegion::J && j_hit.gene.point(last).is_none() {
            return Err(FullSeqError::MissingReferenceHit {
                region: VdjRegion::J,
                reason: format!("{} does not define {last}", j_hit.gene.name),
            });
        }

        let grid = CoordinateGrid::new(
            feature,
            clonal.len(),
            &v_hit.gene,
            &j_hit.gene,
            params.sub_cloning_region.as_ref(),
        );
        Ok(FullSeqAssembler {
            params,
            clonotype,
            v_hit,
            j_hit,
            grid,
            v_scoring,
            j_scoring,
            v_floating_left: realigner.v.floating_left_bound && !params.aligned_regions_only,
            j_floating_right: realigner.j.floating_right_bound && !params.aligned_regions_only,
        })
    }

    pub fn grid(&self) -> &CoordinateGrid {
        &self.grid
    }

    /// Build the variant matrix of the clonotype's reads.
    pub fn calculate_raw_data<I>(&self, reads: I) -> RawVariantsData
    where
        I: IntoIterator,
        I::Item: Borrow<ReadAlignments>,
    {
        let extractor = PointExtractor {
            grid: &self.grid,
            params: self.params,
            v_gene: &self.v_hit.gene,
            j_gene: &self.j_hit.gene,
        };
        RawVariantsData::collect(&extractor, reads)
    }

    /// Split the clonotype according to the matrix. Returns the variants
    /// heaviest first. Their counts add up to the count of the clonotype.
    pub fn call_variants(
        &self,
        data: &RawVariantsData,
        report: &mut FullSeqReport,
    ) -> Result<Vec<Clonotype>, FullSeqError> {
        let count = self.clonotype.count;
        let caller = VariantCaller {
            params: self.params,
            required_minimal_sum_quality: (self.params.minimal_mean_normalized_quality * count)
                .round() as u64,
        };
        let branches = enumerate_branches(data.rows(), data.n_reads(), count, &caller);
        report.on_variants_created(branches.len());
        let n_before = branches.len();
        let branches = cluster_branches(branches, report);
        debug!(
            "{} reads, {} positions: {} branches, {} after clustering",
            data.n_reads(),
            data.points().len(),
            n_before,
            branches.len()
        );

        let realigner = Realigner {
            grid: &self.grid,
            clonotype: self.clonotype,
            v_hit: self.v_hit,
            j_hit: self.j_hit,
            v_scoring: self.v_scoring,
            j_scoring: self.j_scoring,
            v_floating_left: self.v_floating_left,
            j_floating_right: self.j_floating_right,
        };
        let clonal = &self.clonotype.targets[0];
        let results = branches
            .iter()
            .map(|branch| {
                let sequences = reassemble(
                    branch,
                    data.points(),
                    data.dictionary(),
                    &self.grid,
                    clonal,
                    self.params.trimming.as_ref(),
                    self.params.minimal_contig_length,
                )?;
                realigner.build(&sequences, report)
            })
            .collect::<Result<Vec<_>, _>>()?;
        report.after_assembly(self.clonotype, &results);
        Ok(results)
    }

    pub fn assemble<I>(
        &self,
        reads: I,
        report: &mut FullSeqReport,
    ) -> Result<Vec<Clonotype>, FullSeqError>
    where
        I: IntoIterator,
        I::Item: Borrow<ReadAlignments>,
    {
        let data = self.calculate_raw_data(reads);
        self.call_variants(&data, report)
    }
}

/// Assemble every clonotype from its reads in parallel. A clonotype whose
/// assembly fails is passed through unchanged and counted as canceled;
/// invalid parameters or unsupported realignment scoring fail the whole call.
pub fn assemble_clonotypes(
    params: &FullSeqParams,
    realigner: &RealignerParams,
    inputs: Vec<(Clonotype, Vec<ReadAlignments>)>,
) -> Result<(Vec<Clonotype>, FullSeqReport), FullSeqError> {
    check_params(params)?;
    realigner.v.linear_scoring(VdjRegion::V)?;
    realigner.j.linear_scoring(VdjRegion::J)?;

    let outcomes: Vec<(Vec<Clonotype>, FullSeqReport)> = inputs
        .into_par_iter()
        .map(|(clonotype, reads)| {
            let mut report = FullSeqReport::default();
            let result = FullSeqAssembler::new(params, realigner, &clonotype)
                .and_then(|assembler| assembler.assemble(&reads, &mut report));
            match result {
                Ok(clonotypes) => (clonotypes, report),
                Err(err) => {
                    warn!(
                        "canceled assembly of clonotype with count {}: {err}",
                        clonotype.count
                    );
                    let mut report = FullSeqReport::default();
                    report.on_canceled(&clonotype);
                    (vec![clonotype], report)
                }
            }
        })
        .collect();

    let mut clonotypes = Vec::new();
    let mut report = FullSeqReport::default();
    for (assembled, r) in outcomes {
        clonotypes.extend(assembled);
        report.merge(r);
    }
    info!(
        "assembled {} clonotypes into {} ({} canceled)",
        report.initial_clonotype_count, report.final_clonotype_count, report.canceled_assemblies
    );
    Ok((clonotypes, report))
}
