//! Tunable parameters of the full-length assembler and the realigner.

use crate::errors::FullSeqError;
use anyhow::{bail, ensure, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vdj_align::{AlignmentScoring, LinearGapScoring};
use vdj_types::{GeneFeature, VdjRegion};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FullSeqParams {
    /// Minimal share of the position's summed quality a variant needs to
    /// create a branch.
    pub branching_minimal_quality_share: f64,
    /// Minimal summed quality a variant needs to create a branch.
    pub branching_minimal_sum_quality: u64,
    /// A variant with at least this summed quality creates a branch
    /// regardless of its share.
    pub decisive_branching_sum_quality_threshold: u64,
    /// An alignment ending closer than this to the end of its sequence is
    /// considered to reach the end.
    pub aligned_sequence_edge_delta: usize,
    /// Width of the untrusted window at the ends of such alignments.
    pub alignment_edge_region_size: usize,
    /// Minimal fraction of trusted observations among a variant's reads.
    pub minimal_non_edge_points_fraction: f64,
    /// Multiplied by the clonotype count to give a minimal summed quality
    /// that even decisive variants must reach.
    pub minimal_mean_normalized_quality: f64,
    /// Share of the summed quality the best variant needs to be reported
    /// when no variant is significant.
    pub output_minimal_quality_share: f64,
    /// Summed quality the best variant needs to be reported when no variant
    /// is significant.
    pub output_minimal_sum_quality: u64,
    /// Region where differences are allowed to split a clonotype. Positions
    /// outside of it never create branches.
    pub sub_cloning_region: Option<GeneFeature>,
    /// Quality trimming of assembled contigs. Low-quality stretches are cut
    /// out before short contigs are dropped.
    pub trimming: Option<QualityTrimmingParams>,
    /// Contigs shorter than this, other than the one holding the clonal
    /// feature, are dropped.
    pub minimal_contig_length: usize,
    /// Only use the aligned parts of reads.
    pub aligned_regions_only: bool,
}

impl Default for FullSeqParams {
    fn default() -> Self {
        FullSeqParams {
            branching_minimal_quality_share: 0.1,
            branching_minimal_sum_quality: 80,
            decisive_branching_sum_quality_threshold: 120,
            aligned_sequence_edge_delta: 3,
            alignment_edge_region_size: 7,
            minimal_non_edge_points_fraction: 0.25,
            minimal_mean_normalized_quality: 0.0,
            output_minimal_quality_share: 0.0,
            output_minimal_sum_quality: 0,
            sub_cloning_region: Some(GeneFeature::vdj_region()),
            trimming: Some(QualityTrimmingParams::default()),
            minimal_contig_length: 0,
            aligned_regions_only: false,
        }
    }
}

/// Sliding-window quality trimming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityTrimmingParams {
    /// Minimal mean quality of a window.
    pub average_quality_threshold: f32,
    pub window_size: usize,
}

impl Default for QualityTrimmingParams {
    fn default() -> Self {
        QualityTrimmingParams {
            average_quality_threshold: 20.0,
            window_size: 8,
        }
    }
}

/// Named parameter sets.
const PRESETS: [&str; 1] = ["default"];

impl FullSeqParams {
    pub fn preset(name: &str) -> Result<FullSeqParams> {
        match name {
            "default" => Ok(FullSeqParams::default()),
            _ => bail!(
                "Unknown full sequence assembler preset '{}'. Supported presets are: [{}]",
                name,
                PRESETS.join(", ")
            ),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<FullSeqParams> {
        let params: FullSeqParams =
            toml::from_str(s).context("parsing full sequence assembler parameters")?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<FullSeqParams> {
        if !path.exists() {
            warn!(
                "could not find {}, falling back to default assembler parameters",
                path.display()
            );
            return Ok(FullSeqParams::default());
        }
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        FullSeqParams::from_toml_str(&s).with_context(|| path.display().to_string())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            (
                "branching_minimal_quality_share",
                self.branching_minimal_quality_share,
            ),
            (
                "minimal_non_edge_points_fraction",
                self.minimal_non_edge_points_fraction,
            ),
            ("output_minimal_quality_share", self.output_minimal_quality_share),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must be within [0, 1], got {value}"
            );
        }
        ensure!(
            self.minimal_mean_normalized_quality >= 0.0,
            "minimal_mean_normalized_quality must not be negative, got {}",
            self.minimal_mean_normalized_quality
        );
        ensure!(
            self.output_minimal_sum_quality <= self.branching_minimal_sum_quality,
            "output_minimal_sum_quality ({}) must not exceed branching_minimal_sum_quality ({})",
            self.output_minimal_sum_quality,
            self.branching_minimal_sum_quality
        );
        if let Some(trimming) = &self.trimming {
            ensure!(
                trimming.window_size > 0,
                "trimming window_size must be positive"
            );
            ensure!(
                trimming.average_quality_threshold >= 0.0,
                "trimming average_quality_threshold must not be negative, got {}",
                trimming.average_quality_threshold
            );
        }
        if let Some(region) = &self.sub_cloning_region {
            ensure!(
                !region.is_composite(),
                "sub_cloning_region must not be composite, got {region}"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneAlignerParams {
    pub scoring: AlignmentScoring,
    pub floating_left_bound: bool,
    pub floating_right_bound: bool,
}

impl Default for GeneAlignerParams {
    fn default() -> Self {
        GeneAlignerParams {
            scoring: AlignmentScoring::default(),
            floating_left_bound: false,
            floating_right_bound: false,
        }
    }
}

impl GeneAlignerParams {
    pub(crate) fn linear_scoring(&self, region: VdjRegion) -> Result<LinearGapScoring, FullSeqError> {
        self.scoring
            .as_linear()
            .copied()
            .ok_or(FullSeqError::UnsupportedScoring { region })
    }
}

/// Parameters used to realign assembled contigs against the V and J genes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealignerParams {
    pub v: GeneAlignerParams,
    pub j: GeneAlignerParams,
}

impl Default for RealignerParams {
    fn default() -> Self {
        RealignerParams {
            v: GeneAlignerParams {
                floating_left_bound: true,
                ..GeneAlignerParams::default()
            },
            j: GeneAlignerParams {
                floating_right_bound: true,
                ..GeneAlignerParams::default()
            },
        }
    }
}

impl RealignerParams {
    pub fn from_toml_str(s: &str) -> Result<RealignerParams> {
        toml::from_str(s).context("parsing realigner parameters")
    }
}
