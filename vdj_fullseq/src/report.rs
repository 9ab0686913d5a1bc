//! Counters describing what the assembler did to a set of clonotypes.

use crate::clonotype::Clonotype;
use serde::{Deserialize, Serialize};
use vdj_types::VdjRegion;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FullSeqReport {
    pub initial_clonotype_count: u64,
    pub final_clonotype_count: u64,
    /// Clonotypes passed through unchanged because assembly failed.
    pub canceled_assemblies: u64,
    /// Summed count of the input clonotypes.
    pub total_reads_processed: f64,
    /// Branches created before clustering.
    pub variants_before_clustering: u64,
    /// Branches merged into heavier ones by clustering.
    pub clonotypes_clustered: u64,
    pub reads_clustered: f64,
    /// Summed count of all branches other than the heaviest of each input
    /// clonotype.
    pub divided_variant_reads: f64,
    pub longest_contig_length: usize,
    pub v_hits_reorder: u64,
    pub j_hits_reorder: u64,
    pub clonotypes_with_ambiguous_letters: u64,
    pub reads_with_ambiguous_letters: f64,
    pub total_ambiguous_letters: u64,
}

impl FullSeqReport {
    pub fn merge(&mut self, other: Self) {
        // Destructure so that adding a field without merging it fails to compile.
        let FullSeqReport {
            initial_clonotype_count,
            final_clonotype_count,
            canceled_assemblies,
            total_reads_processed,
            variants_before_clustering,
            clonotypes_clustered,
            reads_clustered,
            divided_variant_reads,
            longest_contig_length,
            v_hits_reorder,
            j_hits_reorder,
            clonotypes_with_ambiguous_letters,
            reads_with_ambiguous_letters,
            total_ambiguous_letters,
        } = other;
        self.initial_clonotype_count += initial_clonotype_count;
        self.final_clonotype_count += final_clonotype_count;
        self.canceled_assemblies += canceled_assemblies;
        self.total_reads_processed += total_reads_processed;
        self.variants_before_clustering += variants_before_clustering;
        self.clonotypes_clustered += clonotypes_clustered;
        self.reads_clustered += reads_clustered;
        self.divided_variant_reads += divided_variant_reads;
        self.longest_contig_length = self.longest_contig_length.max(longest_contig_length);
        self.v_hits_reorder += v_hits_reorder;
        self.j_hits_reorder += j_hits_reorder;
        self.clonotypes_with_ambiguous_letters += clonotypes_with_ambiguous_letters;
        self.reads_with_ambiguous_letters += reads_with_ambiguous_letters;
        self.total_ambiguous_letters += total_ambiguous_letters;
    }

    pub(crate) fn on_variants_created(&mut self, n_branches: usize) {
        self.variants_before_clustering += n_branches as u64;
    }

    pub(crate) fn on_clustered(&mut self, weight: f64) {
        self.clonotypes_clustered += 1;
        self.reads_clustered += weight;
    }

    pub(crate) fn on_hit_reorder(&mut self, region: VdjRegion) {
        match region {
            VdjRegion::V => self.v_hits_reorder += 1,
            VdjRegion::J => self.j_hits_reorder += 1,
            VdjRegion::D | VdjRegion::C => {}
        }
    }

    /// Record the outcome of one successful assembly, heaviest branch first.
    pub(crate) fn after_assembly(&mut self, initial: &Clonotype, results: &[Clonotype]) {
        self.initial_clonotype_count += 1;
        self.final_clonotype_count += results.len() as u64;
        self.total_reads_processed += initial.count;
        self.divided_variant_reads += results.iter().skip(1).map(|c| c.count).sum::<f64>();
        for clonotype in results {
            self.longest_contig_length = self.longest_contig_length.max(clonotype.contig_length());
            let wildcards = clonotype.wildcard_count();
            if wildcards > 0 {
                self.clonotypes_with_ambiguous_letters += 1;
                self.reads_with_ambiguous_letters += clonotype.count;
                self.total_ambiguous_letters += wildcards as u64;
            }
        }
    }

    /// Record a clonotype that is passed through unchanged.
    pub(crate) fn on_canceled(&mut self, initial: &Clonotype) {
        self.canceled_assemblies += 1;
        self.initial_clonotype_count += 1;
        self.final_clonotype_count += 1;
        self.total_reads_processed += initial.count;
    }
}
