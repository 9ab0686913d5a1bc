//! vdj_fullseq
// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.
//!
//! Full-length assembly of clonotypes. The reads of a clonotype are placed on
//! a common coordinate axis around its clonal feature, per-position variants
//! are called, the clonotype is split into branches wherever reads
//! significantly disagree, weakly supported branches are merged back, and every
//! remaining branch is reassembled into contigs and realigned against its V and
//! J genes.

mod assembler;
mod branches;
mod caller;
pub mod clonotype;
pub mod config;
pub mod coords;
mod errors;
mod points;
mod raw;
mod realign;
mod reassemble;
mod report;
mod trim;
pub mod variants;


pub use assembler::{assemble_clonotypes, FullSeqAssembler};
pub use clonotype::{is_gene_compatible, Clonotype, Gene, Hit, ReadAlignments, TargetAnchors};
pub use config::{FullSeqParams, GeneAlignerParams, QualityTrimmingParams, RealignerParams};
pub use errors::FullSeqError;
pub use raw::RawVariantsData;
pub use report::FullSeqReport;
