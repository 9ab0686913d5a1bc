//! The per-read variant matrix of one clonotype.

use crate::clonotype::ReadAlignments;
use crate::points::PointExtractor;
use crate::variants::{PackedVariant, VariantDictionary};
use itertools::Itertools;
use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::ops::Range;

/// Observations of every read at every observed position. Rows are ordered by
/// descending coverage, then descending position.
#[derive(Debug, Clone)]
pub struct RawVariantsData {
    n_reads: usize,
    points: Vec<usize>,
    coverage: Vec<usize>,
    rows: Vec<Vec<PackedVariant>>,
    dictionary: VariantDictionary,
    covered_at_least: HashMap<usize, usize>,
}

impl RawVariantsData {
    pub(crate) fn collect<I>(extractor: &PointExtractor<'_>, reads: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<ReadAlignments>,
    {
        let mut dictionary = VariantDictionary::new();
        let mut coverage: HashMap<usize, usize> = HashMap::new();
        let mut per_read = Vec::new();
        for read in reads {
            let observations: Vec<(usize, PackedVariant)> = extractor
                .extract(read.borrow())
                .into_iter()
                .map(|p| {
                    *coverage.entry(p.position).or_default() += 1;
                    let id = dictionary.id_for(&p.bases);
                    (p.position, PackedVariant::new(id, p.quality, p.trusted))
                })
                .collect();
            per_read.push(observations);
        }

        let (points, coverage): (Vec<usize>, Vec<usize>) = coverage
            .into_iter()
            .sorted_by_key(|&(position, cov)| (Reverse(cov), Reverse(position)))
            .unzip();
        let row_of: HashMap<usize, usize> = points.iter().enumerate().map(|(row, &p)| (p, row)).collect();

        let n_reads = per_read.len();
        let mut rows = vec![vec![PackedVariant::ABSENT; n_reads]; points.len()];
        for (read, observations) in per_read.into_iter().enumerate() {
            for (position, state) in observations {
                rows[row_of[&position]][read] = state;
            }
        }

        RawVariantsData {
            n_reads,
            points,
            coverage,
            rows,
            dictionary,
            covered_at_least: HashMap::new(),
        }
    }

    pub fn n_reads(&self) -> usize {
        self.n_reads
    }

    /// Global positions, in row order.
    pub fn points(&self) -> &[usize] {
        &self.points
    }

    pub fn coverage(&self) -> &[usize] {
        &self.coverage
    }

    pub fn rows(&self) -> &[Vec<PackedVariant>] {
        &self.rows
    }

    pub fn dictionary(&self) -> &VariantDictionary {
        &self.dictionary
    }

    /// Number of positions observed in at least `threshold` reads.
    pub fn positions_covered_at_least(&mut self, threshold: usize) -> usize {
        let coverage = &self.coverage;
        *self
            .covered_at_least
            .entry(threshold)
            .or_insert_with(|| coverage.iter().filter(|&&c| c >= threshold).count())
    }

    /// Text rendering of the matrix for the given reads: one line per read,
    /// one column group per position. Calls below `quality_threshold` are
    /// lower-cased and deleted bases are shown as `.`.
    pub fn render(&self, quality_threshold: u8, reads: Range<usize>) -> String {
        let reads = reads.start.min(self.n_reads)..reads.end.min(self.n_reads);
        let (Some(&min), Some(&max)) = (self.points.iter().min(), self.points.iter().max()) else {
            return String::new();
        };

        // widest observed sequence at every position
        let mut width = vec![0usize; max - min + 1];
        for (row, &position) in self.rows.iter().zip(&self.points) {
            for state in &row[reads.clone()] {
                if !state.is_absent() {
                    let len = self.dictionary.sequence(state.id()).len();
                    width[position - min] = width[position - min].max(len);
                }
            }
        }
        let column: Vec<usize> = width
            .iter()
            .scan(0, |acc, &w| {
                let start = *acc;
                *acc += w;
                Some(start)
            })
            .collect();
        let total = column.last().copied().unwrap_or(0) + width.last().copied().unwrap_or(0);

        let mut strokes = vec![b' '; total];
        let mut labels = vec![b' '; total + 10];
        for (i, &start) in column.iter().enumerate() {
            if width[i] == 0 {
                continue;
            }
            strokes[start] = b'|';
            if i % 10 == 0 {
                let label = (i + min).to_string();
                labels[start..start + label.len()].copy_from_slice(label.as_bytes());
            }
        }

        let mut lines = vec![vec![b' '; total]; reads.len()];
        for (row, &position) in self.rows.iter().zip(&self.points) {
            let start = column[position - min];
            for (line, state) in lines.iter_mut().zip(&row[reads.clone()]) {
                if state.is_absent() {
                    continue;
                }
                let seq = self.dictionary.sequence(state.id());
                for k in 0..width[position - min] {
                    line[start + k] = match seq.get(k) {
                        Some(b) if state.quality() < quality_threshold => b.to_ascii_lowercase(),
                        Some(&b) => b,
                        None => b'.',
                    };
                }
            }
        }

        std::iter::once(labels)
            .chain(std::iter::once(strokes))
            .chain(lines)
            .map(|l| String::from_utf8_lossy(&l).trim_end().to_string())
            .join("\n")
    }
}
