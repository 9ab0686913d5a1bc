//! Sliding-window quality trimming of assembled contigs.

use crate::config::QualityTrimmingParams;
use std::ops::Range;

/// Stretches of `qual` made of windows of `window_size` bases whose mean
/// quality reaches the threshold, with bases under the threshold removed from
/// both ends of each stretch. Returned in order; may be empty.
pub(crate) fn all_islands(qual: &[u8], params: &QualityTrimmingParams) -> Vec<Range<usize>> {
    if qual.is_empty() {
        return Vec::new();
    }
    let window = params.window_size.clamp(1, qual.len());
    let threshold = f64::from(params.average_quality_threshold);
    let min_sum = threshold * window as f64;

    let mut sum: u64 = qual[..window].iter().map(|&q| u64::from(q)).sum();
    let mut islands: Vec<Range<usize>> = Vec::new();
    for start in 0..=qual.len() - window {
        if start > 0 {
            sum = sum + u64::from(qual[start + window - 1]) - u64::from(qual[start - 1]);
        }
        if (sum as f64) < min_sum {
            continue;
        }
        match islands.last_mut() {
            Some(island) if island.end >= start => island.end = start + window,
            _ => islands.push(start..start + window),
        }
    }

    let low = |q: u8| f64::from(q) < threshold;
    islands
        .into_iter()
        .filter_map(|mut island| {
            while island.start < island.end && low(qual[island.start]) {
                island.start += 1;
            }
            while island.end > island.start && low(qual[island.end - 1]) {
                island.end -= 1;
            }
            (!island.is_empty()).then_some(island)
        })
        .collect()
}

/// Like [`all_islands`], but `initial` is always kept whole: it is merged with
/// every island it touches into a single island.
pub(crate) fn islands_from_initial_range(
    qual: &[u8],
    params: &QualityTrimmingParams,
    initial: Range<usize>,
) -> Vec<Range<usize>> {
    let mut merged = initial.clone();
    let mut result = Vec::new();
    let mut placed = false;
    for island in all_islands(qual, params) {
        if island.start <= initial.end && initial.start <= island.end {
            merged.start = merged.start.min(island.start);
            merged.end = merged.end.max(island.end);
            continue;
        }
        if island.start > initial.end && !placed {
            result.push(merged.clone());
            placed = true;
        }
        result.push(island);
    }
    if !placed {
        result.push(merged);
    }
    result
}
