//! Scale-factor range index.
//!
//! Catalog rows are sorted by emission scale factor (`aemit`) and indexed
//! by a fixed edge grid: `offsets[g]..offsets[g+1]` are the rows of bin
//! `g`, where bin 0 holds rows below the first edge and the last bin rows
//! at or above the last edge. Range lookup reproduces the producer's
//! convention: both bounds are located with a left `searchsorted` on the
//! edges and mapped through `offsets[i + 1]`, so a query rounds inward to
//! whole bins at the lower bound and outward at the upper bound.

use serde::{Deserialize, Serialize};
use sk_core::{Error, Result};
use std::ops::Range;

/// Prebuilt index over the catalog's sorted `aemit` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AemitIndex {
    /// Ascending scale-factor bin edges.
    pub edges: Vec<f64>,
    /// Row offsets, length `edges.len() + 2`; `offsets[0] = 0` and the
    /// last entry is the total row count.
    pub offsets: Vec<u64>,
}

impl AemitIndex {
    /// Build the index for an `aemit` column already sorted ascending.
    pub fn build(edges: Vec<f64>, sorted_aemit: &[f64]) -> Result<Self> {
        if edges.is_empty() {
            return Err(Error::Validation("aemit index needs at least one edge".into()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Validation("aemit index edges must be strictly ascending".into()));
        }
        if sorted_aemit.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::Validation("aemit column must be sorted ascending".into()));
        }

        let mut offsets = Vec::with_capacity(edges.len() + 2);
        offsets.push(0);
        for edge in &edges {
            offsets.push(sorted_aemit.partition_point(|&a| a < *edge) as u64);
        }
        offsets.push(sorted_aemit.len() as u64);
        Ok(Self { edges, offsets })
    }

    /// Check structural invariants (used when deserializing from disk).
    pub fn validate(&self) -> Result<()> {
        if self.offsets.len() != self.edges.len() + 2 {
            return Err(Error::Validation(format!(
                "aemit index shape mismatch: {} edges, {} offsets",
                self.edges.len(),
                self.offsets.len()
            )));
        }
        if self.offsets.first() != Some(&0) {
            return Err(Error::Validation("aemit index offsets must start at 0".into()));
        }
        if self.offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::Validation("aemit index offsets must be non-decreasing".into()));
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Validation("aemit index edges must be strictly ascending".into()));
        }
        Ok(())
    }

    /// Total indexed row count.
    pub fn n_rows(&self) -> u64 {
        *self.offsets.last().expect("offsets are never empty")
    }

    /// Row range of records with scale factor in `[amin, amax)`, rounded
    /// to index bins.
    pub fn row_range(&self, amin: f64, amax: f64) -> Range<u64> {
        let i = self.edges.partition_point(|&e| e < amin);
        let j = self.edges.partition_point(|&e| e < amax);
        self.offsets[i + 1]..self.offsets[j + 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> AemitIndex {
        // Bins: [<0.2), [0.2,0.4), [0.4,0.6), [>=0.6]
        let aemit = [0.1, 0.15, 0.25, 0.3, 0.45, 0.5, 0.55, 0.7, 0.9];
        AemitIndex::build(vec![0.2, 0.4, 0.6], &aemit).unwrap()
    }

    #[test]
    fn test_build_offsets() {
        let index = sample_index();
        assert_eq!(index.offsets, vec![0, 2, 4, 7, 9]);
        assert_eq!(index.n_rows(), 9);
        index.validate().unwrap();
    }

    #[test]
    fn test_row_range_on_edges() {
        let index = sample_index();
        assert_eq!(index.row_range(0.2, 0.4), 2..4);
        assert_eq!(index.row_range(0.2, 0.6), 2..7);
        assert_eq!(index.row_range(0.4, 0.6), 4..7);
    }

    #[test]
    fn test_row_range_rounds_to_bins() {
        let index = sample_index();
        // Lower bound rounds inward to the next edge, upper bound outward.
        assert_eq!(index.row_range(0.3, 0.5), 4..7);
    }

    #[test]
    fn test_row_range_outside_grid() {
        let index = sample_index();
        // Everything at or above the last edge.
        assert_eq!(index.row_range(0.6, 1.0), 7..9);
        // Query entirely above the edge grid yields an empty span.
        assert_eq!(index.row_range(0.95, 1.0), 9..9);
    }

    #[test]
    fn test_build_rejects_bad_inputs() {
        assert!(AemitIndex::build(vec![], &[0.1]).is_err());
        assert!(AemitIndex::build(vec![0.4, 0.2], &[0.1]).is_err());
        assert!(AemitIndex::build(vec![0.2], &[0.5, 0.1]).is_err());
    }
}
