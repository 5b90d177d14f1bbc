//! Running totals across slices.
//!
//! The accumulator is an explicit value threaded through the slice loop:
//! per-plane owned map totals, per-plane count totals, per-plane kappabar
//! scalars, and the dense per-(slice, plane) history needed for
//! slice-resolved output. All updates are element-wise additions on this
//! rank's owned slice; a skipped slice leaves its history row at zero.

use sk_core::SourcePlane;

/// Per-plane running sums across slices, plus run provenance.
#[derive(Debug, Clone)]
pub struct CumulativeResult {
    /// Source planes, caller order.
    pub planes: Vec<SourcePlane>,
    /// HEALPix resolution parameter.
    pub nside: u64,
    /// Total pixel count of the map.
    pub npix: u64,
    /// Lens redshift bounds and step of the run.
    pub zlmin: f64,
    /// Upper lens redshift bound.
    pub zlmax: f64,
    /// Lens redshift step.
    pub zstep: f64,
    /// Mean particle number density of the catalog.
    pub nbar: f64,
    /// Per-plane owned kappa totals, `[plane][owned pixel]`.
    pub kappa: Vec<Vec<f64>>,
    /// Per-plane owned count totals, `[plane][owned pixel]`.
    pub nm: Vec<Vec<u64>>,
    /// Per-plane mean-subtraction constants.
    pub kappabar: Vec<f64>,
    /// Per-slice owned kappa maps, `[slice][plane][owned pixel]`.
    pub history: Vec<Vec<Vec<f64>>>,
}

impl CumulativeResult {
    /// Zero-initialized accumulator for `n_slices` slices and this rank's
    /// `own_len` owned pixels.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        planes: Vec<SourcePlane>,
        nside: u64,
        npix: u64,
        zlmin: f64,
        zlmax: f64,
        zstep: f64,
        nbar: f64,
        own_len: usize,
        n_slices: usize,
    ) -> Self {
        let n_planes = planes.len();
        Self {
            planes,
            nside,
            npix,
            zlmin,
            zlmax,
            zstep,
            nbar,
            kappa: vec![vec![0.0; own_len]; n_planes],
            nm: vec![vec![0; own_len]; n_planes],
            kappabar: vec![0.0; n_planes],
            history: vec![vec![vec![0.0; own_len]; n_planes]; n_slices],
        }
    }

    /// Number of source planes.
    pub fn n_planes(&self) -> usize {
        self.planes.len()
    }

    /// Number of redshift slices.
    pub fn n_slices(&self) -> usize {
        self.history.len()
    }

    /// Fold one (slice, plane) aggregation into the running totals.
    pub fn accumulate(
        &mut self,
        slice: usize,
        plane: usize,
        sums: Vec<f64>,
        counts: Vec<u64>,
        kappabar: f64,
    ) {
        debug_assert_eq!(sums.len(), self.kappa[plane].len());
        for (total, &v) in self.kappa[plane].iter_mut().zip(sums.iter()) {
            *total += v;
        }
        for (total, &c) in self.nm[plane].iter_mut().zip(counts.iter()) {
            *total += c;
        }
        self.kappabar[plane] += kappabar;
        self.history[slice][plane] = sums;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(own_len: usize, n_slices: usize) -> CumulativeResult {
        CumulativeResult::new(
            vec![SourcePlane::new(1.0, 2300.0)],
            1,
            12,
            0.01,
            1.0,
            0.5,
            1.0,
            own_len,
            n_slices,
        )
    }

    #[test]
    fn test_two_slices_add_up() {
        // Two slices each contribute 2.0 to pixel 0: the total is 4.0 and
        // the history keeps the per-slice values.
        let mut acc = empty(4, 2);
        let slice_map = vec![2.0, 0.0, 0.0, 0.0];
        let slice_counts = vec![2, 0, 0, 0];

        acc.accumulate(0, 0, slice_map.clone(), slice_counts.clone(), 0.1);
        acc.accumulate(1, 0, slice_map.clone(), slice_counts, 0.1);

        assert_eq!(acc.kappa[0], vec![4.0, 0.0, 0.0, 0.0]);
        assert_eq!(acc.nm[0], vec![4, 0, 0, 0]);
        assert!((acc.kappabar[0] - 0.2).abs() < 1e-15);
        assert_eq!(acc.history[0][0], slice_map);
        assert_eq!(acc.history[1][0], slice_map);
    }

    #[test]
    fn test_skipped_slice_stays_zero() {
        let mut acc = empty(3, 3);
        acc.accumulate(2, 0, vec![1.0, 1.0, 1.0], vec![1, 1, 1], 0.0);
        assert!(acc.history[0][0].iter().all(|&v| v == 0.0));
        assert!(acc.history[1][0].iter().all(|&v| v == 0.0));
        assert_eq!(acc.kappa[0], vec![1.0, 1.0, 1.0]);
    }
}
