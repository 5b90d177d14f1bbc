//! Run configuration and slice edges.

use serde::{Deserialize, Serialize};
use sk_core::{Error, Result, SourcePlane};

/// Configuration of one map-making run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// HEALPix resolution parameter.
    pub nside: u64,

    /// Source planes, in the caller's order.
    pub planes: Vec<SourcePlane>,

    /// Lower lens redshift bound.
    #[serde(default = "default_zlmin")]
    pub zlmin: f64,

    /// Upper lens redshift bound.
    pub zlmax: f64,

    /// Lens redshift step; the slice count is rounded from
    /// `(zlmax - zlmin) / zstep` and clamped to at least 2.
    #[serde(default = "default_zstep")]
    pub zstep: f64,
}

fn default_zlmin() -> f64 {
    0.01
}

fn default_zstep() -> f64 {
    0.05
}

impl PipelineConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.nside == 0 {
            return Err(Error::Validation("nside must be >= 1".into()));
        }
        if self.planes.is_empty() {
            return Err(Error::Validation("at least one source plane is required".into()));
        }
        if self.planes.iter().any(|p| !p.zs.is_finite() || !p.ds.is_finite() || p.ds <= 0.0) {
            return Err(Error::Validation("source planes must have finite zs and ds > 0".into()));
        }
        if !self.zlmin.is_finite() || !self.zlmax.is_finite() || self.zlmax <= self.zlmin {
            return Err(Error::Validation(format!(
                "invalid lens redshift bounds: zlmin = {}, zlmax = {}",
                self.zlmin, self.zlmax
            )));
        }
        if !(self.zstep.is_finite() && self.zstep > 0.0) {
            return Err(Error::Validation("zstep must be > 0".into()));
        }
        Ok(())
    }

    /// Number of redshift slices (at least 2).
    pub fn n_slices(&self) -> usize {
        let steps = ((self.zlmax - self.zlmin) / self.zstep).round() as i64;
        steps.max(2) as usize
    }

    /// Slice edges from `zlmax` down to `zlmin` (`n_slices() + 1` values);
    /// slice `i` is the lens interval `(edges[i+1], edges[i]]`, processed
    /// far to near.
    pub fn slice_edges(&self) -> Vec<f64> {
        let n = self.n_slices();
        (0..=n)
            .map(|i| self.zlmax + (self.zlmin - self.zlmax) * i as f64 / n as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(zlmin: f64, zlmax: f64, zstep: f64) -> PipelineConfig {
        PipelineConfig {
            nside: 4,
            planes: vec![SourcePlane::new(1.0, 2300.0)],
            zlmin,
            zlmax,
            zstep,
        }
    }

    #[test]
    fn test_slice_count_rounds() {
        assert_eq!(config(0.0, 1.0, 0.1).n_slices(), 10);
        assert_eq!(config(0.0, 1.0, 0.3).n_slices(), 3);
    }

    #[test]
    fn test_slice_count_clamped_to_two() {
        // A coarse zstep silently clamps to 2 slices, not an error.
        let cfg = config(0.01, 0.2, 5.0);
        assert_eq!(cfg.n_slices(), 2);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_edges_descend_and_bound() {
        let cfg = config(0.01, 1.01, 0.25);
        let edges = cfg.slice_edges();
        assert_eq!(edges.len(), cfg.n_slices() + 1);
        assert!((edges[0] - 1.01).abs() < 1e-12);
        assert!((edges[edges.len() - 1] - 0.01).abs() < 1e-12);
        assert!(edges.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_validation_failures() {
        assert!(config(0.5, 0.1, 0.05).validate().is_err());
        assert!(config(0.1, 0.5, 0.0).validate().is_err());
        let mut cfg = config(0.01, 1.0, 0.1);
        cfg.nside = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = config(0.01, 1.0, 0.1);
        cfg.planes.clear();
        assert!(cfg.validate().is_err());
    }
}
