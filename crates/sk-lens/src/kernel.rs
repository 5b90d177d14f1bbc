//! Lensing-efficiency kernel.
//!
//! Convergence contribution of a lens at comoving distance `dl` and
//! redshift `zl` for sources on a delta plane at comoving distance `ds`,
//! in Mpc/h units (H0 = 100 h km/s/Mpc, c = 3e5 km/s):
//!
//!   w = 1.5 * Om * (H0/c)^2 * (1 + zl) * dl * max(1 - dl/ds, 0)
//!
//! Lenses behind the source plane contribute zero.

/// (H0 / c)^2 in h^2 / Mpc^2.
const H0_OVER_C_SQ: f64 = (100.0 / 3.0e5) * (100.0 / 3.0e5);

/// Lensing-efficiency weight of one lens particle for one source plane.
pub fn lens_weight(om: f64, dl: f64, zl: f64, ds: f64) -> f64 {
    let ddls = (1.0 - dl / ds).max(0.0);
    1.5 * om * ddls * H0_OVER_C_SQ * (1.0 + zl) * dl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_behind_source_plane() {
        assert_eq!(lens_weight(0.3, 2500.0, 1.2, 2000.0), 0.0);
        assert_eq!(lens_weight(0.3, 2000.0, 1.0, 2000.0), 0.0);
    }

    #[test]
    fn test_known_value() {
        let w = lens_weight(0.31, 1000.0, 0.5, 2000.0);
        let expected = 1.5 * 0.31 * 0.5 * (100.0f64 / 3.0e5).powi(2) * 1.5 * 1000.0;
        assert!((w - expected).abs() < 1e-15);
    }

    #[test]
    fn test_peaks_between_observer_and_source() {
        // The efficiency rises from zero at the observer and returns to
        // zero at the source plane.
        let ds = 3000.0;
        let near = lens_weight(0.3, 1.0, 0.0, ds);
        let mid = lens_weight(0.3, 1500.0, 0.4, ds);
        let far = lens_weight(0.3, 2999.0, 1.0, ds);
        assert!(mid > near);
        assert!(mid > far);
    }
}
