//! Comoving distance for a flat LCDM background.
//!
//! Source-plane redshifts are converted with fixed Planck15 parameters;
//! the conversion does not need to track the simulated cosmology because
//! source planes are nominal labels, not fitted quantities. Distances are
//! in Mpc/h, so the Hubble constant drops out.

/// Planck15 matter density.
pub const PLANCK15_OM: f64 = 0.3089;

/// Hubble distance c / (100 h km/s/Mpc) in Mpc/h.
const HUBBLE_DISTANCE: f64 = 2997.92458;

/// Integration step in redshift.
const DZ: f64 = 1.0e-4;

fn efunc(om: f64, z: f64) -> f64 {
    (om * (1.0 + z).powi(3) + (1.0 - om)).sqrt()
}

/// Comoving distance to redshift `z`, in Mpc/h (Planck15, flat).
pub fn comoving_distance(z: f64) -> f64 {
    if z <= 0.0 {
        return 0.0;
    }
    let n = (z / DZ).ceil() as usize;
    let h = z / n as f64;
    let mut integral = 0.0;
    let mut prev = 1.0 / efunc(PLANCK15_OM, 0.0);
    for i in 1..=n {
        let next = 1.0 / efunc(PLANCK15_OM, h * i as f64);
        integral += 0.5 * (prev + next) * h;
        prev = next;
    }
    HUBBLE_DISTANCE * integral
}

/// Redshift at comoving distance `d` (Mpc/h), by bisection.
pub fn redshift_at_distance(d: f64) -> f64 {
    if d <= 0.0 {
        return 0.0;
    }
    let mut hi = 1.0;
    while comoving_distance(hi) < d {
        hi *= 2.0;
    }
    let mut lo = 0.0;
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if comoving_distance(mid) < d {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1.0e-10 {
            break;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_at_origin() {
        assert_eq!(comoving_distance(0.0), 0.0);
        assert_eq!(comoving_distance(-1.0), 0.0);
    }

    #[test]
    fn test_planck15_reference_distance() {
        // Planck15 comoving distance to z = 1 is about 2300 Mpc/h.
        let d = comoving_distance(1.0);
        assert!((d - 2300.0).abs() / 2300.0 < 0.01, "got {d}");
    }

    #[test]
    fn test_monotonic() {
        let mut prev = 0.0;
        for i in 1..=20 {
            let d = comoving_distance(0.1 * i as f64);
            assert!(d > prev);
            prev = d;
        }
    }

    #[test]
    fn test_redshift_roundtrip() {
        for &z in &[0.05, 0.3, 1.0, 2.5] {
            let d = comoving_distance(z);
            let z_back = redshift_at_distance(d);
            assert!((z - z_back).abs() < 1e-6, "z {z} -> d {d} -> z {z_back}");
        }
    }
}
