//! Common data types for SkyKappa

use serde::{Deserialize, Serialize};

/// A source plane: the redshift of the lensed sources and its comoving
/// distance. Planes are caller-supplied, ordered, and immutable for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcePlane {
    /// Source redshift
    pub zs: f64,
    /// Comoving distance of the source plane (Mpc/h)
    pub ds: f64,
}

impl SourcePlane {
    /// Create a new source plane
    pub fn new(zs: f64, ds: f64) -> Self {
        Self { zs, ds }
    }
}

/// Run-level catalog metadata.
///
/// Replaces the loose attribute dictionary of simulation catalogs with an
/// explicit typed struct: `nc` is the per-side particle grid count of the
/// parent simulation, `box_size` its comoving box side (Mpc/h).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogMeta {
    /// Matter density parameter of the simulation
    pub om: f64,
    /// Particle mesh cells per side
    pub nc: f64,
    /// Simulation box side (Mpc/h)
    pub box_size: f64,
    /// Fraction of particles retained in the light-cone output
    pub particle_fraction: f64,
}

impl CatalogMeta {
    /// Expected mean comoving particle number density (h^3 / Mpc^3).
    pub fn nbar(&self) -> f64 {
        self.nc.powi(3) / self.box_size.powi(3) * self.particle_fraction
    }
}

/// A worker-local batch of light-cone particles, stored column-wise.
///
/// Exists only within one slice's processing window; never persisted
/// per-particle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleBatch {
    /// Comoving positions relative to the observer (Mpc/h)
    pub positions: Vec<[f64; 3]>,
    /// Scale factor at emission
    pub aemit: Vec<f64>,
}

impl ParticleBatch {
    /// Create an empty batch with the given capacity
    pub fn with_capacity(n: usize) -> Self {
        Self { positions: Vec::with_capacity(n), aemit: Vec::with_capacity(n) }
    }

    /// Number of particles in the batch
    pub fn len(&self) -> usize {
        self.aemit.len()
    }

    /// True if the batch holds no particles
    pub fn is_empty(&self) -> bool {
        self.aemit.is_empty()
    }

    /// Append one particle
    pub fn push(&mut self, position: [f64; 3], aemit: f64) {
        self.positions.push(position);
        self.aemit.push(aemit);
    }
}

/// One keyed contribution shipped through the global shuffle: a pixel index
/// with the weighted sum and occurrence count reduced under it so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRecord {
    /// Pixel index in `[0, npix)`
    pub pix: u64,
    /// Number of particles reduced into this record
    pub count: u64,
    /// Sum of particle weights reduced into this record
    pub sum: f64,
}

impl PixelRecord {
    /// Create a new record
    pub fn new(pix: u64, count: u64, sum: f64) -> Self {
        Self { pix, count, sum }
    }

    /// Fold another record for the same pixel into this one.
    pub fn merge(&mut self, other: &PixelRecord) {
        debug_assert_eq!(self.pix, other.pix);
        self.count += other.count;
        self.sum += other.sum;
    }
}
