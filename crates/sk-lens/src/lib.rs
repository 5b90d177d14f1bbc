//! # sk-lens
//!
//! Scientific leaf math for SkyKappa: the ring-scheme HEALPix projection,
//! the lensing-efficiency kernel, and the comoving-distance conversion for
//! source planes. Everything here is a pure function over `f64`s; the
//! formulas are fixed scientific content and the pipeline treats them as
//! black boxes.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Comoving distance for a flat LCDM background.
pub mod cosmology;
/// HEALPix ring-scheme pixelization.
pub mod healpix;
/// Lensing-efficiency kernel.
pub mod kernel;

pub use cosmology::{comoving_distance, redshift_at_distance};
pub use healpix::{ang2pix_ring, nside2npix, sphere_angles};
pub use kernel::lens_weight;
