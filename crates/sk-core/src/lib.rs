//! # sk-core
//!
//! Shared foundation for SkyKappa: the workspace error type, the core data
//! types carried between crates, the pixel-ownership partition arithmetic,
//! and the `Communicator` collective-transport trait.
//!
//! This crate defines the seams only. Concrete transports live in `sk-dist`
//! and concrete catalogs in `sk-catalog`, so high-level pipeline logic does
//! not depend on a particular message-passing layer.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Collective transport trait.
pub mod comm;
/// Error types.
pub mod error;
/// Ownership-partition arithmetic.
pub mod partition;
/// Common data types.
pub mod types;

pub use comm::Communicator;
pub use error::{Error, Result};
pub use partition::{local_size, owned_range, owner_of, partition_sizes, sub_range};
pub use types::{CatalogMeta, ParticleBatch, PixelRecord, SourcePlane};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
