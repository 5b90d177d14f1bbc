//! Catalog trait and the in-memory implementation.

use sk_core::{CatalogMeta, Error, ParticleBatch, Result};
use std::ops::Range;

use crate::index::AemitIndex;

/// Read-only light-cone catalog: rows sorted by `aemit`, range lookup
/// through the prebuilt index, row reads by contiguous range.
///
/// The catalog is shared and read-only after construction; each rank reads
/// its own share of a row range, so implementations need no locking.
pub trait LightconeCatalog {
    /// Run-level metadata.
    fn meta(&self) -> CatalogMeta;

    /// The scale-factor index.
    fn index(&self) -> &AemitIndex;

    /// Total row count.
    fn n_rows(&self) -> u64;

    /// Read the rows in `rows` (half-open, in `[0, n_rows)`).
    fn read_rows(&self, rows: Range<u64>) -> Result<ParticleBatch>;
}

/// In-memory catalog, sorted by `aemit` on construction.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    meta: CatalogMeta,
    batch: ParticleBatch,
    index: AemitIndex,
}

impl MemoryCatalog {
    /// Build from unsorted particle columns and an index edge grid.
    pub fn new(
        positions: Vec<[f64; 3]>,
        aemit: Vec<f64>,
        meta: CatalogMeta,
        edges: Vec<f64>,
    ) -> Result<Self> {
        if positions.len() != aemit.len() {
            return Err(Error::Validation(format!(
                "position/aemit length mismatch: {} vs {}",
                positions.len(),
                aemit.len()
            )));
        }
        if aemit.iter().any(|a| !a.is_finite()) {
            return Err(Error::Validation("aemit values must be finite".into()));
        }

        let mut order: Vec<usize> = (0..aemit.len()).collect();
        order.sort_unstable_by(|&i, &j| aemit[i].total_cmp(&aemit[j]));

        let mut batch = ParticleBatch::with_capacity(aemit.len());
        for &i in &order {
            batch.push(positions[i], aemit[i]);
        }

        let index = AemitIndex::build(edges, &batch.aemit)?;
        Ok(Self { meta, batch, index })
    }
}

impl LightconeCatalog for MemoryCatalog {
    fn meta(&self) -> CatalogMeta {
        self.meta
    }

    fn index(&self) -> &AemitIndex {
        &self.index
    }

    fn n_rows(&self) -> u64 {
        self.batch.len() as u64
    }

    fn read_rows(&self, rows: Range<u64>) -> Result<ParticleBatch> {
        if rows.end > self.n_rows() || rows.start > rows.end {
            return Err(Error::Validation(format!(
                "row range {}..{} out of bounds (rows = {})",
                rows.start,
                rows.end,
                self.n_rows()
            )));
        }
        let span = rows.start as usize..rows.end as usize;
        Ok(ParticleBatch {
            positions: self.batch.positions[span.clone()].to_vec(),
            aemit: self.batch.aemit[span].to_vec(),
        })
    }
}
