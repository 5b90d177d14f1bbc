//! Parquet-backed catalog.
//!
//! # Schema: `skykappa_catalog_v1`
//!
//! | Column  | Arrow Type | Description                       |
//! |---------|------------|-----------------------------------|
//! | `x`     | `Float64`  | Comoving position (Mpc/h)         |
//! | `y`     | `Float64`  | Comoving position (Mpc/h)         |
//! | `z`     | `Float64`  | Comoving position (Mpc/h)         |
//! | `aemit` | `Float64`  | Emission scale factor (row order) |
//!
//! Key-value metadata: `skykappa.schema_version`, `skykappa.meta`
//! (JSON [`CatalogMeta`]), `skykappa.aemit_index` (JSON [`AemitIndex`]).
//! Rows are written sorted by `aemit`; readers address contiguous row
//! ranges through Parquet row selection without loading the whole file.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Float64Array};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReaderBuilder, RowSelection, RowSelector};

use sk_core::{CatalogMeta, Error, ParticleBatch, Result};

use crate::catalog::LightconeCatalog;
use crate::index::AemitIndex;

/// Schema version string embedded in Parquet key-value metadata.
pub const CATALOG_SCHEMA_V1: &str = "skykappa_catalog_v1";

/// Parquet metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "skykappa.schema_version";

/// Parquet metadata key for the run-level catalog metadata (JSON).
pub const META_KEY_META: &str = "skykappa.meta";

/// Parquet metadata key for the scale-factor index (JSON).
pub const META_KEY_AEMIT_INDEX: &str = "skykappa.aemit_index";

const COLUMNS: [&str; 4] = ["x", "y", "z", "aemit"];

/// Write a particle catalog to a Parquet file.
///
/// Rows are sorted by `aemit` and the index is built over `edges` before
/// writing, so the file satisfies the catalog contract as stored.
pub fn write_catalog_parquet(
    path: &Path,
    positions: Vec<[f64; 3]>,
    aemit: Vec<f64>,
    meta: CatalogMeta,
    edges: Vec<f64>,
) -> Result<()> {
    if positions.len() != aemit.len() {
        return Err(Error::Validation(format!(
            "position/aemit length mismatch: {} vs {}",
            positions.len(),
            aemit.len()
        )));
    }

    let mut order: Vec<usize> = (0..aemit.len()).collect();
    order.sort_unstable_by(|&i, &j| aemit[i].total_cmp(&aemit[j]));
    let sorted_aemit: Vec<f64> = order.iter().map(|&i| aemit[i]).collect();
    let index = AemitIndex::build(edges, &sorted_aemit)?;

    let metadata = HashMap::from([
        (META_KEY_SCHEMA_VERSION.to_string(), CATALOG_SCHEMA_V1.to_string()),
        (META_KEY_META.to_string(), serde_json::to_string(&meta)?),
        (META_KEY_AEMIT_INDEX.to_string(), serde_json::to_string(&index)?),
    ]);

    let fields: Vec<Field> =
        COLUMNS.iter().map(|n| Field::new(*n, DataType::Float64, false)).collect();
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));

    let columns: [Vec<f64>; 4] = [
        order.iter().map(|&i| positions[i][0]).collect(),
        order.iter().map(|&i| positions[i][1]).collect(),
        order.iter().map(|&i| positions[i][2]).collect(),
        sorted_aemit,
    ];
    let arrays: Vec<Arc<dyn Array>> = columns
        .into_iter()
        .map(|col| Arc::new(Float64Array::from(col)) as Arc<dyn Array>)
        .collect();

    let batch = RecordBatch::try_new(schema, arrays)
        .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))?;

    let file = std::fs::File::create(path)
        .map_err(|e| Error::Validation(format!("failed to create {}: {e}", path.display())))?;
    let props = parquet::file::properties::WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| Error::Validation(format!("failed to create Parquet writer: {e}")))?;
    writer.write(&batch).map_err(|e| Error::Validation(format!("failed to write Parquet: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::Validation(format!("failed to close Parquet writer: {e}")))?;
    Ok(())
}

/// Parquet-backed light-cone catalog.
///
/// `open` reads only the footer (row count, metadata, index); row data is
/// read on demand per range.
pub struct ParquetCatalog {
    path: PathBuf,
    meta: CatalogMeta,
    index: AemitIndex,
    n_rows: u64,
}

impl ParquetCatalog {
    /// Open a catalog file, validating schema version and index shape.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Validation(format!("failed to open {}: {e}", path.display())))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::Validation(format!("failed to read Parquet: {e}")))?;

        let n_rows = builder.metadata().file_metadata().num_rows() as u64;
        let schema_meta = builder.schema().metadata().clone();

        match schema_meta.get(META_KEY_SCHEMA_VERSION).map(String::as_str) {
            Some(CATALOG_SCHEMA_V1) => {}
            other => {
                return Err(Error::Validation(format!(
                    "unsupported catalog schema version: {other:?}"
                )))
            }
        }

        let meta: CatalogMeta = serde_json::from_str(
            schema_meta
                .get(META_KEY_META)
                .ok_or_else(|| Error::Validation(format!("missing {META_KEY_META} metadata")))?,
        )?;
        let index: AemitIndex =
            serde_json::from_str(schema_meta.get(META_KEY_AEMIT_INDEX).ok_or_else(|| {
                Error::Validation(format!("missing {META_KEY_AEMIT_INDEX} metadata"))
            })?)?;
        index.validate()?;
        if index.n_rows() != n_rows {
            return Err(Error::Validation(format!(
                "aemit index covers {} rows but file has {n_rows}",
                index.n_rows()
            )));
        }

        Ok(Self { path: path.to_path_buf(), meta, index, n_rows })
    }

    fn column_values(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
        use arrow::array::AsArray;
        let idx = batch
            .schema()
            .index_of(name)
            .map_err(|_| Error::Validation(format!("missing catalog column '{name}'")))?;
        let arr = batch.column(idx);
        if arr.data_type() != &DataType::Float64 {
            return Err(Error::Validation(format!(
                "column '{name}' has type {:?}, expected Float64",
                arr.data_type()
            )));
        }
        Ok(arr.as_primitive::<Float64Type>().values().to_vec())
    }
}

impl LightconeCatalog for ParquetCatalog {
    fn meta(&self) -> CatalogMeta {
        self.meta
    }

    fn index(&self) -> &AemitIndex {
        &self.index
    }

    fn n_rows(&self) -> u64 {
        self.n_rows
    }

    fn read_rows(&self, rows: Range<u64>) -> Result<ParticleBatch> {
        if rows.end > self.n_rows || rows.start > rows.end {
            return Err(Error::Validation(format!(
                "row range {}..{} out of bounds (rows = {})",
                rows.start, rows.end, self.n_rows
            )));
        }
        let n = (rows.end - rows.start) as usize;
        if n == 0 {
            return Ok(ParticleBatch::default());
        }

        let file = std::fs::File::open(&self.path).map_err(|e| {
            Error::Validation(format!("failed to open {}: {e}", self.path.display()))
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::Validation(format!("failed to read Parquet: {e}")))?;

        let mut selectors = Vec::with_capacity(2);
        if rows.start > 0 {
            selectors.push(RowSelector::skip(rows.start as usize));
        }
        selectors.push(RowSelector::select(n));
        let reader = builder
            .with_row_selection(RowSelection::from(selectors))
            .build()
            .map_err(|e| Error::Validation(format!("failed to build Parquet reader: {e}")))?;

        let mut batch = ParticleBatch::with_capacity(n);
        for maybe in reader {
            let rb =
                maybe.map_err(|e| Error::Validation(format!("failed to decode Parquet: {e}")))?;
            let x = Self::column_values(&rb, "x")?;
            let y = Self::column_values(&rb, "y")?;
            let z = Self::column_values(&rb, "z")?;
            let aemit = Self::column_values(&rb, "aemit")?;
            for i in 0..rb.num_rows() {
                batch.push([x[i], y[i], z[i]], aemit[i]);
            }
        }
        if batch.len() != n {
            return Err(Error::Validation(format!(
                "short Parquet read: wanted {n} rows, got {}",
                batch.len()
            )));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> CatalogMeta {
        CatalogMeta { om: 0.31, nc: 32.0, box_size: 64.0, particle_fraction: 1.0 }
    }

    #[test]
    fn test_roundtrip_and_range_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.parquet");

        // Deliberately unsorted; the writer sorts by aemit.
        let aemit = vec![0.8, 0.2, 0.6, 0.4, 0.9];
        let positions: Vec<[f64; 3]> =
            aemit.iter().map(|&a| [a, 2.0 * a, -a]).collect();

        write_catalog_parquet(&path, positions, aemit, meta(), vec![0.3, 0.5, 0.7]).unwrap();

        let cat = ParquetCatalog::open(&path).unwrap();
        assert_eq!(cat.n_rows(), 5);
        assert_eq!(cat.meta(), meta());

        let all = cat.read_rows(0..5).unwrap();
        assert_eq!(all.aemit, vec![0.2, 0.4, 0.6, 0.8, 0.9]);
        assert_eq!(all.positions[0], [0.2, 0.4, -0.2]);

        let rows = cat.index().row_range(0.3, 0.7);
        assert_eq!(rows, 1..3);
        let mid = cat.read_rows(rows).unwrap();
        assert_eq!(mid.aemit, vec![0.4, 0.6]);

        assert!(cat.read_rows(0..0).unwrap().is_empty());
        assert!(cat.read_rows(4..9).is_err());
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_catalog.parquet");
        std::fs::write(&path, b"junk").unwrap();
        assert!(ParquetCatalog::open(&path).is_err());
    }
}
