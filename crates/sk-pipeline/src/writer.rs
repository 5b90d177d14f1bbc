//! Map artifact writer.
//!
//! # Schema: `skykappa_map_v1`
//!
//! One Parquet file per source plane, `WL-{zs:.2}-N{nside:04}.parquet`:
//!
//! | Column         | Arrow Type | Description                        |
//! |----------------|------------|------------------------------------|
//! | `kappa`        | `Float64`  | Accumulated convergence per pixel  |
//! | `nm`           | `UInt64`   | Accumulated particle count         |
//! | `slice_{i:03}` | `Float64`  | Per-slice convergence, far to near |
//!
//! Rows are ring-ordered pixels, `npix` of them. Key-value metadata:
//! `skykappa.schema_version` and `skykappa.map` (JSON [`MapProvenance`]).
//! The kappa column and the kappabar constant are reported separately;
//! recentering to zero mean is `kappa - kappabar`, applied downstream.
//!
//! Owned slices are gathered rank-by-rank to rank 0, which is the only
//! writer; other ranks just feed the gather collectives.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use sk_core::{Communicator, Error, Result};

use crate::accumulate::CumulativeResult;

/// Schema version string embedded in Parquet key-value metadata.
pub const MAP_SCHEMA_V1: &str = "skykappa_map_v1";

/// Parquet metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "skykappa.schema_version";

/// Parquet metadata key for map provenance (JSON).
pub const META_KEY_MAP: &str = "skykappa.map";

/// Provenance attributes attached to every map artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapProvenance {
    /// Mean-subtraction constant for this plane.
    pub kappabar: f64,
    /// HEALPix resolution parameter.
    pub nside: u64,
    /// Lower lens redshift bound.
    pub zlmin: f64,
    /// Upper lens redshift bound.
    pub zlmax: f64,
    /// Lens redshift step.
    pub zstep: f64,
    /// Source redshift.
    pub zs: f64,
    /// Source-plane comoving distance (Mpc/h).
    pub ds: f64,
    /// Mean particle number density of the catalog.
    pub nbar: f64,
}

/// Artifact file name for one source plane.
pub fn map_file_name(zs: f64, nside: u64) -> String {
    format!("WL-{zs:.2}-N{nside:04}.parquet")
}

fn gather_full<C: Communicator>(owned: &[f64], comm: &C) -> Option<Vec<f64>> {
    comm.gather(0, owned.to_vec()).map(|parts| parts.into_iter().flatten().collect())
}

/// Gather the accumulated result to rank 0 and write one artifact per
/// source plane into `out_dir`. Returns the written paths on rank 0 and
/// an empty list elsewhere.
pub fn write_maps<C: Communicator>(
    out_dir: &Path,
    result: &CumulativeResult,
    comm: &C,
) -> Result<Vec<PathBuf>> {
    let rank = comm.rank();
    if rank == 0 {
        std::fs::create_dir_all(out_dir)?;
    }

    let mut written = Vec::new();
    for (plane_idx, plane) in result.planes.iter().enumerate() {
        let kappa = gather_full(&result.kappa[plane_idx], comm);
        let nm = comm
            .gather(0, result.nm[plane_idx].clone())
            .map(|parts| parts.into_iter().flatten().collect::<Vec<u64>>());

        let mut slices: Vec<Vec<f64>> = Vec::new();
        for s in 0..result.n_slices() {
            if let Some(full) = gather_full(&result.history[s][plane_idx], comm) {
                slices.push(full);
            }
        }

        if rank != 0 {
            continue;
        }
        let kappa = kappa.expect("rank 0 receives the gather");
        let nm = nm.expect("rank 0 receives the gather");
        if kappa.len() != result.npix as usize {
            return Err(Error::Computation(format!(
                "gathered map has {} pixels, expected {}",
                kappa.len(),
                result.npix
            )));
        }

        let provenance = MapProvenance {
            kappabar: result.kappabar[plane_idx],
            nside: result.nside,
            zlmin: result.zlmin,
            zlmax: result.zlmax,
            zstep: result.zstep,
            zs: plane.zs,
            ds: plane.ds,
            nbar: result.nbar,
        };
        let metadata = HashMap::from([
            (META_KEY_SCHEMA_VERSION.to_string(), MAP_SCHEMA_V1.to_string()),
            (META_KEY_MAP.to_string(), serde_json::to_string(&provenance)?),
        ]);

        let mut fields = vec![
            Field::new("kappa", DataType::Float64, false),
            Field::new("nm", DataType::UInt64, false),
        ];
        let mut arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(Float64Array::from(kappa)),
            Arc::new(UInt64Array::from(nm)),
        ];
        for (s, full) in slices.into_iter().enumerate() {
            fields.push(Field::new(format!("slice_{s:03}"), DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(full)));
        }

        let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
        let batch = RecordBatch::try_new(schema, arrays)
            .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))?;

        let path = out_dir.join(map_file_name(plane.zs, result.nside));
        let file = std::fs::File::create(&path)
            .map_err(|e| Error::Validation(format!("failed to create {}: {e}", path.display())))?;
        let props = parquet::file::properties::WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();
        let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), Some(props))
            .map_err(|e| Error::Validation(format!("failed to create Parquet writer: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| Error::Validation(format!("failed to write Parquet: {e}")))?;
        writer
            .close()
            .map_err(|e| Error::Validation(format!("failed to close Parquet writer: {e}")))?;

        tracing::info!(path = %path.display(), zs = plane.zs, "map written");
        written.push(path);
    }

    comm.barrier();
    Ok(written)
}
