//! The slice pipeline.
//!
//! One pass over the light-cone, far to near: read a redshift slice
//! through the catalog index, project its particles once, then for every
//! source plane weight, aggregate and accumulate. All ranks execute this
//! loop in lock-step; barriers between stages bound peak memory and keep
//! rank-0 log lines in stage order.

use rayon::prelude::*;

use sk_catalog::LightconeCatalog;
use sk_core::{sub_range, Communicator, Result};
use sk_dist::aggregate;
use sk_lens::{ang2pix_ring, lens_weight, nside2npix, sphere_angles};

use crate::accumulate::CumulativeResult;
use crate::config::PipelineConfig;

/// Subsample target for the mean-subtraction integral: roughly one point
/// per `csize / 100_000` particles, never fewer than every particle.
const KAPPABAR_SUBSAMPLE: u64 = 100_000;

/// Per-slice projected particle columns, reused across source planes.
struct Projection {
    ipix: Vec<u64>,
    dl: Vec<f64>,
    zl: Vec<f64>,
    area: Vec<f64>,
}

fn project(
    positions: &[[f64; 3]],
    aemit: &[f64],
    nside: u64,
) -> Projection {
    let npix = nside2npix(nside);
    let dl: Vec<f64> = positions
        .par_iter()
        .map(|p| (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt())
        .collect();
    let ipix: Vec<u64> = positions
        .par_iter()
        .map(|p| {
            let (theta, phi) = sphere_angles(p);
            ang2pix_ring(nside, theta, phi)
        })
        .collect();
    let zl: Vec<f64> = aemit.par_iter().map(|&a| 1.0 / a - 1.0).collect();
    let pix_area = 4.0 * std::f64::consts::PI / npix as f64;
    let area: Vec<f64> = dl.par_iter().map(|&d| pix_area * d * d).collect();
    Projection { ipix, dl, zl, area }
}

/// Mean-subtraction constant for one (slice, plane): subsample the slice's
/// (distance, kernel) pairs on a global stride, gather to rank 0, sort by
/// distance and integrate the kernel with the trapezoidal rule, then
/// broadcast the scalar.
fn kappabar<C: Communicator>(dl: &[f64], kernel: &[f64], csize: u64, comm: &C) -> f64 {
    let every = (csize / KAPPABAR_SUBSAMPLE).max(1);

    let counts: Vec<u64> =
        comm.all_gather(vec![dl.len() as u64]).into_iter().flatten().collect();
    let my_offset: u64 = counts[..comm.rank()].iter().sum();

    let mut pairs: Vec<(f64, f64)> = Vec::new();
    let mut g = my_offset.div_ceil(every) * every;
    while g < my_offset + dl.len() as u64 {
        let i = (g - my_offset) as usize;
        pairs.push((dl[i], kernel[i]));
        g += every;
    }

    let gathered = comm.gather(0, pairs);
    let value = if let Some(parts) = gathered {
        let mut sample: Vec<(f64, f64)> = parts.into_iter().flatten().collect();
        sample.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut integral = 0.0;
        for w in sample.windows(2) {
            integral += 0.5 * (w[0].1 + w[1].1) * (w[1].0 - w[0].0);
        }
        Some(integral)
    } else {
        None
    };
    comm.broadcast(0, value)
}

/// Run the whole slice x source-plane matrix and return this rank's
/// accumulated result.
pub fn run<C, K>(cfg: &PipelineConfig, catalog: &K, comm: &C) -> Result<CumulativeResult>
where
    C: Communicator,
    K: LightconeCatalog,
{
    cfg.validate()?;

    let rank = comm.rank();
    let size = comm.size();
    let npix = nside2npix(cfg.nside);
    let own_len = sk_core::local_size(npix as usize, rank, size);

    let meta = catalog.meta();
    let nbar = meta.nbar();
    let edges = cfg.slice_edges();
    let n_slices = edges.len() - 1;

    if rank == 0 {
        tracing::info!(
            nside = cfg.nside,
            npix,
            nbar,
            slices = n_slices,
            planes = cfg.planes.len(),
            "starting map pass"
        );
    }

    let mut acc = CumulativeResult::new(
        cfg.planes.clone(),
        cfg.nside,
        npix,
        cfg.zlmin,
        cfg.zlmax,
        cfg.zstep,
        nbar,
        own_len,
        n_slices,
    );

    for slice in 0..n_slices {
        let (z1, z2) = (edges[slice], edges[slice + 1]);

        let rows = catalog.index().row_range(1.0 / (1.0 + z1), 1.0 / (1.0 + z2));
        let share = sub_range(rows, rank, size);
        let batch = catalog.read_rows(share)?;

        let csize = comm.all_reduce_u64(batch.len() as u64);
        if csize == 0 {
            continue;
        }
        if rank == 0 {
            tracing::info!(slice, z1, z2, particles = csize, "slice read");
        }

        let proj = project(&batch.positions, &batch.aemit, cfg.nside);
        drop(batch);

        comm.barrier();
        if rank == 0 {
            tracing::debug!(slice, "projection done");
        }

        for (plane_idx, plane) in cfg.planes.iter().enumerate() {
            let kernel: Vec<f64> = proj
                .dl
                .par_iter()
                .zip(proj.zl.par_iter())
                .map(|(&dl, &zl)| lens_weight(meta.om, dl, zl, plane.ds))
                .collect();
            let weights: Vec<f64> = kernel
                .par_iter()
                .zip(proj.area.par_iter())
                .map(|(&k, &a)| k / (a * nbar))
                .collect();

            comm.barrier();
            let (sums, counts) = aggregate(&proj.ipix, &weights, npix, comm)?;
            drop(weights);
            comm.barrier();

            let kbar = kappabar(&proj.dl, &kernel, csize, comm);
            if rank == 0 {
                tracing::info!(slice, zs = plane.zs, kappabar = kbar, "source plane aggregated");
            }

            acc.accumulate(slice, plane_idx, sums, counts, kbar);
        }
    }

    comm.barrier();
    Ok(acc)
}
