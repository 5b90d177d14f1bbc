//! Distributed keyed aggregation.
//!
//! One aggregation pass turns worker-local (pixel, weight) pairs into the
//! caller's owned slice of the global map: per-pixel weighted sum and
//! particle count, exact across the whole group regardless of which rank
//! held which particles. The pass never materializes the full map on one
//! rank; exchange volume scales with unique pixels, not particles.

use sk_core::comm::Communicator;
use sk_core::{owned_range, owner_of, partition_sizes, Error, PixelRecord, Result};

use crate::merge::merge_sorted_runs;
use crate::sort::{gathered_counts, rebalance, sort_by_key};

/// Pre-reduce local pairs to one record per distinct local pixel.
fn local_pre_reduce(pix: &[u64], weights: &[f64]) -> Vec<PixelRecord> {
    let mut pairs: Vec<(u64, f64)> =
        pix.iter().copied().zip(weights.iter().copied()).collect();
    pairs.sort_unstable_by_key(|&(p, _)| p);

    let mut records: Vec<PixelRecord> = Vec::new();
    for (p, w) in pairs {
        match records.last_mut() {
            Some(last) if last.pix == p => {
                last.count += 1;
                last.sum += w;
            }
            _ => records.push(PixelRecord::new(p, 1, w)),
        }
    }
    records
}

/// Aggregate local (pixel, weight) pairs into this rank's owned map slice.
///
/// Every rank of the group must call this collectively with the same
/// `npix`. Returns `(weighted_sum, count)` of length
/// `local_size(npix, rank, size)` per the ownership formula.
///
/// The pass: local group-by-key pre-reduction, a sentinel record at
/// `npix - 1` so the sorted key space always spans the full map, global
/// sort-by-key with even record repartition, boundary-aware merge of equal
/// keys, and a final repartition into the fixed ownership layout (dense
/// fast path when every pixel is present, zero-filled scatter otherwise).
pub fn aggregate<C: Communicator>(
    pix: &[u64],
    weights: &[f64],
    npix: u64,
    comm: &C,
) -> Result<(Vec<f64>, Vec<u64>)> {
    if npix == 0 {
        return Err(Error::Validation("npix must be >= 1".into()));
    }
    if pix.len() != weights.len() {
        return Err(Error::Validation(format!(
            "pixel/weight length mismatch: {} vs {}",
            pix.len(),
            weights.len()
        )));
    }

    // Detect invalid indices collectively so every rank errors at the same
    // point of the collective sequence.
    let bad = pix.iter().filter(|&&p| p >= npix).count() as u64;
    if comm.all_reduce_u64(bad) != 0 {
        return Err(Error::Validation(format!(
            "pixel index out of range (npix = {npix})"
        )));
    }

    let rank = comm.rank();
    let size = comm.size();

    let mut records = local_pre_reduce(pix, weights);

    // Sentinel: guarantees the global sorted key space reaches npix - 1
    // even when the true maximum observed pixel is smaller.
    records.push(PixelRecord::new(npix - 1, 0, 0.0));

    let sorted = sort_by_key(records, npix, comm);
    let reduced = merge_sorted_runs(sorted, comm);

    let own = owned_range(npix as usize, rank, size);
    let distinct = comm.all_reduce_u64(reduced.len() as u64);

    if distinct == npix {
        // Every pixel is present: the reduced array is already the dense
        // map, so a straight rebalance into the ownership sizes suffices
        // and the pad step is skipped.
        let counts = gathered_counts(reduced.len(), comm);
        let owned = rebalance(reduced, &counts, &partition_sizes(npix as usize, size), comm);
        debug_assert!(owned
            .iter()
            .enumerate()
            .all(|(i, r)| r.pix as usize == own.start + i));
        let sums = owned.iter().map(|r| r.sum).collect();
        let cnts = owned.iter().map(|r| r.count).collect();
        return Ok((sums, cnts));
    }

    // Sparse: route each reduced record to its pixel's owner and scatter
    // into zero-initialized owned slices (absent pixels stay zero).
    let mut sends: Vec<Vec<PixelRecord>> = (0..size).map(|_| Vec::new()).collect();
    for rec in reduced {
        sends[owner_of(npix as usize, size, rec.pix as usize)].push(rec);
    }
    let mut sums = vec![0.0f64; own.len()];
    let mut cnts = vec![0u64; own.len()];
    for rec in comm.all_to_all(sends).into_iter().flatten() {
        let slot = rec.pix as usize - own.start;
        sums[slot] += rec.sum;
        cnts[slot] += rec.count;
    }
    Ok((sums, cnts))
}
