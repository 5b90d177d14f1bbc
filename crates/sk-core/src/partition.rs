//! Ownership-partition arithmetic.
//!
//! Every distributed array in SkyKappa is split into contiguous,
//! non-overlapping, exhaustive per-rank ranges by the same integer formula:
//! rank `r` of `size` owns `[total*r/size, total*(r+1)/size)`. Independent
//! ranks recompute range boundaries from this formula alone, with no
//! discovery round, so it must stay bit-for-bit stable.

use std::ops::Range;

/// Length of rank `r`'s owned range of a `total`-element array.
pub fn local_size(total: usize, rank: usize, size: usize) -> usize {
    total * (rank + 1) / size - total * rank / size
}

/// Rank `r`'s owned index range of a `total`-element array.
pub fn owned_range(total: usize, rank: usize, size: usize) -> Range<usize> {
    total * rank / size..total * (rank + 1) / size
}

/// Owned-range lengths for all ranks, in rank order.
pub fn partition_sizes(total: usize, size: usize) -> Vec<usize> {
    (0..size).map(|r| local_size(total, r, size)).collect()
}

/// The rank whose owned range contains `index`.
pub fn owner_of(total: usize, size: usize, index: usize) -> usize {
    debug_assert!(index < total);
    // The candidate can only undershoot: total*r <= index*size implies
    // total*r/size <= index.
    let mut r = index * size / total;
    while total * (r + 1) / size <= index {
        r += 1;
    }
    r
}

/// Rank `r`'s even share of an arbitrary index range (same formula applied
/// to the range length, offset by its start).
pub fn sub_range(range: Range<u64>, rank: usize, size: usize) -> Range<u64> {
    let total = (range.end - range.start) as usize;
    let own = owned_range(total, rank, size);
    range.start + own.start as u64..range.start + own.end as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_complete_no_gaps() {
        for &total in &[0usize, 1, 5, 12, 97, 786_432] {
            for &size in &[1usize, 2, 3, 4, 7, 64] {
                let mut covered = 0;
                let mut next = 0;
                for r in 0..size {
                    let range = owned_range(total, r, size);
                    assert_eq!(range.start, next, "gap or overlap at rank {r}");
                    assert_eq!(range.len(), local_size(total, r, size));
                    covered += range.len();
                    next = range.end;
                }
                assert_eq!(covered, total);
                assert_eq!(next, total);
            }
        }
    }

    #[test]
    fn test_scenario_npix_12_four_ranks() {
        // 12 pixels over 4 ranks: each rank owns exactly 3.
        let sizes = partition_sizes(12, 4);
        assert_eq!(sizes, vec![3, 3, 3, 3]);
        assert_eq!(owned_range(12, 0, 4), 0..3);
        assert_eq!(owned_range(12, 3, 4), 9..12);
    }

    #[test]
    fn test_owner_of_matches_ranges() {
        for &total in &[1usize, 7, 12, 100] {
            for &size in &[1usize, 2, 5, 8] {
                for index in 0..total {
                    let r = owner_of(total, size, index);
                    assert!(owned_range(total, r, size).contains(&index));
                }
            }
        }
    }

    #[test]
    fn test_sub_range_offsets() {
        let share = sub_range(100..110, 1, 3);
        assert_eq!(share, 103..106);
        let whole: u64 =
            (0..3).map(|r| sub_range(100..110, r, 3)).map(|s| s.end - s.start).sum();
        assert_eq!(whole, 10);
    }
}
