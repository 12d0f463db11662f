// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Rank Partitioning
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Deterministic rank decomposition of the zone range and the reduction
//! primitives the step barrier needs. The collective operations run as
//! single-process identities here and can be wired to an MPI binding
//! later without touching the callers.

use crate::rng::TransportRng;

/// One rank's view of the zone partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLayout {
    pub rank: usize,
    pub nranks: usize,
    pub zone_start: usize,
    pub zone_stop: usize,
}

impl RankLayout {
    /// Contiguous block partition of `[0, n_zones)`; remainder zones go
    /// to the first ranks.
    pub fn new(rank: usize, nranks: usize, n_zones: usize) -> Self {
        assert!(nranks >= 1 && rank < nranks, "bad rank layout");
        let blocks = n_zones / nranks;
        let remainder = n_zones % nranks;
        let mut rcount = 0;
        let mut zone_start = 0;
        let mut zone_stop = 0;
        for i in 0..nranks {
            let start = i * blocks + rcount;
            let mut stop = start + blocks;
            if rcount < remainder {
                stop += 1;
                rcount += 1;
            }
            if i == rank {
                zone_start = start;
                zone_stop = stop;
            }
        }
        RankLayout {
            rank,
            nranks,
            zone_start,
            zone_stop,
        }
    }

    /// Single-rank layout covering everything.
    pub fn serial(n_zones: usize) -> Self {
        RankLayout::new(0, 1, n_zones)
    }

    pub fn local_zones(&self) -> std::ops::Range<usize> {
        self.zone_start..self.zone_stop
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// This rank's share of `total` emitted packets: floor split plus a
    /// single stochastic remainder packet, exact in expectation only.
    pub fn emission_count(&self, total: usize, rng: &mut TransportRng) -> usize {
        let mut my_n = total / self.nranks;
        let remainder = total as f64 / self.nranks as f64 - my_n as f64;
        if rng.uniform() < remainder {
            my_n += 1;
        }
        my_n
    }

    /// Element-wise sum all-reduce over a zone-sized buffer. Identity in
    /// a single process.
    pub fn allreduce_sum(&self, _buf: &mut [f64]) {}

    /// Scalar sum across ranks. Identity in a single process.
    pub fn allreduce_scalar(&self, x: f64) -> f64 {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_range_exactly() {
        let n_zones = 17;
        let nranks = 4;
        let layouts: Vec<RankLayout> = (0..nranks)
            .map(|r| RankLayout::new(r, nranks, n_zones))
            .collect();
        assert_eq!(layouts[0].zone_start, 0);
        assert_eq!(layouts[nranks - 1].zone_stop, n_zones);
        for w in layouts.windows(2) {
            assert_eq!(w[0].zone_stop, w[1].zone_start);
        }
        let covered: usize = layouts.iter().map(|l| l.zone_stop - l.zone_start).sum();
        assert_eq!(covered, n_zones);
    }

    #[test]
    fn test_remainder_zones_go_first() {
        let layouts: Vec<RankLayout> = (0..3).map(|r| RankLayout::new(r, 3, 11)).collect();
        let sizes: Vec<usize> = layouts.iter().map(|l| l.zone_stop - l.zone_start).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
    }

    #[test]
    fn test_emission_count_expectation() {
        let layout = RankLayout::new(0, 4, 8);
        let mut rng = TransportRng::new(true, 11, 0);
        let total = 10; // 2.5 per rank
        let n_trials = 20_000;
        let sum: usize = (0..n_trials)
            .map(|_| layout.emission_count(total, &mut rng))
            .sum();
        let mean = sum as f64 / n_trials as f64;
        assert!((mean - 2.5).abs() < 0.02, "mean emission {mean} != 2.5");
    }

    #[test]
    fn test_serial_layout() {
        let l = RankLayout::serial(9);
        assert!(l.is_root());
        assert_eq!(l.local_zones(), 0..9);
    }
}
