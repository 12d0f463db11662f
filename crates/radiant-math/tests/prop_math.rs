// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Property-Based Tests (proptest) for radiant-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for radiant-math using proptest.
//!
//! Covers: CDF sampling, frequency-grid location, Brent root finding,
//! dense LU solves, table interpolation.

use ndarray::{Array1, Array2};
use proptest::prelude::*;
use radiant_math::brent::brent_solve;
use radiant_math::cdf::CdfArray;
use radiant_math::freq::FrequencyGrid;
use radiant_math::lu::lu_solve;
use radiant_math::table::LookupTable;

// ── CDF Properties ───────────────────────────────────────────────────

proptest! {
    /// After normalize, the prefix sum is monotone and ends at 1.
    #[test]
    fn cdf_monotone_ends_at_one(weights in prop::collection::vec(0.0f64..100.0, 2..40)) {
        let total: f64 = weights.iter().sum();
        prop_assume!(total > 1e-6);
        let mut cdf = CdfArray::new(weights.len());
        for (i, w) in weights.iter().enumerate() {
            cdf.set_value(i, *w);
        }
        cdf.normalize();
        prop_assert!((cdf.cumulative(weights.len() - 1) - 1.0).abs() < 1e-12);
        for i in 1..weights.len() {
            prop_assert!(cdf.cumulative(i) + 1e-15 >= cdf.cumulative(i - 1));
        }
    }

    /// sample(u) lands on a bin with nonzero weight and brackets u.
    #[test]
    fn cdf_sample_brackets_u(
        weights in prop::collection::vec(0.0f64..10.0, 2..30),
        u in 0.0f64..1.0,
    ) {
        let total: f64 = weights.iter().sum();
        prop_assume!(total > 1e-6);
        let mut cdf = CdfArray::new(weights.len());
        for (i, w) in weights.iter().enumerate() {
            cdf.set_value(i, *w);
        }
        cdf.normalize();
        let i = cdf.sample(u);
        let lo = if i == 0 { 0.0 } else { cdf.cumulative(i - 1) };
        prop_assert!(lo <= u + 1e-12);
        prop_assert!(u < cdf.cumulative(i) + 1e-12);
    }

    /// Sampling is invariant under rescaling all weights by a constant.
    #[test]
    fn cdf_sample_scale_invariant(
        weights in prop::collection::vec(0.01f64..10.0, 2..20),
        scale in 0.01f64..1e6,
        u in 0.0f64..1.0,
    ) {
        let mut a = CdfArray::new(weights.len());
        let mut b = CdfArray::new(weights.len());
        for (i, w) in weights.iter().enumerate() {
            a.set_value(i, *w);
            b.set_value(i, *w * scale);
        }
        a.normalize();
        b.normalize();
        prop_assert_eq!(a.sample(u), b.sample(u));
    }
}

// ── Frequency Grid Properties ────────────────────────────────────────

proptest! {
    /// locate composed with left/right reconstructs the containing bin.
    #[test]
    fn grid_locate_bin_contains_x(
        n in 2usize..80,
        frac in 0.0f64..1.0,
    ) {
        let g = FrequencyGrid::linear(1.0e14, 2.0e15, 1.9e15 / n as f64);
        let x = 1.0e14 + frac * (g.maxval() - 1.0e14) * 0.999999;
        let i = g.locate_within_bounds(x);
        prop_assert!(g.left(i) <= x + 1e-3);
        prop_assert!(x <= g.right(i) + 1e-3);
    }

    /// In-bin sampling stays inside the bin for any u in [0, 1).
    #[test]
    fn grid_sample_within_bin(n in 1usize..50, u in 0.0f64..1.0) {
        let g = FrequencyGrid::linear(1.0, 101.0, 100.0 / n as f64);
        for i in 0..g.len() {
            let x = g.sample(i, u);
            prop_assert!(g.left(i) <= x && x <= g.right(i) + 1e-12);
        }
    }

    /// Bin widths sum to the grid span.
    #[test]
    fn grid_deltas_tile_span(n in 1usize..100) {
        let g = FrequencyGrid::linear(3.0, 7.0, 4.0 / n as f64);
        let sum: f64 = (0..g.len()).map(|i| g.delta(i)).sum();
        prop_assert!((sum - (g.maxval() - g.minval())).abs() < 1e-9);
    }
}

// ── Brent Properties ─────────────────────────────────────────────────

proptest! {
    /// For a monotone cubic with a bracketed root, the residual at the
    /// returned root is small.
    #[test]
    fn brent_residual_small(shift in -8.0f64..8.0) {
        let f = move |x: f64| x * x * x + 2.0 * x - shift;
        let fa = f(-10.0);
        let fb = f(10.0);
        prop_assume!(fa * fb < 0.0);
        let r = brent_solve(f, -10.0, 10.0, 1e-14, 500).unwrap();
        prop_assert!(f(r.root).abs() < 1e-8, "residual {} at {}", f(r.root), r.root);
    }
}

// ── LU Properties ────────────────────────────────────────────────────

proptest! {
    /// Diagonally dominant systems solve with small residual.
    #[test]
    fn lu_ax_eq_b(n in 2usize..12) {
        let a = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                (n as f64) + 1.0
            } else {
                ((i * 7 + j * 3) as f64).sin()
            }
        });
        let b = Array1::from_shape_fn(n, |i| (i as f64 + 1.0).cos());
        let x = lu_solve(a.clone(), &b).unwrap();
        let ax = a.dot(&x);
        for i in 0..n {
            prop_assert!((ax[i] - b[i]).abs() < 1e-9,
                "residual at {}: {} vs {}", i, ax[i], b[i]);
        }
    }
}

// ── Table Properties ─────────────────────────────────────────────────

proptest! {
    /// Interpolation of a linear function is exact inside the table.
    #[test]
    fn table_linear_exact(
        slope in -10.0f64..10.0,
        intercept in -5.0f64..5.0,
        x in 0.05f64..9.95,
    ) {
        let xs: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&v| slope * v + intercept).collect();
        let t = LookupTable::new(xs, ys);
        let expected = slope * x + intercept;
        prop_assert!((t.value_at(x) - expected).abs() < 1e-10);
    }
}
