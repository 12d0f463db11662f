// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — CDF Array
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Discrete cumulative distribution over bin weights.
//!
//! Weights are staged with `set_value` and turned into a normalized
//! prefix sum by `normalize`; `sample` inverts the CDF by binary search.

/// Monotone nondecreasing prefix sum over a weight sequence.
#[derive(Debug, Clone, Default)]
pub struct CdfArray {
    weights: Vec<f64>,
    cum: Vec<f64>,
    /// Total weight captured by the last `normalize` call.
    total: f64,
}

impl CdfArray {
    pub fn new(n: usize) -> Self {
        CdfArray {
            weights: vec![0.0; n],
            cum: vec![0.0; n],
            total: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn resize(&mut self, n: usize) {
        self.weights.resize(n, 0.0);
        self.cum.resize(n, 0.0);
        self.total = 0.0;
    }

    /// Stage the weight of bin `i`. Negative weights are an invariant
    /// violation and panic.
    pub fn set_value(&mut self, i: usize, w: f64) {
        assert!(w >= 0.0, "CDF weight must be non-negative, got {w}");
        self.weights[i] = w;
    }

    /// Weight of bin `i` as staged.
    pub fn get_value(&self, i: usize) -> f64 {
        self.weights[i]
    }

    /// Zero all weights and the prefix sum.
    pub fn wipe(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 0.0);
        self.cum.iter_mut().for_each(|c| *c = 0.0);
        self.total = 0.0;
    }

    /// Build the normalized prefix sum; returns the total weight.
    /// With zero total the CDF stays flat and `sample` keeps returning 0.
    pub fn normalize(&mut self) -> f64 {
        let mut run = 0.0;
        for (c, &w) in self.cum.iter_mut().zip(self.weights.iter()) {
            run += w;
            *c = run;
        }
        self.total = run;
        if run > 0.0 {
            for c in self.cum.iter_mut() {
                *c /= run;
            }
        }
        run
    }

    /// Total weight at the last `normalize`.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Normalized cumulative value at bin `i`.
    pub fn cumulative(&self, i: usize) -> f64 {
        self.cum[i]
    }

    /// Invert the CDF: the index `i` with CDF[i-1] <= u < CDF[i].
    pub fn sample(&self, u: f64) -> usize {
        self.cum
            .partition_point(|&c| c <= u)
            .min(self.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_last_entry_is_one() {
        let mut cdf = CdfArray::new(4);
        for (i, w) in [1.0, 3.0, 2.0, 4.0].iter().enumerate() {
            cdf.set_value(i, *w);
        }
        let total = cdf.normalize();
        assert!((total - 10.0).abs() < 1e-14);
        assert!((cdf.cumulative(3) - 1.0).abs() < 1e-14);
        for i in 1..4 {
            assert!(cdf.cumulative(i) >= cdf.cumulative(i - 1));
        }
    }

    #[test]
    fn test_sample_returns_bracketing_index() {
        let mut cdf = CdfArray::new(3);
        cdf.set_value(0, 0.2);
        cdf.set_value(1, 0.5);
        cdf.set_value(2, 0.3);
        cdf.normalize();
        assert_eq!(cdf.sample(0.0), 0);
        assert_eq!(cdf.sample(0.1999), 0);
        assert_eq!(cdf.sample(0.2001), 1);
        assert_eq!(cdf.sample(0.6999), 1);
        assert_eq!(cdf.sample(0.7001), 2);
        assert_eq!(cdf.sample(0.9999), 2);
    }

    #[test]
    fn test_sample_skips_zero_weight_bins() {
        let mut cdf = CdfArray::new(4);
        cdf.set_value(1, 5.0);
        cdf.set_value(3, 5.0);
        cdf.normalize();
        assert_eq!(cdf.sample(0.25), 1);
        assert_eq!(cdf.sample(0.75), 3);
    }

    #[test]
    fn test_rescaling_weights_leaves_samples_invariant() {
        let weights = [0.7, 1.1, 0.0, 2.2, 0.4];
        let mut a = CdfArray::new(5);
        let mut b = CdfArray::new(5);
        for (i, w) in weights.iter().enumerate() {
            a.set_value(i, *w);
            b.set_value(i, *w * 137.0);
        }
        a.normalize();
        b.normalize();
        for k in 0..100 {
            let u = k as f64 / 100.0;
            assert_eq!(a.sample(u), b.sample(u));
        }
    }

    #[test]
    fn test_empirical_frequencies_match_weights() {
        let mut cdf = CdfArray::new(2);
        cdf.set_value(0, 3.0);
        cdf.set_value(1, 1.0);
        cdf.normalize();
        let n = 100_000;
        let mut hits = 0usize;
        for k in 0..n {
            // low-discrepancy sweep over [0,1)
            let u = (k as f64 + 0.5) / n as f64;
            if cdf.sample(u) == 0 {
                hits += 1;
            }
        }
        let frac = hits as f64 / n as f64;
        assert!((frac - 0.75).abs() < 1e-3, "fraction {frac} != 0.75");
    }

    #[test]
    fn test_wipe_resets_totals() {
        let mut cdf = CdfArray::new(2);
        cdf.set_value(0, 1.0);
        cdf.normalize();
        cdf.wipe();
        assert_eq!(cdf.total(), 0.0);
        assert_eq!(cdf.normalize(), 0.0);
        assert_eq!(cdf.sample(0.5), 0);
    }
}
