// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Spectrum Array
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Observer-frame 4-D histogram over (time, frequency, mu, phi).

use ndarray::Array4;
use radiant_math::freq::FrequencyGrid;
use radiant_types::config::{FrequencyGridSpec, SpectrumSection};

/// Escaped-packet histogram; counts are commutative so merging across
/// ranks is a plain element-wise sum.
#[derive(Debug, Clone)]
pub struct SpectrumArray {
    time_grid: FrequencyGrid,
    nu_grid: FrequencyGrid,
    n_mu: usize,
    n_phi: usize,
    /// Packet energy per bin (erg).
    flux: Array4<f64>,
    /// Packet click count per bin.
    counts: Array4<u64>,
}

impl SpectrumArray {
    pub fn new(section: &SpectrumSection, nu_spec: &FrequencyGridSpec) -> Self {
        let [t0, t1, dt] = section.time_grid;
        let time_grid = FrequencyGrid::linear(t0, t1, dt);
        let nu_grid = if nu_spec.log {
            FrequencyGrid::logarithmic(nu_spec.start, nu_spec.stop, nu_spec.step)
        } else {
            FrequencyGrid::linear(nu_spec.start, nu_spec.stop, nu_spec.step)
        };
        let n_mu = section.n_mu.max(1);
        let n_phi = section.n_phi.max(1);
        let shape = (time_grid.len(), nu_grid.len(), n_mu, n_phi);
        SpectrumArray {
            time_grid,
            nu_grid,
            n_mu,
            n_phi,
            flux: Array4::zeros(shape),
            counts: Array4::zeros(shape),
        }
    }

    pub fn time_grid(&self) -> &FrequencyGrid {
        &self.time_grid
    }

    pub fn nu_grid(&self) -> &FrequencyGrid {
        &self.nu_grid
    }

    fn mu_bin(&self, mu: f64) -> usize {
        let f = 0.5 * (mu + 1.0);
        ((f * self.n_mu as f64) as usize).min(self.n_mu - 1)
    }

    fn phi_bin(&self, d: &[f64; 3]) -> usize {
        if self.n_phi == 1 {
            return 0;
        }
        let mut phi = d[1].atan2(d[0]);
        if phi < 0.0 {
            phi += 2.0 * std::f64::consts::PI;
        }
        ((phi / (2.0 * std::f64::consts::PI) * self.n_phi as f64) as usize).min(self.n_phi - 1)
    }

    /// Deposit an escaped packet. Out-of-range times and frequencies
    /// clamp onto the edge bins.
    pub fn count(&mut self, t_obs: f64, nu: f64, e: f64, d: &[f64; 3]) {
        let it = self.time_grid.locate_within_bounds(t_obs);
        let inu = self.nu_grid.locate_within_bounds(nu);
        let imu = self.mu_bin(d[2]);
        let iphi = self.phi_bin(d);
        self.flux[[it, inu, imu, iphi]] += e;
        self.counts[[it, inu, imu, iphi]] += 1;
    }

    pub fn flux_at(&self, it: usize, inu: usize, imu: usize, iphi: usize) -> f64 {
        self.flux[[it, inu, imu, iphi]]
    }

    pub fn counts_at(&self, it: usize, inu: usize, imu: usize, iphi: usize) -> u64 {
        self.counts[[it, inu, imu, iphi]]
    }

    pub fn total_energy(&self) -> f64 {
        self.flux.sum()
    }

    pub fn total_counts(&self) -> u64 {
        self.counts.sum()
    }

    /// Multiply the stored energies, e.g. by the inverse escaped
    /// fraction in steady-state iterations.
    pub fn rescale(&mut self, factor: f64) {
        self.flux.mapv_inplace(|v| v * factor);
    }

    /// Element-wise merge of another rank's histogram.
    pub fn merge(&mut self, other: &SpectrumArray) {
        assert_eq!(self.flux.dim(), other.flux.dim(), "spectrum shape mismatch");
        self.flux += &other.flux;
        self.counts += &other.counts;
    }

    /// Zero the histogram between iterations.
    pub fn wipe(&mut self) {
        self.flux.fill(0.0);
        self.counts.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> SpectrumArray {
        let section = SpectrumSection {
            time_grid: [0.0, 10.0, 1.0],
            nu_grid: FrequencyGridSpec {
                start: 1.0e14,
                stop: 1.1e15,
                step: 1.0e14,
                log: false,
            },
            gamma_nu_grid: FrequencyGridSpec::default(),
            n_mu: 4,
            n_phi: 2,
            particle_list_maxn: 0,
        };
        let nu = section.nu_grid.clone();
        SpectrumArray::new(&section, &nu)
    }

    #[test]
    fn test_count_lands_in_expected_bin() {
        let mut s = spectrum();
        s.count(2.5, 3.5e14, 1.5, &[0.0, 0.0, 1.0]);
        // t = 2.5 -> bin 2, nu = 3.5e14 -> bin 2, mu = 1 -> last bin,
        // phi(+x) -> bin 0
        assert_eq!(s.flux_at(2, 2, 3, 0), 1.5);
        assert_eq!(s.counts_at(2, 2, 3, 0), 1);
        assert_eq!(s.total_counts(), 1);
    }

    #[test]
    fn test_out_of_range_clamps_to_edges() {
        let mut s = spectrum();
        s.count(-5.0, 1.0e12, 1.0, &[1.0, 0.0, 0.0]);
        s.count(99.0, 1.0e18, 2.0, &[1.0, 0.0, 0.0]);
        assert_eq!(s.flux_at(0, 0, 2, 0), 1.0);
        assert_eq!(s.flux_at(9, 9, 2, 0), 2.0);
    }

    #[test]
    fn test_phi_binning() {
        let mut s = spectrum();
        s.count(0.5, 2.0e14, 1.0, &[-1.0, 1.0e-8, 0.0]); // phi ~ pi -> bin 1
        assert_eq!(s.flux_at(0, 1, 2, 1), 1.0);
    }

    #[test]
    fn test_merge_and_rescale() {
        let mut a = spectrum();
        let mut b = spectrum();
        a.count(1.0, 2.0e14, 1.0, &[0.0, 0.0, 1.0]);
        b.count(1.0, 2.0e14, 3.0, &[0.0, 0.0, 1.0]);
        a.merge(&b);
        assert_eq!(a.total_energy(), 4.0);
        assert_eq!(a.total_counts(), 2);
        a.rescale(0.5);
        assert_eq!(a.total_energy(), 2.0);
        assert_eq!(a.total_counts(), 2);
    }

    #[test]
    fn test_merge_is_commutative() {
        let mut a1 = spectrum();
        let mut a2 = spectrum();
        let mut b = spectrum();
        a1.count(3.0, 5.0e14, 1.0, &[0.0, 1.0, 0.0]);
        a2.count(3.0, 5.0e14, 1.0, &[0.0, 1.0, 0.0]);
        b.count(7.0, 9.0e14, 2.0, &[0.0, -1.0, 0.0]);
        a1.merge(&b);
        let mut b2 = b.clone();
        b2.merge(&a2);
        assert_eq!(a1.total_energy(), b2.total_energy());
        assert_eq!(a1.total_counts(), b2.total_counts());
    }

    #[test]
    fn test_wipe() {
        let mut s = spectrum();
        s.count(1.0, 2.0e14, 1.0, &[0.0, 0.0, -1.0]);
        s.wipe();
        assert_eq!(s.total_energy(), 0.0);
        assert_eq!(s.total_counts(), 0);
    }
}
