//! Statistical-equilibrium level populations for one species.
//!
//! We solve M x = b where x are departure coefficients relative to the
//! LTE populations. The raw rate matrix is singular (one equation is
//! redundant), so the last row is overwritten with number conservation:
//! sum_i n_i^LTE x_i = 1. Sobolev escape probabilities feed back into
//! the radiative rates, iterated until the betas settle.

use ndarray::{Array1, Array2};
use radiant_math::lu::lu_solve;
use radiant_math::planck::blackbody_nu;
use radiant_types::constants as pc;
use radiant_types::error::TransportResult;

use crate::atomic::AtomSpecies;

/// Convergence tolerance on the relative beta change.
const BETA_TOL: f64 = 0.1;
/// Beta iteration cap; exhaustion is a warning, not an error.
const MAX_BETA_ITER: usize = 100;

/// Sobolev escape probability (1 - e^-tau) / tau.
pub fn beta_of_tau(tau: f64) -> f64 {
    if tau < 1e-12 {
        1.0 - 0.5 * tau
    } else {
        -(-tau).exp_m1() / tau
    }
}

/// Outcome of one `solve_nlte` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlteSolveReport {
    pub converged: bool,
    pub iterations: usize,
    /// Lines clamped to tau = 0 because of population inversion.
    pub laser_warnings: usize,
}

/// Level populations, ionization fractions and line state for one species.
#[derive(Debug, Clone)]
pub struct NlteAtom {
    species: AtomSpecies,
    /// Species number density (1/cm^3).
    pub n_dens: f64,
    /// Non-thermal (radioactive) deposition rate (erg/s/cm^3).
    pub e_gamma: f64,
    /// Apply Sobolev escape probabilities to the radiative rates.
    pub use_betas: bool,
    pub no_ground_recomb: bool,
    /// Include collisional bound-bound and bound-free channels.
    pub use_collisions: bool,

    lev_n: Vec<f64>,
    lev_n_lte: Vec<f64>,
    lev_b: Vec<f64>,
    ion_part: Vec<f64>,
    ion_frac: Vec<f64>,

    line_j: Vec<f64>,
    line_tau: Vec<f64>,
    line_beta: Vec<f64>,
    /// When set, `solve_nlte` keeps externally supplied line mean
    /// intensities instead of reseeding them from the Planck function.
    pub line_j_from_field: bool,

    rates: Array2<f64>,
}

impl NlteAtom {
    pub fn new(species: AtomSpecies) -> Self {
        let nl = species.n_levels();
        let ni = species.n_ions();
        let nn = species.n_lines();
        NlteAtom {
            species,
            n_dens: 0.0,
            e_gamma: 0.0,
            use_betas: false,
            no_ground_recomb: false,
            use_collisions: true,
            lev_n: vec![0.0; nl],
            lev_n_lte: vec![0.0; nl],
            lev_b: vec![1.0; nl],
            ion_part: vec![0.0; ni],
            ion_frac: vec![0.0; ni],
            line_j: vec![0.0; nn],
            line_tau: vec![0.0; nn],
            line_beta: vec![1.0; nn],
            line_j_from_field: false,
            rates: Array2::zeros((nl, nl)),
        }
    }

    pub fn species(&self) -> &AtomSpecies {
        &self.species
    }

    pub fn n_levels(&self) -> usize {
        self.species.n_levels()
    }

    pub fn n_ions(&self) -> usize {
        self.species.n_ions()
    }

    pub fn n_lines(&self) -> usize {
        self.species.n_lines()
    }

    /// Fractional population of level `l` (sums to 1 over all levels).
    pub fn level_fraction(&self, l: usize) -> f64 {
        self.lev_n[l]
    }

    /// Departure coefficient of level `l`.
    pub fn departure(&self, l: usize) -> f64 {
        self.lev_b[l]
    }

    /// Fraction of the species in ionization stage `i`.
    pub fn ion_fraction(&self, i: usize) -> f64 {
        self.ion_frac[i]
    }

    /// Partition function of ion `i` from the last LTE pass.
    pub fn partition(&self, i: usize) -> f64 {
        self.ion_part[i]
    }

    /// Mean charge, sum_l n_l * stage(l).
    pub fn mean_ionization(&self) -> f64 {
        self.lev_n
            .iter()
            .zip(self.species.levels.iter())
            .map(|(n, lev)| n * lev.ion as f64)
            .sum()
    }

    pub fn line_tau(&self, l: usize) -> f64 {
        self.line_tau[l]
    }

    pub fn line_beta(&self, l: usize) -> f64 {
        self.line_beta[l]
    }

    /// Supply a line mean intensity from the stored radiation field.
    pub fn set_line_mean_intensity(&mut self, l: usize, j: f64) {
        self.line_j[l] = j;
    }

    /// LTE populations: partition functions, Saha ionization balance,
    /// Boltzmann level fractions. Departure coefficients reset to 1.
    pub fn solve_lte(&mut self, t: f64, ne: f64) {
        let kt_ev = pc::K_BOLTZ_EV * t;

        for p in self.ion_part.iter_mut() {
            *p = 0.0;
        }
        for (i, lev) in self.species.levels.iter().enumerate() {
            self.lev_n[i] = lev.g as f64 * (-lev.e_ev / kt_ev).exp();
            self.ion_part[lev.ion] += self.lev_n[i];
        }

        // thermal de Broglie wavelength cubed
        let lt = pc::H_PLANCK * pc::H_PLANCK / (2.0 * pc::PI * pc::M_ELECTRON * pc::K_BOLTZ * t);
        let fac = 2.0 / ne / lt.powf(1.5);

        self.ion_frac[0] = 1.0;
        let mut norm = 1.0;
        for i in 1..self.species.n_ions() {
            let chi = self.species.ions[i - 1].chi_ev;
            let mut saha = (-chi / kt_ev).exp();
            saha *= self.ion_part[i] / self.ion_part[i - 1] * fac;
            self.ion_frac[i] = saha * self.ion_frac[i - 1];
            if ne < 1e-50 {
                self.ion_frac[i] = 0.0;
            }
            norm += self.ion_frac[i];
        }
        for f in self.ion_frac.iter_mut() {
            *f /= norm;
        }

        for (i, lev) in self.species.levels.iter().enumerate() {
            let z = self.ion_part[lev.ion];
            let f = self.ion_frac[lev.ion];
            let n = f * lev.g as f64 * (-lev.e_ev / kt_ev).exp() / z;
            self.lev_n[i] = n;
            self.lev_n_lte[i] = n;
            self.lev_b[i] = 1.0;
        }
    }

    /// Assemble the rate matrix for the current populations and betas.
    /// Every entry is multiplied by the LTE population of the departing
    /// level so the linear solve yields departure coefficients.
    fn set_rates(&mut self, t: f64, ne: f64) {
        let kt_ev = pc::K_BOLTZ_EV * t;
        self.rates.fill(0.0);

        // radiative bound-bound
        for (l, line) in self.species.lines.iter().enumerate() {
            let j = self.line_j[l];
            let mut r_ul = line.b_ul * j + line.a_ul;
            let mut r_lu = line.b_lu * j;
            if self.use_betas {
                r_ul *= self.line_beta[l];
                r_lu *= self.line_beta[l];
            }
            self.rates[[line.ll, line.lu]] += r_lu;
            self.rates[[line.lu, line.ll]] += r_ul;
        }

        // non-thermal excitation out of the ground state
        if self.e_gamma > 0.0 && self.n_dens > 0.0 {
            for line in &self.species.lines {
                if line.ll != 0 {
                    continue;
                }
                let de = (self.species.levels[line.lu].e_ev - self.species.levels[line.ll].e_ev)
                    * pc::EV_TO_ERG;
                self.rates[[0, line.lu]] += self.e_gamma / self.n_dens / de;
            }
        }

        // collisional bound-bound within an ion
        if self.use_collisions {
            let nl = self.species.n_levels();
            for i in 0..nl {
                for j in 0..nl {
                    if i == j {
                        continue;
                    }
                    let (li, lj) = (&self.species.levels[i], &self.species.levels[j]);
                    if li.ion != lj.ion {
                        continue;
                    }
                    let de = li.e_ev - lj.e_ev;
                    if de == 0.0 {
                        continue;
                    }
                    let zeta = de.abs() / kt_ev;
                    let mut c = 2.16 * zeta.powf(-1.68) * t.powf(-1.5);
                    if de < 0.0 {
                        // upward transition: detailed balance against the
                        // downward rate
                        c *= lj.g as f64 / li.g as f64 * (-zeta).exp();
                    }
                    self.rates[[i, j]] += c;
                }
            }
        }

        // bound-free
        let lt = pc::H_PLANCK * pc::H_PLANCK / (2.0 * pc::PI * pc::M_ELECTRON * pc::K_BOLTZ * t);
        let lam3 = lt.powf(1.5);
        for i in 0..self.species.n_levels() {
            let lev = &self.species.levels[i];
            let Some(ic) = lev.ic else { continue };

            let chi = self.species.ions[lev.ion].chi_ev - lev.e_ev;
            let zeta = chi / kt_ev;
            let gi = lev.g as f64;
            let gc = self.species.levels[ic].g as f64;

            if self.use_collisions {
                let c_ion = 2.7 / (zeta * zeta) * t.powf(-1.5) * (-zeta).exp() * ne;
                self.rates[[i, ic]] += c_ion;
                // collisional recombination by detailed balance: the
                // prefactor reduces to 5.5908e-16 / zeta^2 T^-3
                let c_rec = 1.35 / (zeta * zeta) * t.powf(-1.5) * lam3 * (gi / gc) * ne * ne;
                self.rates[[ic, i]] += c_rec;
            }

            // photoionization: integrate the cross-section table against
            // the line radiation field (here a dilute blackbody, W = 1)
            let mut r_ion = 0.0;
            let cs = &lev.photo_cs;
            for j in 1..cs.len() {
                let nu = cs.x[j] * pc::EV_TO_ERG / pc::H_PLANCK;
                let nu0 = cs.x[j - 1] * pc::EV_TO_ERG / pc::H_PLANCK;
                let dnu = nu - nu0;
                let jnu = blackbody_nu(t, nu);
                // stimulated recombination correction
                let sigma = cs.y[j] * -(-pc::H_PLANCK * nu / (pc::K_BOLTZ * t)).exp_m1();
                r_ion += 4.0 * pc::PI * sigma * jnu / (pc::H_PLANCK * nu) * dnu;
            }
            self.rates[[i, ic]] += r_ion;

            // radiative recombination: tabulated coefficient when present,
            // detailed balance against the photoionization integral otherwise
            let mut r_rec = if !lev.a_rec.is_empty() {
                ne * lev.a_rec.value_at(t)
            } else if self.lev_n_lte[ic] > 1e-300 {
                r_ion * self.lev_n_lte[i] / self.lev_n_lte[ic]
            } else {
                0.0
            };
            if self.no_ground_recomb && lev.e_ev == 0.0 {
                r_rec = 0.0;
            }
            self.rates[[ic, i]] += r_rec;
        }

        // solve for departure coefficients: scale by the LTE population
        // of the departing level
        for i in 0..self.species.n_levels() {
            let n_lte = self.lev_n_lte[i];
            for j in 0..self.species.n_levels() {
                self.rates[[i, j]] *= n_lte;
            }
        }
    }

    /// Solve statistical equilibrium at `(t, ne)`, iterating the Sobolev
    /// escape probabilities until they settle.
    pub fn solve_nlte(&mut self, t: f64, ne: f64, time: f64) -> TransportResult<NlteSolveReport> {
        self.solve_lte(t, ne);

        if !self.line_j_from_field {
            for (l, line) in self.species.lines.iter().enumerate() {
                self.line_j[l] = blackbody_nu(t, line.nu);
            }
        }

        let n = self.species.n_levels();
        let mut laser_total = 0usize;

        for iter in 0..MAX_BETA_ITER {
            self.set_rates(t, ne);

            let mut m = Array2::zeros((n, n));
            for i in 0..n {
                let rout: f64 = (0..n).map(|j| self.rates[[i, j]]).sum();
                m[[i, i]] = -rout;
            }
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        m[[i, j]] = self.rates[[j, i]];
                    }
                }
            }
            // last row: number conservation on the LTE basis
            for i in 0..n {
                m[[n - 1, i]] = self.lev_n_lte[i];
            }
            let mut b = Array1::zeros(n);
            b[n - 1] = 1.0;

            let x = lu_solve(m, &b)?;
            for i in 0..n {
                self.lev_b[i] = x[i];
                self.lev_n[i] = x[i] * self.lev_n_lte[i];
            }
            for f in self.ion_frac.iter_mut() {
                *f = 0.0;
            }
            for (i, lev) in self.species.levels.iter().enumerate() {
                self.ion_frac[lev.ion] += self.lev_n[i];
            }

            if !self.use_betas {
                return Ok(NlteSolveReport {
                    converged: true,
                    iterations: iter + 1,
                    laser_warnings: laser_total,
                });
            }

            let mut converged = true;
            for l in 0..self.species.n_lines() {
                let old_beta = self.line_beta[l];
                laser_total += self.compute_sobolev_tau(l, time);
                let new_beta = self.line_beta[l];
                if ((old_beta - new_beta) / new_beta).abs() > BETA_TOL {
                    converged = false;
                }
            }
            if converged {
                return Ok(NlteSolveReport {
                    converged: true,
                    iterations: iter + 1,
                    laser_warnings: laser_total,
                });
            }
        }

        Ok(NlteSolveReport {
            converged: false,
            iterations: MAX_BETA_ITER,
            laser_warnings: laser_total,
        })
    }

    /// Recompute every line's Sobolev depth; returns the laser count.
    pub fn compute_sobolev_taus(&mut self, time: f64) -> usize {
        (0..self.species.n_lines())
            .map(|l| self.compute_sobolev_tau(l, time))
            .sum()
    }

    /// Sobolev optical depth and escape probability of line `l` at the
    /// expansion time `time`. Returns 1 when the line is clamped for
    /// population inversion, 0 otherwise.
    pub fn compute_sobolev_tau(&mut self, l: usize, time: f64) -> usize {
        let line = &self.species.lines[l];
        let nl = self.lev_n[line.ll];
        let nu_pop = self.lev_n[line.lu];
        let gl = self.species.levels[line.ll].g as f64;
        let gu = self.species.levels[line.lu].g as f64;

        if nl < f64::MIN_POSITIVE {
            self.line_tau[l] = 0.0;
            self.line_beta[l] = 1.0;
            return 0;
        }

        // laser regime: clamp and warn
        if nu_pop * gl > nl * gu {
            self.line_tau[l] = 0.0;
            self.line_beta[l] = 1.0;
            return 1;
        }

        let lam = pc::C_LIGHT / line.nu;
        let mut tau = nl * self.n_dens * pc::SIGMA_LINE_TOT * line.f_lu * time * lam;
        // stimulated emission correction
        tau *= 1.0 - nu_pop * gl / (nl * gu);

        self.line_tau[l] = tau;
        self.line_beta[l] = beta_of_tau(tau);
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::AtomSpecies;

    fn hydrogen_atom(n_dens: f64) -> NlteAtom {
        let mut atom = NlteAtom::new(AtomSpecies::hydrogen());
        atom.n_dens = n_dens;
        atom
    }

    #[test]
    fn test_beta_limits() {
        assert!((beta_of_tau(1.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-12);
        assert!((beta_of_tau(1e-14) - 1.0).abs() < 1e-10);
        let b = beta_of_tau(1e4);
        assert!((b - 1e-4).abs() / 1e-4 < 1e-6);
        for &tau in &[0.0, 0.3, 2.0, 50.0] {
            let b = beta_of_tau(tau);
            assert!((0.0..=1.0).contains(&b));
        }
    }

    #[test]
    fn test_lte_matches_closed_form_saha() {
        let t = 1.0e4;
        let ne = 1.0e10;
        let mut atom = hydrogen_atom(1.0e10);
        atom.solve_lte(t, ne);

        // closed-form Saha with the same partition functions
        let kt_ev = pc::K_BOLTZ_EV * t;
        let z0: f64 = 2.0 * (-0.0f64 / kt_ev).exp() + 8.0 * (-10.199 / kt_ev).exp();
        let z1 = 1.0;
        let lt = pc::H_PLANCK * pc::H_PLANCK / (2.0 * pc::PI * pc::M_ELECTRON * pc::K_BOLTZ * t);
        let saha = (2.0 / ne / lt.powf(1.5)) * (z1 / z0) * (-13.598 / kt_ev).exp();
        let expected_ion = saha / (1.0 + saha);

        let got = atom.ion_fraction(1);
        assert!(
            ((got - expected_ion) / expected_ion).abs() < 1e-4,
            "ion fraction {got} vs closed form {expected_ion}"
        );
    }

    #[test]
    fn test_lte_boltzmann_level_ratio() {
        let t = 1.0e4;
        let mut atom = hydrogen_atom(1.0e10);
        atom.solve_lte(t, 1.0e10);
        let ratio = atom.level_fraction(1) / atom.level_fraction(0);
        let expected = (8.0 / 2.0) * (-10.199 / (pc::K_BOLTZ_EV * t)).exp();
        assert!(((ratio - expected) / expected).abs() < 1e-10);
    }

    #[test]
    fn test_nlte_reduces_to_lte_without_betas() {
        let t = 1.2e4;
        let ne = 1.0e10;
        let mut atom = hydrogen_atom(1.0e10);
        atom.use_betas = false;
        let report = atom.solve_nlte(t, ne, 1.0e6).unwrap();
        assert!(report.converged);
        for l in 0..atom.n_levels() {
            assert!(
                (atom.departure(l) - 1.0).abs() < 1e-6,
                "departure b[{l}] = {} should be 1 in the LTE limit",
                atom.departure(l)
            );
        }
        // populations still sum to one
        let total: f64 = (0..atom.n_levels()).map(|l| atom.level_fraction(l)).sum();
        assert!((total - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_sobolev_betas_bounded_after_solve() {
        let mut atom = hydrogen_atom(1.0e8);
        atom.use_betas = true;
        let report = atom.solve_nlte(8.0e3, 1.0e8, 5.0e5).unwrap();
        assert!(report.converged);
        for l in 0..atom.n_lines() {
            assert!(atom.line_tau(l) >= 0.0);
            let beta = atom.line_beta(l);
            assert!((0.0..=1.0).contains(&beta), "beta {beta} out of range");
        }
    }

    #[test]
    fn test_laser_regime_clamps_and_warns() {
        let mut atom = hydrogen_atom(1.0e8);
        atom.use_betas = true;
        // absurd non-thermal pumping inverts the line
        atom.e_gamma = 1.0e20;
        let report = atom.solve_nlte(5.0e3, 1.0e8, 1.0e6).unwrap();
        assert!(report.laser_warnings > 0, "expected laser-regime warnings");
        assert_eq!(atom.line_tau(0), 0.0);
        assert_eq!(atom.line_beta(0), 1.0);
    }

    #[test]
    fn test_mean_ionization_tracks_temperature() {
        let mut atom = hydrogen_atom(1.0e10);
        atom.solve_lte(6.0e3, 1.0e10);
        let cold = atom.mean_ionization();
        atom.solve_lte(2.0e4, 1.0e10);
        let hot = atom.mean_ionization();
        assert!(hot > cold);
        assert!((0.0..=1.0).contains(&cold));
        assert!((0.0..=1.0).contains(&hot));
    }
}
