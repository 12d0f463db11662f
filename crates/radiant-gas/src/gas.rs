// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Gas State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-zone gas state: ionization balance and the frequency-dependent
//! opacity/emissivity assembly.
//!
//! Each transport worker owns a private `GasState`; the shared atomic
//! data and frequency grid sit behind `Arc`s. The electron density is
//! found by a charge-conservation root solve, level populations come
//! from the LTE or NLTE machinery, and `compute_opacity` assembles the
//! continuum and expansion-opacity contributions bin by bin.

use std::sync::Arc;

use radiant_math::brent::brent_solve;
use radiant_math::freq::FrequencyGrid;
use radiant_math::planck::{blackbody_nu, dblackbody_dt};
use radiant_types::config::OpacitySection;
use radiant_types::constants as pc;
use radiant_types::error::TransportResult;

use crate::atomic::AtomicData;
use crate::nlte::NlteAtom;

/// Free-free (Kramers) opacity prefactor.
const FF_OPACITY_COEF: f64 = 3.7e8;
/// Free-free cooling prefactor (erg cm^3 / s / K^0.5).
const FF_COOLING_COEF: f64 = 1.42e-27;

/// A single line from a fuzz list: no level structure, only an
/// oscillator strength and a Boltzmann weight for the lower state.
#[derive(Debug, Clone)]
pub struct FuzzLine {
    pub nu: f64,
    pub f_lu: f64,
    /// Atomic number of the parent element.
    pub z: usize,
    /// Ionization stage the line belongs to.
    pub ion_stage: usize,
    /// Lower-state excitation energy (eV).
    pub e_low_ev: f64,
}

/// Warning counters from one `solve_state` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveReport {
    /// Electron-density root not bracketed.
    pub root_errors: usize,
    /// Root iteration cap reached.
    pub iter_errors: usize,
    pub nlte_nonconverged: usize,
    pub laser_warnings: usize,
}

impl SolveReport {
    pub fn merge(&mut self, other: SolveReport) {
        self.root_errors += other.root_errors;
        self.iter_errors += other.iter_errors;
        self.nlte_nonconverged += other.nlte_nonconverged;
        self.laser_warnings += other.laser_warnings;
    }
}

/// Gas heating/cooling rates (erg/s/cm^3) for the NLTE temperature solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeatingCooling {
    pub bf_heating: f64,
    pub bf_cooling: f64,
    pub ff_heating: f64,
    pub ff_cooling: f64,
    pub coll_cooling: f64,
}

impl HeatingCooling {
    pub fn net_heating(&self) -> f64 {
        self.bf_heating + self.ff_heating - self.bf_cooling - self.ff_cooling - self.coll_cooling
    }
}

/// State of the gas in one zone.
#[derive(Debug, Clone)]
pub struct GasState {
    nu_grid: Arc<FrequencyGrid>,
    elem_z: Vec<usize>,
    elem_a: Vec<usize>,
    pub opts: OpacitySection,

    pub dens: f64,
    pub temp: f64,
    pub time: f64,
    pub e_gamma: f64,
    mass_frac: Vec<f64>,
    pub n_elec: f64,

    /// One population solver per element with species data.
    atoms: Vec<Option<NlteAtom>>,
    fuzz_lines: Vec<FuzzLine>,

    /// Grey overrides copied from the zone by the opacity pass.
    pub bulk_grey_opacity: f64,
    pub total_grey_opacity: f64,
}

impl GasState {
    pub fn new(
        atomic: Arc<AtomicData>,
        elem_z: Vec<usize>,
        elem_a: Vec<usize>,
        nu_grid: Arc<FrequencyGrid>,
        opts: OpacitySection,
    ) -> Self {
        let atoms = elem_z
            .iter()
            .map(|&z| {
                atomic.for_element(z).map(|sp| {
                    let mut atom = NlteAtom::new(sp.clone());
                    atom.no_ground_recomb = opts.no_ground_recomb;
                    atom.use_collisions = opts.use_collisions_nlte;
                    atom
                })
            })
            .collect();
        let n_elems = elem_z.len();
        GasState {
            nu_grid,
            elem_z,
            elem_a,
            opts,
            dens: 0.0,
            temp: 0.0,
            time: 0.0,
            e_gamma: 0.0,
            mass_frac: vec![0.0; n_elems],
            n_elec: 0.0,
            atoms,
            fuzz_lines: Vec::new(),
            bulk_grey_opacity: 0.0,
            total_grey_opacity: 0.0,
        }
    }

    pub fn set_state(&mut self, dens: f64, temp: f64, time: f64) {
        self.dens = dens;
        self.temp = temp;
        self.time = time;
    }

    pub fn set_mass_fractions(&mut self, x: &[f64]) {
        self.mass_frac.copy_from_slice(x);
    }

    pub fn set_fuzz_lines(&mut self, lines: Vec<FuzzLine>) {
        self.fuzz_lines = lines;
    }

    pub fn n_elems(&self) -> usize {
        self.elem_z.len()
    }

    pub fn nu_grid(&self) -> &FrequencyGrid {
        &self.nu_grid
    }

    /// Number density of element `k` (1/cm^3).
    pub fn elem_n_dens(&self, k: usize) -> f64 {
        self.mass_frac[k] * self.dens / (pc::M_PROTON * self.elem_a[k] as f64)
    }

    /// Total ion number density (1/cm^3).
    pub fn n_dens(&self) -> f64 {
        (0..self.n_elems()).map(|k| self.elem_n_dens(k)).sum()
    }

    pub fn atom(&self, k: usize) -> Option<&NlteAtom> {
        self.atoms[k].as_ref()
    }

    fn nlte_enabled(&self, z: usize) -> bool {
        self.opts.use_nlte && (self.opts.atoms_in_nlte.is_empty() || self.opts.atoms_in_nlte.contains(&z))
    }

    /// Total free electrons implied by LTE Saha at electron density `ne`.
    fn implied_electrons(&mut self, ne: f64) -> f64 {
        let mut total = 0.0;
        let temp = self.temp;
        for k in 0..self.elem_z.len() {
            let n_k = self.mass_frac[k] * self.dens / (pc::M_PROTON * self.elem_a[k] as f64);
            if n_k <= 0.0 {
                continue;
            }
            if let Some(atom) = self.atoms[k].as_mut() {
                atom.solve_lte(temp, ne);
                total += n_k * atom.mean_ionization();
            }
        }
        total
    }

    /// Solve the gas state: electron density by charge conservation,
    /// then level populations per element. `j_nu` supplies the stored
    /// zone mean intensity for the line and photoionization rates.
    pub fn solve_state(&mut self, j_nu: Option<&[f64]>) -> TransportResult<SolveReport> {
        let mut report = SolveReport::default();

        let n_tot = self.n_dens();
        if n_tot <= 0.0 || self.temp <= 0.0 {
            self.n_elec = 0.0;
            return Ok(report);
        }
        let z_max: f64 = (0..self.n_elems())
            .map(|k| self.elem_n_dens(k) * self.elem_z[k] as f64)
            .sum();

        let ne_min = 1e-12 * n_tot;
        let f_min = self.implied_electrons(ne_min) - ne_min;
        if f_min <= 0.0 {
            // effectively neutral gas; the implied count at the lower
            // bracket is already the fixed point
            self.n_elec = (f_min + ne_min).max(0.0);
        } else {
            let result = brent_solve(
                |ne| self.implied_electrons(ne) - ne,
                ne_min,
                z_max,
                1e-8,
                100,
            );
            match result {
                Ok(r) => self.n_elec = r.root,
                Err(radiant_types::error::TransportError::SolverDiverged {
                    iteration: 0, ..
                }) => {
                    report.root_errors += 1;
                    self.n_elec = 0.5 * z_max;
                }
                Err(_) => {
                    report.iter_errors += 1;
                    self.n_elec = 0.5 * z_max;
                }
            }
        }

        // final population pass at the solved electron density
        let ne = self.n_elec;
        let temp = self.temp;
        let time = self.time;
        let e_gamma = self.e_gamma;
        for k in 0..self.elem_z.len() {
            let z = self.elem_z[k];
            let n_k = self.elem_n_dens(k);
            let nlte = self.nlte_enabled(z);
            let Some(atom) = self.atoms[k].as_mut() else {
                continue;
            };
            atom.n_dens = n_k;
            atom.e_gamma = e_gamma;
            if nlte && n_k > 0.0 {
                atom.use_betas = true;
                if let Some(j) = j_nu {
                    for l in 0..atom.n_lines() {
                        let nu = atom.species().lines[l].nu;
                        atom.set_line_mean_intensity(l, self.nu_grid.value_at(nu, j));
                    }
                    atom.line_j_from_field = true;
                } else {
                    atom.line_j_from_field = false;
                }
                let r = atom.solve_nlte(temp, ne, time)?;
                if !r.converged {
                    report.nlte_nonconverged += 1;
                }
                report.laser_warnings += r.laser_warnings;
            } else {
                atom.solve_lte(temp, ne);
                atom.compute_sobolev_taus(time);
            }
        }
        Ok(report)
    }

    /// Assemble absorption, scattering and (unnormalized) emissivity per
    /// frequency bin. Arrays must be sized like the frequency grid.
    pub fn compute_opacity(&self, abs: &mut [f64], scat: &mut [f64], emis: &mut [f64]) {
        let ng = self.nu_grid.len();
        abs.iter_mut().for_each(|v| *v = 0.0);
        scat.iter_mut().for_each(|v| *v = 0.0);
        emis.iter_mut().for_each(|v| *v = 0.0);

        // grey override short-circuits the detailed assembly
        let grey = if self.total_grey_opacity > 0.0 {
            self.total_grey_opacity
        } else {
            self.bulk_grey_opacity
        };
        if grey > 0.0 {
            let k_ext = grey * self.dens;
            for j in 0..ng {
                abs[j] = self.opts.epsilon * k_ext;
                scat[j] = (1.0 - self.opts.epsilon) * k_ext;
                emis[j] = abs[j] * blackbody_nu(self.temp, self.nu_grid.center(j));
            }
            return;
        }

        // electron scattering
        if self.opts.electron_scattering {
            let es = pc::SIGMA_THOMSON * self.n_elec;
            for s in scat.iter_mut() {
                *s += es;
            }
        }

        // free-free
        if self.opts.free_free && self.temp > 0.0 {
            let mut zsq_sum = 0.0;
            for k in 0..self.n_elems() {
                if let Some(atom) = self.atoms[k].as_ref() {
                    let zbar2: f64 = (0..atom.n_ions())
                        .map(|i| atom.ion_fraction(i) * (i * i) as f64)
                        .sum();
                    zsq_sum += self.elem_n_dens(k) * zbar2;
                }
            }
            let coef = FF_OPACITY_COEF * self.n_elec * zsq_sum / self.temp.sqrt();
            for j in 0..ng {
                let nu = self.nu_grid.center(j);
                let stim = -(-pc::H_PLANCK * nu / (pc::K_BOLTZ * self.temp)).exp_m1();
                abs[j] += coef / (nu * nu * nu) * stim;
            }
        }

        // bound-free
        if self.opts.bound_free && self.temp > 0.0 {
            for k in 0..self.n_elems() {
                let Some(atom) = self.atoms[k].as_ref() else {
                    continue;
                };
                let n_k = self.elem_n_dens(k);
                for (l, lev) in atom.species().levels.iter().enumerate() {
                    if lev.photo_cs.is_empty() {
                        continue;
                    }
                    let n_lev = atom.level_fraction(l) * n_k;
                    if n_lev <= 0.0 {
                        continue;
                    }
                    let threshold_ev = lev.photo_cs.x[0];
                    for j in 0..ng {
                        let nu = self.nu_grid.center(j);
                        let e_ev = pc::H_PLANCK * nu / pc::EV_TO_ERG;
                        if e_ev < threshold_ev {
                            continue;
                        }
                        let stim =
                            -(-pc::H_PLANCK * nu / (pc::K_BOLTZ * self.temp)).exp_m1();
                        abs[j] += n_lev * lev.photo_cs.value_at(e_ev) * stim;
                    }
                }
            }
        }

        // bound-bound expansion opacity from the detailed lines, spread
        // over the configured velocity width
        if self.opts.bound_bound && self.time > 0.0 {
            for k in 0..self.n_elems() {
                let Some(atom) = self.atoms[k].as_ref() else {
                    continue;
                };
                for l in 0..atom.n_lines() {
                    let nu_l = atom.species().lines[l].nu;
                    if nu_l <= self.nu_grid.minval() || nu_l > self.nu_grid.maxval() {
                        continue;
                    }
                    let tau = atom.line_tau(l);
                    let strength = nu_l / (pc::C_LIGHT * self.time) * -(-tau).exp_m1();
                    self.deposit_line_opacity(nu_l, strength, abs, scat);
                }
            }
        }

        // fuzz-line expansion opacity
        if self.opts.fuzz_expansion && self.time > 0.0 && self.temp > 0.0 {
            let kt_ev = pc::K_BOLTZ_EV * self.temp;
            for fl in &self.fuzz_lines {
                if fl.nu <= self.nu_grid.minval() || fl.nu > self.nu_grid.maxval() {
                    continue;
                }
                let Some(k) = self.elem_z.iter().position(|&z| z == fl.z) else {
                    continue;
                };
                let Some(atom) = self.atoms[k].as_ref() else {
                    continue;
                };
                if fl.ion_stage >= atom.n_ions() {
                    continue;
                }
                let part = atom.partition(fl.ion_stage);
                if part <= 0.0 {
                    continue;
                }
                let n_low = self.elem_n_dens(k) * atom.ion_fraction(fl.ion_stage)
                    * (-fl.e_low_ev / kt_ev).exp()
                    / part;
                let lam = pc::C_LIGHT / fl.nu;
                let tau = pc::SIGMA_LINE_TOT * fl.f_lu * n_low * self.time * lam;
                let strength = fl.nu / (pc::C_LIGHT * self.time) * -(-tau).exp_m1();
                self.deposit_line_opacity(fl.nu, strength, abs, scat);
            }
        }

        // extinction floor
        if self.opts.minimum_extinction > 0.0 {
            for a in abs.iter_mut() {
                if *a < self.opts.minimum_extinction {
                    *a = self.opts.minimum_extinction;
                }
            }
        }

        // LTE emissivity from Kirchhoff's law
        if self.temp > 0.0 {
            for j in 0..ng {
                emis[j] = abs[j] * blackbody_nu(self.temp, self.nu_grid.center(j));
            }
        }
    }

    /// Spread a line's integrated expansion opacity across the bins
    /// inside its velocity width; a zero width lands it in one bin.
    fn deposit_line_opacity(&self, nu_l: f64, strength: f64, abs: &mut [f64], scat: &mut [f64]) {
        let width = self.opts.line_velocity_width / pc::C_LIGHT;
        let (j_lo, j_hi) = if width > 0.0 {
            (
                self.nu_grid.locate_within_bounds(nu_l * (1.0 - width)),
                self.nu_grid.locate_within_bounds(nu_l * (1.0 + width)),
            )
        } else {
            let j = self.nu_grid.locate_within_bounds(nu_l);
            (j, j)
        };
        let dnu_tot: f64 = (j_lo..=j_hi).map(|j| self.nu_grid.delta(j)).sum();
        for j in j_lo..=j_hi {
            let alpha = strength / dnu_tot;
            abs[j] += self.opts.epsilon * alpha;
            scat[j] += (1.0 - self.opts.epsilon) * alpha;
        }
    }

    /// Planck mean of the absorption opacity (cm^-1).
    pub fn planck_mean(&self, abs: &[f64]) -> f64 {
        if self.temp <= 0.0 {
            return 0.0;
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for j in 0..self.nu_grid.len() {
            let b = blackbody_nu(self.temp, self.nu_grid.center(j)) * self.nu_grid.delta(j);
            num += abs[j] * b;
            den += b;
        }
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }

    /// Rosseland mean of the total extinction (cm^-1). Transparent bins
    /// dominate the harmonic mean, so any empty bin drives it to zero.
    pub fn rosseland_mean(&self, abs: &[f64], scat: &[f64]) -> f64 {
        if self.temp <= 0.0 {
            return 0.0;
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for j in 0..self.nu_grid.len() {
            let w = dblackbody_dt(self.temp, self.nu_grid.center(j)) * self.nu_grid.delta(j);
            let alpha = abs[j] + scat[j];
            if alpha <= 0.0 {
                return 0.0;
            }
            num += w;
            den += w / alpha;
        }
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }

    /// Heating and cooling rates against the stored radiation field,
    /// used by the NLTE radiative-equilibrium residual.
    pub fn heating_cooling(&self, j_nu: &[f64]) -> HeatingCooling {
        let mut hc = HeatingCooling::default();
        if self.temp <= 0.0 {
            return hc;
        }
        let kt = pc::K_BOLTZ * self.temp;

        // free-free
        let mut zsq_sum = 0.0;
        for k in 0..self.n_elems() {
            if let Some(atom) = self.atoms[k].as_ref() {
                let zbar2: f64 = (0..atom.n_ions())
                    .map(|i| atom.ion_fraction(i) * (i * i) as f64)
                    .sum();
                zsq_sum += self.elem_n_dens(k) * zbar2;
            }
        }
        hc.ff_cooling = FF_COOLING_COEF * self.temp.sqrt() * self.n_elec * zsq_sum;
        let ff_coef = FF_OPACITY_COEF * self.n_elec * zsq_sum / self.temp.sqrt();
        for j in 0..self.nu_grid.len() {
            let nu = self.nu_grid.center(j);
            let stim = -(-pc::H_PLANCK * nu / kt).exp_m1();
            let alpha = ff_coef / (nu * nu * nu) * stim;
            hc.ff_heating += 4.0 * pc::PI * alpha * j_nu[j] * self.nu_grid.delta(j);
        }

        // bound-free
        for k in 0..self.n_elems() {
            let Some(atom) = self.atoms[k].as_ref() else {
                continue;
            };
            let n_k = self.elem_n_dens(k);
            for (l, lev) in atom.species().levels.iter().enumerate() {
                let Some(ic) = lev.ic else { continue };
                if lev.photo_cs.is_empty() {
                    continue;
                }
                let n_lev = atom.level_fraction(l) * n_k;
                let nu_t = lev.photo_cs.x[0] * pc::EV_TO_ERG / pc::H_PLANCK;
                let cs = &lev.photo_cs;
                let mut heat = 0.0;
                for j in 1..cs.len() {
                    let nu = cs.x[j] * pc::EV_TO_ERG / pc::H_PLANCK;
                    let nu0 = cs.x[j - 1] * pc::EV_TO_ERG / pc::H_PLANCK;
                    let jmean = self.nu_grid.value_at(nu, j_nu);
                    let sigma = cs.y[j];
                    heat += 4.0 * pc::PI * sigma * jmean / (pc::H_PLANCK * nu)
                        * (pc::H_PLANCK * (nu - nu_t))
                        * (nu - nu0);
                }
                hc.bf_heating += n_lev * heat;

                // recombination cooling at ~kT per capture
                let n_c = atom.level_fraction(ic) * n_k;
                let alpha_rec = if !lev.a_rec.is_empty() {
                    lev.a_rec.value_at(self.temp)
                } else {
                    0.0
                };
                hc.bf_cooling += n_c * self.n_elec * alpha_rec * kt;
            }
        }

        // net collisional bound-bound exchange
        let kt_ev = pc::K_BOLTZ_EV * self.temp;
        for k in 0..self.n_elems() {
            let Some(atom) = self.atoms[k].as_ref() else {
                continue;
            };
            let n_k = self.elem_n_dens(k);
            for line in &atom.species().lines {
                let de_ev =
                    atom.species().levels[line.lu].e_ev - atom.species().levels[line.ll].e_ev;
                if de_ev <= 0.0 {
                    continue;
                }
                let zeta = de_ev / kt_ev;
                let c_down = 2.16 * zeta.powf(-1.68) * self.temp.powf(-1.5);
                let g_l = atom.species().levels[line.ll].g as f64;
                let g_u = atom.species().levels[line.lu].g as f64;
                let c_up = c_down * g_u / g_l * (-zeta).exp();
                let n_l = atom.level_fraction(line.ll) * n_k;
                let n_u = atom.level_fraction(line.lu) * n_k;
                hc.coll_cooling += (n_l * c_up - n_u * c_down) * de_ev * pc::EV_TO_ERG;
            }
        }

        hc
    }
}
