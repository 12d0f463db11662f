// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Opacity Pass
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-zone opacity and emissivity assembly.
//!
//! Each rayon worker owns a private `GasState` clone; the pass reads the
//! zone array immutably, collects per-zone results and applies them
//! serially, so the tables are race-free by construction.

use rayon::prelude::*;

use radiant_gas::decay;
use radiant_gas::gas::{GasState, SolveReport};
use radiant_types::constants as pc;
use radiant_types::error::TransportResult;
use radiant_types::state::Zone;

use crate::grid::TransportGrid;
use crate::particle::{Particle, ParticleType, ZoneIndex};
use crate::temperature::solve_state_and_temperature;
use crate::transport::{StepDiagnostics, Transport};

/// Everything one zone's gas solve produces, applied after the pass.
struct ZoneOpacityResult {
    zone: usize,
    abs: Vec<f64>,
    scat: Vec<f64>,
    emis_weights: Vec<f64>,
    l_thermal: f64,
    planck_mean: f64,
    rosseland_mean: f64,
    compton_opac: f64,
    photoion_opac: f64,
    n_elec: f64,
    t_gas_new: Option<f64>,
    report: SolveReport,
    temp_root_errors: usize,
    temp_iter_errors: usize,
}

/// Klein-Nishina correction to the Thomson cross-section; `x` in MeV.
pub fn klein_nishina(x: f64) -> f64 {
    let x = x / pc::M_ELECTRON_MEV;
    let logfac = (1.0 + 2.0 * x).ln();
    let term1 = (1.0 + x) / (x * x * x) * (2.0 * x * (1.0 + x) / (1.0 + 2.0 * x) - logfac);
    let term2 = 0.5 / x * logfac;
    let term3 = -(1.0 + 3.0 * x) / ((1.0 + 2.0 * x) * (1.0 + 2.0 * x));
    0.75 * (term1 + term2 + term3)
}

/// Implicit Monte Carlo softening factor for one zone.
pub fn fleck_factor(zone: &Zone, planck_mean: f64, fleck_alpha: f64, dt: f64) -> f64 {
    if fleck_alpha == 0.0 {
        return 1.0;
    }
    let gas_energy = zone.e_gas * zone.rho;
    if gas_energy <= 0.0 {
        return 1.0;
    }
    let fleck_beta = 4.0 * pc::RAD_CONST * zone.t_gas.powi(4) / gas_energy;
    let tfac = pc::C_LIGHT * planck_mean * dt;
    let f_imc = fleck_alpha * fleck_beta * tfac;
    1.0 / (1.0 + f_imc)
}

impl<G: TransportGrid> Transport<G> {
    /// Fill the per-zone opacity, emissivity and mean-opacity tables for
    /// this step, co-solving the gas temperature when configured.
    pub fn set_opacity(&mut self, dt: f64, diag: &mut StepDiagnostics) -> TransportResult<()> {
        let ng = self.nu_grid.len();

        // always seed from LTE on the first step
        let nlte_active = self.config.opacity.use_nlte && !self.first_step;
        let solve_temperature =
            self.config.transport.solve_tgas_with_updated_opacities && !self.first_step;

        let results: Vec<TransportResult<ZoneOpacityResult>> = {
            let zones = &self.zones;
            let j_nu = &self.j_nu;
            let grid = &self.grid;
            let gas_proto = &self.gas_proto;
            let config = &self.config;
            let nu_grid = &self.nu_grid;
            let t_now = self.t_now;
            let store_jnu = config.transport.store_jnu;

            self.layout
                .local_zones()
                .collect::<Vec<usize>>()
                .into_par_iter()
                .map_init(
                    || gas_proto.clone(),
                    |gas, i| {
                        let z = &zones[i];
                        let vol = grid.zone_volume(i);
                        fill_and_solve_zone(
                            gas,
                            z,
                            i,
                            vol,
                            t_now,
                            if store_jnu {
                                j_nu.row(i).to_slice()
                            } else {
                                None
                            },
                            config,
                            nu_grid.len(),
                            nlte_active,
                            solve_temperature,
                            grid.elems_z(),
                            grid.elems_a(),
                        )
                    },
                )
                .collect()
        };

        for result in results {
            let r = result?;
            let i = r.zone;
            for j in 0..ng {
                self.abs_opacity[[i, j]] = r.abs[j];
                self.scat_opacity[[i, j]] = r.scat[j];
                self.emissivity[i].set_value(j, r.emis_weights[j]);
            }
            self.emissivity[i].normalize();
            self.planck_mean[i] = r.planck_mean;
            self.rosseland_mean[i] = r.rosseland_mean;
            self.compton_opac[i] = r.compton_opac;
            self.photoion_opac[i] = r.photoion_opac;
            self.zones[i].l_thermal = r.l_thermal;
            self.zones[i].n_elec = r.n_elec;
            if let Some(t_new) = r.t_gas_new {
                if !self.config.transport.fix_tgas_during_transport {
                    self.zones[i].t_gas = t_new;
                }
            }
            diag.gas_report.merge(r.report);
            diag.temp_root_errors += r.temp_root_errors;
            diag.temp_iter_errors += r.temp_iter_errors;
        }

        // cross-rank barrier for the zone-indexed outputs
        let mut buf: Vec<f64> = self.zones.iter().map(|z| z.l_thermal).collect();
        self.layout.allreduce_sum(&mut buf);
        for (z, v) in self.zones.iter_mut().zip(buf.iter()) {
            z.l_thermal = *v;
        }

        // implicit Monte Carlo factor
        for i in 0..self.zones.len() {
            let eps = if self.config.transport.radiative_equilibrium {
                1.0
            } else {
                fleck_factor(
                    &self.zones[i],
                    self.planck_mean[i],
                    self.config.transport.fleck_alpha,
                    dt,
                )
            };
            self.zones[i].eps_imc = eps;
        }
        Ok(())
    }

    /// Comoving opacity and absorption fraction seen by a packet, plus
    /// the comoving frequency bin. `dshift` is nu_cmf / nu_lab.
    pub fn get_opacity(&self, p: &Particle, dshift: f64) -> TransportResult<(f64, f64, usize)> {
        let ZoneIndex::Zone(ind) = p.ind else {
            return Err(radiant_types::error::TransportError::InvariantViolation(
                "opacity query for a terminated particle".to_string(),
            ));
        };

        match p.kind {
            ParticleType::Photon => {
                let nu_cmf = p.nu * dshift;
                let i_nu = self.nu_grid.locate_within_bounds(nu_cmf);
                let a = self.abs_opacity[[ind, i_nu]];
                let s = self.scat_opacity[[ind, i_nu]];
                if !a.is_finite() || !s.is_finite() {
                    return Err(radiant_types::error::TransportError::InvariantViolation(
                        format!("non-finite opacity in zone {ind} bin {i_nu}"),
                    ));
                }
                let opac = a + s;
                let eps = if opac == 0.0 { 0.0 } else { a / opac };
                Ok((opac, eps, i_nu))
            }
            ParticleType::GammaRay => {
                let c_opac = self.compton_opac[ind] * klein_nishina(p.nu);
                let p_opac = self.photoion_opac[ind] * p.nu.powf(-3.5);
                let opac = c_opac + p_opac;
                let eps = if opac == 0.0 { 0.0 } else { p_opac / opac };
                Ok((opac, eps, 0))
            }
        }
    }

    /// Tabulate the Maxwell-Boltzmann speed distribution for Compton
    /// scattering of optical photons; speeds are in units of sqrt(2kT/m).
    pub(crate) fn setup_mb_cdf(&mut self, min_v: f64, max_v: f64, num_v: usize) {
        self.mb_cdf.resize(num_v);
        self.mb_dv = (max_v - min_v) / num_v as f64;
        let mut v = min_v;
        for j in 0..num_v {
            v += self.mb_dv;
            let w = 4.0 / pc::PI.sqrt() * v * v * (-v * v).exp();
            self.mb_cdf.set_value(j, w);
        }
        self.mb_cdf.normalize();
    }
}

/// Load one zone into a worker's gas state, solve it and assemble the
/// opacity row. Pure function of the inputs; runs on worker threads.
#[allow(clippy::too_many_arguments)]
fn fill_and_solve_zone(
    gas: &mut GasState,
    z: &Zone,
    i: usize,
    vol: f64,
    t_now: f64,
    j_nu: Option<&[f64]>,
    config: &radiant_types::config::TransportConfig,
    ng: usize,
    nlte_active: bool,
    solve_temperature: bool,
    elems_z: &[usize],
    elems_a: &[usize],
) -> TransportResult<ZoneOpacityResult> {
    let lim = &config.limits;
    gas.bulk_grey_opacity = z.bulk_grey_opacity;
    gas.total_grey_opacity = z.total_grey_opacity;
    gas.opts.use_nlte = nlte_active;

    let temp = z.t_gas.clamp(lim.temp_min, lim.temp_max);
    gas.set_state(z.rho, temp, t_now);
    gas.e_gamma = if vol > 0.0 { z.l_radio_dep / vol } else { 0.0 };

    // radioactively decay the composition to the current time
    let mut x_now = z.x_comp.clone();
    if !config.radioactive.dont_decay_composition {
        decay::decay_composition(elems_z, elems_a, &mut x_now, t_now);
    }
    gas.set_mass_fractions(&x_now);

    let mut report = SolveReport::default();
    let mut temp_root_errors = 0;
    let mut temp_iter_errors = 0;
    let mut t_gas_new = None;

    if z.total_grey_opacity == 0.0 {
        if solve_temperature {
            let (t_new, rep, root_err, iter_err) =
                solve_state_and_temperature(gas, z, j_nu, lim.temp_min, lim.temp_max)?;
            report.merge(rep);
            temp_root_errors += root_err;
            temp_iter_errors += iter_err;
            t_gas_new = Some(t_new);
        } else {
            report.merge(gas.solve_state(j_nu)?);
        }
    }

    let mut abs = vec![0.0; ng];
    let mut scat = vec![0.0; ng];
    let mut emis = vec![0.0; ng];
    gas.compute_opacity(&mut abs, &mut scat, &mut emis);

    // emissivity CDF weights and the thermal emission rate; means come
    // from the unclamped arrays
    let planck_mean = gas.planck_mean(&abs);
    let rosseland_mean = gas.rosseland_mean(&abs, &scat);

    let nu_grid = gas.nu_grid();
    let mut emis_weights = vec![0.0; ng];
    let mut l_thermal = 0.0;
    if ng == 1 {
        let bb_int = pc::SIGMA_SB * gas.temp.powi(4) / pc::PI;
        l_thermal = 4.0 * pc::PI * abs[0] * bb_int;
        emis_weights[0] = 1.0;
    } else {
        for j in 0..ng {
            let ednu = emis[j] * nu_grid.delta(j);
            emis_weights[j] = ednu;
            l_thermal += 4.0 * pc::PI * ednu;
        }
    }

    // extinction cap, applied after the means
    let max_extinction = config.opacity.maximum_opacity * z.rho;
    if max_extinction > 0.0 {
        for j in 0..ng {
            if abs[j] > max_extinction {
                abs[j] = max_extinction;
            }
            if scat[j] > max_extinction {
                scat[j] = max_extinction;
            }
        }
    }
    if config.opacity.no_scattering {
        scat.iter_mut().for_each(|s| *s = 0.0);
    }

    // analytic gamma-ray opacities summed over the composition
    let mut compton_opac = 0.0;
    let mut photoion_opac = 0.0;
    for (k, (&zk, &ak)) in elems_z.iter().zip(elems_a.iter()).enumerate() {
        let dens = x_now[k] * z.rho;
        let ndens = dens / (pc::M_PROTON * ak as f64);
        compton_opac += ndens * pc::SIGMA_THOMSON * zk as f64;
        let mut photo = pc::ALPHA_FS.powi(4) * 4.0 * 2.0f64.sqrt();
        photo *= (zk as f64).powi(5);
        photo *= pc::M_ELECTRON_MEV.powf(3.5);
        photoion_opac += ndens * 2.0 * pc::SIGMA_THOMSON * photo;
    }

    Ok(ZoneOpacityResult {
        zone: i,
        abs,
        scat,
        emis_weights,
        l_thermal,
        planck_mean,
        rosseland_mean,
        compton_opac,
        photoion_opac,
        n_elec: gas.n_elec,
        t_gas_new,
        report,
        temp_root_errors,
        temp_iter_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_klein_nishina_limits() {
        // soft photons recover Thomson
        assert!((klein_nishina(1e-4) - 1.0).abs() < 1e-3);
        // hard photons are suppressed
        let hard = klein_nishina(10.0);
        assert!(hard > 0.0 && hard < 0.2);
        // monotone decreasing over the gamma-ray band
        let mut prev = klein_nishina(0.01);
        for k in 1..50 {
            let x = 0.01 * 1.2f64.powi(k);
            let v = klein_nishina(x);
            assert!(v < prev, "KN should decrease at x = {x}");
            prev = v;
        }
    }

    #[test]
    fn test_fleck_factor_reference_value() {
        let mut z = radiant_types::state::Zone::new(1);
        z.rho = 1.0;
        z.t_gas = 1.0e4;
        // force fleck_beta = 1
        z.e_gas = 4.0 * pc::RAD_CONST * z.t_gas.powi(4) / z.rho;
        let dt = 1.0e-10;
        let eps = fleck_factor(&z, 1.0, 1.0, dt);
        let expected = 1.0 / (1.0 + pc::C_LIGHT * 1.0 * dt);
        assert!((eps - expected).abs() < 1e-14);
        assert!((eps - 0.25).abs() < 2e-3);
    }

    #[test]
    fn test_fleck_factor_zero_alpha_disables() {
        let mut z = radiant_types::state::Zone::new(1);
        z.rho = 1.0;
        z.t_gas = 1.0e4;
        z.e_gas = 1.0;
        assert_eq!(fleck_factor(&z, 10.0, 0.0, 1.0), 1.0);
    }
}
