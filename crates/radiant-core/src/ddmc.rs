// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Discrete Diffusion
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Diffusion acceleration for very optically thick zones: either a
//! random walk on a sphere with a tabulated escape-time distribution, or
//! discrete diffusion with per-zone face probabilities drawn once per
//! step. Packets crossing into optically thin zones convert back to
//! ordinary Monte Carlo flights with an outward-biased direction.

use radiant_math::table::LookupTable;
use radiant_types::config::DiffusionMethod;
use radiant_types::constants as pc;
use radiant_types::error::TransportResult;

use rand::Rng;
use rand_distr::UnitSphere;

use crate::grid::TransportGrid;
use crate::particle::{Particle, ParticleFate, ZoneIndex};
use crate::transport::Transport;

/// Number of tabulated points of the sphere escape-time distribution.
const RANDOMWALK_NPTS: usize = 200;
/// Largest tabulated diffusion time, x = D t / R^2.
const RANDOMWALK_MAX_X: f64 = 2.0;
/// Series terms for the escape probability.
const RANDOMWALK_SUM_N: usize = 100;

/// Per-zone diffusion state, rebuilt once per step.
#[derive(Debug, Clone)]
pub struct DdmcState {
    pub method: DiffusionMethod,
    pub p_up: Vec<f64>,
    pub p_dn: Vec<f64>,
    pub p_adv: Vec<f64>,
    pub p_abs: Vec<f64>,
    pub p_stay: Vec<f64>,
    pub use_in_zone: Vec<bool>,
    /// Escape probability of the diffusion sphere vs x = D t / R^2.
    pub randomwalk_pescape: LookupTable,
}

/// P_escape(x) for a particle born at the center of an absorbing-free
/// sphere, from the eigenfunction series of the diffusion equation.
pub fn randomwalk_escape_probability(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for n in 1..=RANDOMWALK_SUM_N {
        let nf = n as f64;
        let sign = if n % 2 == 1 { 1.0 } else { -1.0 };
        sum += sign * (-nf * nf * pc::PI * pc::PI * x).exp();
    }
    (1.0 - 2.0 * sum).clamp(0.0, 1.0)
}

impl DdmcState {
    pub fn new(n_zones: usize, method: DiffusionMethod) -> Self {
        let randomwalk_pescape = if method == DiffusionMethod::RandomWalk {
            let mut xs = Vec::with_capacity(RANDOMWALK_NPTS);
            let mut ys = Vec::with_capacity(RANDOMWALK_NPTS);
            for k in 0..RANDOMWALK_NPTS {
                let x = RANDOMWALK_MAX_X * (k as f64 + 1.0) / RANDOMWALK_NPTS as f64;
                xs.push(x);
                ys.push(randomwalk_escape_probability(x));
            }
            LookupTable::new(xs, ys)
        } else {
            LookupTable::default()
        };
        DdmcState {
            method,
            p_up: vec![0.0; n_zones],
            p_dn: vec![0.0; n_zones],
            p_adv: vec![0.0; n_zones],
            p_abs: vec![0.0; n_zones],
            p_stay: vec![0.0; n_zones],
            use_in_zone: vec![false; n_zones],
            randomwalk_pescape,
        }
    }
}

impl<G: TransportGrid> Transport<G> {
    /// Flag optically thick zones and build the per-face probabilities
    /// for this step's diffusion draws.
    pub fn compute_diffusion_probabilities(&mut self, dt: f64) {
        let Some(mut ddmc) = self.ddmc.take() else {
            return;
        };
        let tau_thresh = self.config.transport.ddmc_tau_threshold;
        let n = self.grid.n_zones();

        for i in 0..n {
            let dx = self.grid.zone_min_length(i);
            let tau = self.rosseland_mean[i] * dx;
            ddmc.use_in_zone[i] = tau > tau_thresh;
            if !ddmc.use_in_zone[i] {
                ddmc.p_up[i] = 0.0;
                ddmc.p_dn[i] = 0.0;
                ddmc.p_adv[i] = 0.0;
                ddmc.p_abs[i] = 0.0;
                ddmc.p_stay[i] = 1.0;
                continue;
            }

            let alpha_r = self.rosseland_mean[i].max(1e-30);
            let d_coef = pc::C_LIGHT / (3.0 * alpha_r);

            let dx_up = if i + 1 < n {
                self.grid.zone_min_length(i + 1)
            } else {
                dx
            };
            let dx_dn = if i > 0 {
                self.grid.zone_min_length(i - 1)
            } else {
                dx
            };
            let k_up = 2.0 * d_coef / (dx * (dx + dx_up));
            let k_dn = 2.0 * d_coef / (dx * (dx + dx_dn));

            let speed = {
                let v = self.zones[i].v;
                (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
            };
            let k_adv = speed / dx;
            let k_abs =
                pc::C_LIGHT * self.planck_mean[i] * self.zones[i].eps_imc.clamp(0.0, 1.0);

            let denom = 1.0 + (k_up + k_dn + k_adv + k_abs) * dt;
            ddmc.p_up[i] = k_up * dt / denom;
            ddmc.p_dn[i] = k_dn * dt / denom;
            ddmc.p_adv[i] = k_adv * dt / denom;
            ddmc.p_abs[i] = k_abs * dt / denom;
            ddmc.p_stay[i] = 1.0 / denom;
        }
        self.ddmc = Some(ddmc);
    }

    /// Dispatch a packet sitting in a flagged zone to the configured
    /// diffusion kernel.
    pub(crate) fn discrete_diffuse(
        &mut self,
        p: &mut Particle,
        tstop: f64,
    ) -> TransportResult<ParticleFate> {
        let method = self.ddmc.as_ref().map(|d| d.method);
        match method {
            Some(DiffusionMethod::RandomWalk) => self.discrete_diffuse_randomwalk(p, tstop),
            Some(DiffusionMethod::Ddmc) => self.discrete_diffuse_ddmc(p, tstop),
            _ => Ok(ParticleFate::Moving),
        }
    }

    /// One-face-per-draw discrete diffusion.
    fn discrete_diffuse_ddmc(
        &mut self,
        p: &mut Particle,
        tstop: f64,
    ) -> TransportResult<ParticleFate> {
        loop {
            let Some(ind) = p.ind.zone() else {
                return Ok(match p.ind {
                    ZoneIndex::Absorbed => ParticleFate::Absorbed,
                    _ => ParticleFate::Escaped,
                });
            };
            let flagged = self
                .ddmc
                .as_ref()
                .map(|d| d.use_in_zone[ind])
                .unwrap_or(false);
            if !flagged {
                // back in an ordinary Monte Carlo zone
                self.emerge_from_diffusion(p);
                return Ok(ParticleFate::Moving);
            }
            let dt_rem = tstop - p.t;
            if dt_rem <= 0.0 {
                return Ok(ParticleFate::Stopped);
            }

            let (p_up, p_dn, p_adv, p_abs) = {
                let d = self.ddmc.as_ref().unwrap();
                (d.p_up[ind], d.p_dn[ind], d.p_adv[ind], d.p_abs[ind])
            };
            let u = self.rng.uniform();
            let n_zones = self.grid.n_zones();

            if u < p_up + p_dn {
                // leak through a face partway through the step
                let frac = self.rng.uniform();
                let dt_ev = dt_rem * frac;
                self.zones[ind].e_rad += p.e * pc::C_LIGHT * dt_ev;
                p.t += dt_ev;
                let dest = if u < p_up {
                    if ind + 1 >= n_zones {
                        p.ind = ZoneIndex::Escaped;
                        return Ok(ParticleFate::Escaped);
                    }
                    ind + 1
                } else if ind == 0 {
                    p.ind = ZoneIndex::Absorbed;
                    return Ok(ParticleFate::Absorbed);
                } else {
                    ind - 1
                };
                p.x = self.grid.sample_in_zone(dest, self.rng.uniform3());
                p.ind = ZoneIndex::Zone(dest);
                continue;
            }
            if u < p_up + p_dn + p_adv {
                // advect with the flow for the rest of the step
                self.zones[ind].e_rad += p.e * pc::C_LIGHT * dt_rem;
                p.t = tstop;
                return Ok(ParticleFate::Stopped);
            }
            if u < p_up + p_dn + p_adv + p_abs {
                let frac = self.rng.uniform();
                let dt_ev = dt_rem * frac;
                self.zones[ind].e_rad += p.e * pc::C_LIGHT * dt_ev;
                self.zones[ind].e_abs += p.e;
                p.t += dt_ev;
                return Ok(ParticleFate::Absorbed);
            }
            // stay put until the step ends
            self.zones[ind].e_rad += p.e * pc::C_LIGHT * dt_rem;
            p.t = tstop;
            return Ok(ParticleFate::Stopped);
        }
    }

    /// Random walk on the largest sphere that fits in the zone, with the
    /// escape time drawn from the tabulated distribution.
    fn discrete_diffuse_randomwalk(
        &mut self,
        p: &mut Particle,
        tstop: f64,
    ) -> TransportResult<ParticleFate> {
        loop {
            let Some(ind) = p.ind.zone() else {
                return Ok(match p.ind {
                    ZoneIndex::Absorbed => ParticleFate::Absorbed,
                    _ => ParticleFate::Escaped,
                });
            };
            let flagged = self
                .ddmc
                .as_ref()
                .map(|d| d.use_in_zone[ind])
                .unwrap_or(false);
            if !flagged {
                self.emerge_from_diffusion(p);
                return Ok(ParticleFate::Moving);
            }
            let dt_rem = tstop - p.t;
            if dt_rem <= 0.0 {
                return Ok(ParticleFate::Stopped);
            }

            let alpha_r = self.rosseland_mean[ind].max(1e-30);
            let d_coef = pc::C_LIGHT / (3.0 * alpha_r);
            let r0 = 0.45 * self.grid.zone_min_length(ind);

            // escape time of this walk segment
            let u = self.rng.uniform();
            let x_samp = {
                let d = self.ddmc.as_ref().unwrap();
                d.randomwalk_pescape.invert_monotone(u)
            };
            let t_esc = x_samp * r0 * r0 / d_coef;

            let dt_seg = t_esc.min(dt_rem);
            self.zones[ind].e_rad += p.e * pc::C_LIGHT * dt_seg;

            // absorption over the elapsed diffusion path
            let eps = self.zones[ind].eps_imc.clamp(0.0, 1.0);
            let tau_abs = eps * self.planck_mean[ind] * pc::C_LIGHT * dt_seg;
            if self.rng.uniform() < -(-tau_abs).exp_m1() {
                self.zones[ind].e_abs += p.e;
                return Ok(ParticleFate::Absorbed);
            }

            if t_esc >= dt_rem {
                p.t = tstop;
                return Ok(ParticleFate::Stopped);
            }

            // jump to the sphere surface and keep walking
            let dir: [f64; 3] = self.rng.inner().sample(UnitSphere);
            for k in 0..3 {
                p.x[k] += r0 * dir[k];
            }
            p.t += t_esc;
            p.d = dir;
            p.ind = self.grid.get_zone(&p.x);
        }
    }

    /// Convert a diffusing packet back to a flight with an
    /// outward-biased direction off the interface.
    fn emerge_from_diffusion(&mut self, p: &mut Particle) {
        let r = p.r();
        let n_hat = if r > 0.0 {
            [p.x[0] / r, p.x[1] / r, p.x[2] / r]
        } else {
            [0.0, 0.0, 1.0]
        };
        // cosine-biased about the radial normal
        let cost = self.rng.uniform().sqrt();
        let sint = (1.0 - cost * cost).sqrt();
        let phi = 2.0 * pc::PI * self.rng.uniform();
        // build tangent frame around n_hat
        let seed = if n_hat[0].abs() < 0.9 {
            [1.0, 0.0, 0.0]
        } else {
            [0.0, 1.0, 0.0]
        };
        let mut e1 = [
            seed[1] * n_hat[2] - seed[2] * n_hat[1],
            seed[2] * n_hat[0] - seed[0] * n_hat[2],
            seed[0] * n_hat[1] - seed[1] * n_hat[0],
        ];
        let n1 = (e1[0] * e1[0] + e1[1] * e1[1] + e1[2] * e1[2]).sqrt();
        for c in e1.iter_mut() {
            *c /= n1;
        }
        let e2 = [
            n_hat[1] * e1[2] - n_hat[2] * e1[1],
            n_hat[2] * e1[0] - n_hat[0] * e1[2],
            n_hat[0] * e1[1] - n_hat[1] * e1[0],
        ];
        for k in 0..3 {
            p.d[k] = cost * n_hat[k] + sint * (phi.cos() * e1[k] + phi.sin() * e2[k]);
        }
    }
}
