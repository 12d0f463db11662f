//! Single-packet propagation: event selection between interaction,
//! boundary crossing and end of time step, with zone tallying and the
//! scattering kernels.

use radiant_types::constants as pc;
use radiant_types::error::TransportResult;

use rand::Rng;
use rand_distr::UnitSphere;

use crate::frames::{dshift_lab_to_comoving, transform_comoving_to_lab, transform_lab_to_comoving};
use crate::grid::TransportGrid;
use crate::particle::{Particle, ParticleFate, ParticleType, ZoneIndex};
use crate::transport::{StepDiagnostics, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParticleEvent {
    Scatter,
    Boundary,
    Tstep,
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Orthonormal pair perpendicular to the unit vector `v_hat`.
fn perpendicular_basis(v_hat: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    let seed = if v_hat[0].abs() <= v_hat[1].abs() && v_hat[0].abs() <= v_hat[2].abs() {
        [1.0, 0.0, 0.0]
    } else if v_hat[1].abs() <= v_hat[2].abs() {
        [0.0, 1.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    };
    let raw = cross(seed, v_hat);
    let norm = dot(raw, raw).sqrt().max(1e-30);
    let e1 = [raw[0] / norm, raw[1] / norm, raw[2] / norm];
    let e2 = cross(v_hat, e1);
    (e1, e2)
}

/// Rotate `d` by the scattering angle cos = mu about a uniform azimuth.
fn rotate_about(d: [f64; 3], mu: f64, psi: f64) -> [f64; 3] {
    let (e1, e2) = perpendicular_basis(d);
    let smu = (1.0 - mu * mu).max(0.0).sqrt();
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = mu * d[i] + smu * (psi.cos() * e1[i] + psi.sin() * e2[i]);
    }
    let n = dot(out, out).sqrt();
    for o in out.iter_mut() {
        *o /= n;
    }
    out
}

impl<G: TransportGrid> Transport<G> {
    /// Advance one packet until it escapes, is absorbed or the time step
    /// ends. Escaped photons land in the observer spectra.
    pub fn propagate(
        &mut self,
        p: &mut Particle,
        tstop: f64,
        diag: &mut StepDiagnostics,
    ) -> TransportResult<ParticleFate> {
        p.check_invariants(self.grid.n_zones())?;

        let mut fate = ParticleFate::Moving;
        p.ind = self.grid.get_zone(&p.x);
        match p.ind {
            ZoneIndex::Absorbed => return Ok(ParticleFate::Absorbed),
            ZoneIndex::Escaped => return Ok(ParticleFate::Escaped),
            ZoneIndex::Zone(_) => {}
        }

        while fate == ParticleFate::Moving {
            let ind = match p.ind {
                ZoneIndex::Zone(i) => i,
                ZoneIndex::Absorbed => {
                    fate = ParticleFate::Absorbed;
                    break;
                }
                ZoneIndex::Escaped => {
                    fate = ParticleFate::Escaped;
                    break;
                }
            };

            // hand optically thick zones to the diffusion kernels
            if p.kind == ParticleType::Photon {
                if let Some(ddmc) = &self.ddmc {
                    if ddmc.use_in_zone[ind] {
                        fate = self.discrete_diffuse(p, tstop)?;
                        continue;
                    }
                }
            }

            let (new_ind, d_bn) =
                self.grid
                    .get_next_zone(&p.x, &p.d, ind, self.config.core.radius);

            let v = self.zones[ind].v;
            let dshift = dshift_lab_to_comoving(&v, &p.d);

            let (opac_cmf, eps_cmf, i_nu) = self.get_opacity(p, dshift)?;

            // lab-frame extinction for the interaction distance
            // (Mihalas & Mihalas 90.8)
            let opac_lab = opac_cmf * dshift;

            let tau_r = -(self.rng.open_uniform()).ln();
            let d_sc = if opac_lab > 0.0 {
                tau_r / opac_lab
            } else {
                f64::INFINITY
            };
            if d_sc <= 0.0 {
                diag.nonpositive_distance += 1;
            }

            let d_tm = if self.config.steady_state() {
                f64::INFINITY
            } else {
                (tstop - p.t) * pc::C_LIGHT
            };

            let (event, this_d) = if d_sc < d_bn && d_sc < d_tm {
                (ParticleEvent::Scatter, d_sc)
            } else if d_bn < d_tm {
                (ParticleEvent::Boundary, d_bn)
            } else {
                (ParticleEvent::Tstep, d_tm)
            };

            // tally the lab-frame radiation energy and the comoving
            // absorption (two Doppler factors)
            let this_e = p.e * this_d;
            self.zones[ind].e_rad += this_e;
            if p.kind == ParticleType::Photon {
                self.zones[ind].e_abs += this_e * dshift * opac_cmf * eps_cmf * dshift;
                if self.config.transport.store_jnu {
                    self.j_nu[[ind, i_nu]] += this_e;
                }
            }

            for k in 0..3 {
                p.x[k] += this_d * p.d[k];
            }
            p.t += this_d / pc::C_LIGHT;

            match event {
                ParticleEvent::Boundary => match new_ind {
                    ZoneIndex::Absorbed if self.config.transport.boundary_in_reflect => {
                        self.reflect_radial(p);
                    }
                    ZoneIndex::Escaped if self.config.transport.boundary_out_reflect => {
                        self.reflect_radial(p);
                    }
                    _ => {
                        p.ind = new_ind;
                        match new_ind {
                            ZoneIndex::Absorbed => fate = ParticleFate::Absorbed,
                            ZoneIndex::Escaped => fate = ParticleFate::Escaped,
                            ZoneIndex::Zone(_) => {}
                        }
                    }
                },
                ParticleEvent::Scatter => {
                    if self.rng.uniform() > eps_cmf {
                        self.do_scatter(p, ind);
                    } else {
                        fate = ParticleFate::Absorbed;
                    }
                }
                ParticleEvent::Tstep => {
                    fate = ParticleFate::Stopped;
                }
            }
        }

        if fate == ParticleFate::Escaped {
            // observer time relative to the grid center
            let t_obs = p.t - p.x_dot_d() / pc::C_LIGHT;
            match p.kind {
                ParticleType::Photon => {
                    self.optical_spectrum.count(t_obs, p.nu, p.e, &p.d);
                }
                ParticleType::GammaRay => {
                    self.gamma_spectrum.count(t_obs, p.nu, p.e, &p.d);
                }
            }
            if self.particles_escaped.len() < self.config.spectrum.particle_list_maxn {
                self.particles_escaped.push(*p);
            }
        }
        Ok(fate)
    }

    /// Specular reflection off the spherical boundary at the current
    /// position.
    fn reflect_radial(&mut self, p: &mut Particle) {
        let r = p.r();
        if r <= 0.0 {
            return;
        }
        let n = [p.x[0] / r, p.x[1] / r, p.x[2] / r];
        let dn = dot(p.d, n);
        for k in 0..3 {
            p.d[k] -= 2.0 * dn * n[k];
        }
        // nudge off the boundary surface
        for k in 0..3 {
            p.x[k] *= 1.0 - 1.0e-12 * dn.signum();
        }
    }

    /// Scattering kernel dispatch; updates the last-interaction point.
    pub(crate) fn do_scatter(&mut self, p: &mut Particle, ind: usize) {
        p.x_interact = p.x;
        match p.kind {
            ParticleType::GammaRay => self.compton_scatter(p, ind),
            ParticleType::Photon => {
                if self.config.opacity.compton_scatter_photons {
                    self.compton_scatter_photon(p, ind);
                } else {
                    self.isotropic_scatter(p, ind);
                }
            }
        }
    }

    /// Coherent isotropic scattering in the comoving frame.
    pub(crate) fn isotropic_scatter(&mut self, p: &mut Particle, ind: usize) {
        let v = self.zones[ind].v;
        transform_lab_to_comoving(p, &v);
        let mu = 1.0 - 2.0 * self.rng.uniform();
        let phi = 2.0 * pc::PI * self.rng.uniform();
        let smu = (1.0 - mu * mu).sqrt();
        p.d = [smu * phi.cos(), smu * phi.sin(), mu];
        transform_comoving_to_lab(p, &v);
    }

    /// Compton scattering of a gamma-ray packet: Klein-Nishina angle
    /// sampling by rejection and the Compton frequency shift. The packet
    /// conserves photon number, so its energy scales with the shift.
    pub(crate) fn compton_scatter(&mut self, p: &mut Particle, ind: usize) {
        let v = self.zones[ind].v;
        transform_lab_to_comoving(p, &v);

        let x = p.nu / pc::M_ELECTRON_MEV;
        let mut mu;
        let mut ffactor;
        loop {
            mu = 1.0 - 2.0 * self.rng.uniform();
            ffactor = 1.0 / (1.0 + x * (1.0 - mu));
            // differential cross-section, peaks at mu = 1 with value 2
            let dsigma = ffactor * ffactor * (ffactor + 1.0 / ffactor - (1.0 - mu * mu));
            if 2.0 * self.rng.uniform() < dsigma {
                break;
            }
        }
        let psi = 2.0 * pc::PI * self.rng.uniform();
        p.d = rotate_about(p.d, mu, psi);
        p.nu *= ffactor;
        p.e *= ffactor;

        transform_comoving_to_lab(p, &v);
    }

    /// Compton scattering of an optical photon off a thermal electron
    /// drawn from the tabulated Maxwell-Boltzmann speed distribution.
    pub(crate) fn compton_scatter_photon(&mut self, p: &mut Particle, ind: usize) {
        let v = self.zones[ind].v;
        transform_lab_to_comoving(p, &v);

        let t_gas = self.zones[ind].t_gas.max(1.0);
        let v_th = (2.0 * pc::K_BOLTZ * t_gas / pc::M_ELECTRON).sqrt();
        let iv = self.mb_cdf.sample(self.rng.uniform());
        let speed = (iv as f64 + self.rng.uniform()) * self.mb_dv * v_th;
        let dir: [f64; 3] = self.rng.inner().sample(UnitSphere);
        let v_elec = [speed * dir[0], speed * dir[1], speed * dir[2]];

        // Doppler into the electron frame, coherent scatter, and back
        let shift_in = 1.0 - dot(v_elec, p.d) / pc::C_LIGHT;
        let mu = 1.0 - 2.0 * self.rng.uniform();
        let phi = 2.0 * pc::PI * self.rng.uniform();
        let smu = (1.0 - mu * mu).sqrt();
        let d_new = [smu * phi.cos(), smu * phi.sin(), mu];
        let shift_out = 1.0 - dot(v_elec, d_new) / pc::C_LIGHT;

        let ratio = shift_in / shift_out;
        p.nu *= ratio;
        p.e *= ratio;
        p.d = d_new;

        transform_comoving_to_lab(p, &v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perpendicular_basis_is_orthonormal() {
        for d in [
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [0.6, 0.64, 0.48],
            [-0.267, 0.534, 0.802],
        ] {
            let n = dot(d, d).sqrt();
            let d = [d[0] / n, d[1] / n, d[2] / n];
            let (e1, e2) = perpendicular_basis(d);
            assert!(dot(e1, d).abs() < 1e-12);
            assert!(dot(e2, d).abs() < 1e-12);
            assert!(dot(e1, e2).abs() < 1e-12);
            assert!((dot(e1, e1) - 1.0).abs() < 1e-12);
            assert!((dot(e2, e2) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rotate_about_preserves_angle() {
        let d = [0.0, 0.0, 1.0];
        for &mu in &[-0.9, -0.3, 0.0, 0.5, 0.99] {
            for &psi in &[0.0, 1.0, 3.0, 6.0] {
                let out = rotate_about(d, mu, psi);
                assert!((dot(out, d) - mu).abs() < 1e-12);
                assert!((dot(out, out) - 1.0).abs() < 1e-12);
            }
        }
    }
}
