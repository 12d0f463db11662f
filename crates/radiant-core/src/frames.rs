// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Frames
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Special-relativistic frame transforms.
//!
//! The Doppler factor delta = nu_cmf / nu_lab = gamma (1 - v.D / c) is
//! used as-is for nonrelativistic flows too. Lab-frame extinction is the
//! comoving opacity times delta (Mihalas & Mihalas 90.8).

use radiant_types::constants as pc;

use crate::particle::Particle;

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn gamma_of(v: &[f64; 3]) -> f64 {
    let beta2 = dot(v, v) / (pc::C_LIGHT * pc::C_LIGHT);
    1.0 / (1.0 - beta2).sqrt()
}

/// Doppler factor nu_cmf / nu_lab for a lab-frame direction.
pub fn dshift_lab_to_comoving(v: &[f64; 3], d_lab: &[f64; 3]) -> f64 {
    gamma_of(v) * (1.0 - dot(v, d_lab) / pc::C_LIGHT)
}

/// Doppler factor nu_lab / nu_cmf for a comoving-frame direction.
pub fn dshift_comoving_to_lab(v: &[f64; 3], d_cmf: &[f64; 3]) -> f64 {
    gamma_of(v) * (1.0 + dot(v, d_cmf) / pc::C_LIGHT)
}

/// Aberrate a unit direction out of the frame moving with velocity `v`.
/// `d` is the direction measured in the moving (comoving) frame.
fn aberrate_to_lab(v: &[f64; 3], d: &[f64; 3]) -> [f64; 3] {
    let gamma = gamma_of(v);
    let beta = [
        v[0] / pc::C_LIGHT,
        v[1] / pc::C_LIGHT,
        v[2] / pc::C_LIGHT,
    ];
    let bd = dot(&beta, d);
    let denom = 1.0 + bd;
    let coef = gamma * (1.0 + gamma / (gamma + 1.0) * bd);
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = (d[i] + coef * beta[i]) / (gamma * denom);
    }
    // renormalize against accumulated rounding
    let n = dot(&out, &out).sqrt();
    for o in out.iter_mut() {
        *o /= n;
    }
    out
}

/// Transform a packet from the comoving frame at fluid velocity `v`
/// into the lab frame: direction aberration plus frequency and energy
/// boosts by the same Doppler factor.
pub fn transform_comoving_to_lab(p: &mut Particle, v: &[f64; 3]) {
    let shift = dshift_comoving_to_lab(v, &p.d);
    p.d = aberrate_to_lab(v, &p.d);
    p.nu *= shift;
    p.e *= shift;
}

/// Inverse transform: lab frame into the comoving frame at velocity `v`.
pub fn transform_lab_to_comoving(p: &mut Particle, v: &[f64; 3]) {
    let shift = dshift_lab_to_comoving(v, &p.d);
    let flipped = [-v[0], -v[1], -v[2]];
    p.d = aberrate_to_lab(&flipped, &p.d);
    p.nu *= shift;
    p.e *= shift;
}
