// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Planck
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Planck function in frequency units and its temperature derivative.

use radiant_types::constants as pc;

/// Specific intensity of a blackbody, B_nu(T) (erg/s/cm^2/Hz/sr).
pub fn blackbody_nu(t: f64, nu: f64) -> f64 {
    let zeta = pc::H_PLANCK * nu / (pc::K_BOLTZ * t);
    2.0 * nu * nu * nu * pc::H_PLANCK / (pc::C_LIGHT * pc::C_LIGHT) / zeta.exp_m1()
}

/// dB_nu/dT, the Rosseland weighting function.
pub fn dblackbody_dt(t: f64, nu: f64) -> f64 {
    let zeta = pc::H_PLANCK * nu / (pc::K_BOLTZ * t);
    if zeta > 700.0 {
        return 0.0;
    }
    let ez = zeta.exp();
    let denom = ez - 1.0;
    2.0 * nu * nu * nu * pc::H_PLANCK / (pc::C_LIGHT * pc::C_LIGHT) * zeta / t * ez
        / (denom * denom)
}
