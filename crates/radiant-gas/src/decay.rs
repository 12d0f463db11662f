// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Decay
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Radioactive energy deposition from the 56Ni -> 56Co -> 56Fe chain,
//! with an optional r-process heating override.
//!
//! Compositions are assumed to be specified at t = 0; `decay` evaluates
//! the instantaneous specific heating at time `t` from those initial
//! abundances, and `decay_composition` advances the mass fractions.

use radiant_types::constants as pc;

/// 56Ni decay constant (1/s); half-life 6.075 days.
const LAMBDA_NI56: f64 = 0.693147 / (6.075 * pc::DAY_TO_SEC);
/// 56Co decay constant (1/s); half-life 77.27 days.
const LAMBDA_CO56: f64 = 0.693147 / (77.27 * pc::DAY_TO_SEC);
/// Mean gamma-ray energy per 56Ni decay (MeV).
const E_NI56_GAMMA_MEV: f64 = 1.75;
/// Mean gamma-ray energy per 56Co decay (MeV).
const E_CO56_GAMMA_MEV: f64 = 3.61;
/// Mean positron kinetic energy per 56Co decay (MeV).
const E_CO56_POSITRON_MEV: f64 = 0.12;

const MEV_TO_ERG: f64 = 1.602177e-6;

/// Instantaneous specific heating and the fraction carried by gamma-rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRates {
    /// Total specific heating rate (erg/g/s).
    pub total: f64,
    /// Fraction of the heating emitted as gamma-ray packets; the rest
    /// (positron kinetic energy) deposits locally.
    pub gamma_frac: f64,
}

/// Number of 56Ni per gram at t = 0 for mass fraction `x`.
fn ni56_per_gram(x: f64) -> f64 {
    x / (56.0 * pc::M_PROTON)
}

/// Specific r-process heating (erg/g/s), a single power law in time.
pub fn rprocess_heating(t: f64) -> f64 {
    let t_day = (t / pc::DAY_TO_SEC).max(1e-4);
    1.0e10 * t_day.powf(-1.3)
}

/// Specific radioactive heating at time `t` from the t = 0 composition.
pub fn decay(
    elem_z: &[usize],
    elem_a: &[usize],
    x_comp: &[f64],
    t: f64,
    force_rprocess: bool,
) -> DecayRates {
    if force_rprocess {
        // r-process heating carries no discrete gamma lines here; all of
        // it thermalizes locally
        return DecayRates {
            total: rprocess_heating(t),
            gamma_frac: 0.0,
        };
    }

    let mut x_ni0 = 0.0;
    let mut x_co0 = 0.0;
    for (k, (&z, &a)) in elem_z.iter().zip(elem_a.iter()).enumerate() {
        if z == 28 && a == 56 {
            x_ni0 += x_comp[k];
        }
        if z == 27 && a == 56 {
            x_co0 += x_comp[k];
        }
    }
    if x_ni0 == 0.0 && x_co0 == 0.0 {
        return DecayRates {
            total: 0.0,
            gamma_frac: 0.0,
        };
    }

    let n_ni0 = ni56_per_gram(x_ni0);
    let n_co0 = ni56_per_gram(x_co0);

    let e_ni = (-LAMBDA_NI56 * t).exp();
    let e_co = (-LAMBDA_CO56 * t).exp();

    // chain solution for the 56Co abundance
    let n_ni = n_ni0 * e_ni;
    let n_co =
        n_co0 * e_co + n_ni0 * LAMBDA_NI56 / (LAMBDA_CO56 - LAMBDA_NI56) * (e_ni - e_co);

    let l_ni = n_ni * LAMBDA_NI56 * E_NI56_GAMMA_MEV * MEV_TO_ERG;
    let l_co_gamma = n_co * LAMBDA_CO56 * E_CO56_GAMMA_MEV * MEV_TO_ERG;
    let l_co_pos = n_co * LAMBDA_CO56 * E_CO56_POSITRON_MEV * MEV_TO_ERG;

    let total = l_ni + l_co_gamma + l_co_pos;
    let gamma_frac = if total > 0.0 {
        (l_ni + l_co_gamma) / total
    } else {
        0.0
    };
    DecayRates { total, gamma_frac }
}

/// Advance the t = 0 mass fractions to time `t` along the decay chain.
/// Daughter products land on 27/56 and 26/56 entries when present.
pub fn decay_composition(elem_z: &[usize], elem_a: &[usize], x_comp: &mut [f64], t: f64) {
    let mut i_ni = None;
    let mut i_co = None;
    let mut i_fe = None;
    for (k, (&z, &a)) in elem_z.iter().zip(elem_a.iter()).enumerate() {
        match (z, a) {
            (28, 56) => i_ni = Some(k),
            (27, 56) => i_co = Some(k),
            (26, 56) => i_fe = Some(k),
            _ => {}
        }
    }
    let Some(i_ni) = i_ni else { return };

    let x_ni0 = x_comp[i_ni];
    let x_co0 = i_co.map(|k| x_comp[k]).unwrap_or(0.0);

    let e_ni = (-LAMBDA_NI56 * t).exp();
    let e_co = (-LAMBDA_CO56 * t).exp();

    let x_ni = x_ni0 * e_ni;
    let x_co =
        x_co0 * e_co + x_ni0 * LAMBDA_NI56 / (LAMBDA_CO56 - LAMBDA_NI56) * (e_ni - e_co);
    let x_fe_new = (x_ni0 + x_co0) - x_ni - x_co;

    x_comp[i_ni] = x_ni;
    if let Some(k) = i_co {
        x_comp[k] = x_co;
    }
    if let Some(k) = i_fe {
        x_comp[k] += x_fe_new;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Z: [usize; 3] = [28, 27, 26];
    const A: [usize; 3] = [56, 56, 56];

    #[test]
    fn test_pure_ni_heating_decreases() {
        let x = [1.0, 0.0, 0.0];
        let day = pc::DAY_TO_SEC;
        let r1 = decay(&Z, &A, &x, 1.0 * day, false);
        let r10 = decay(&Z, &A, &x, 10.0 * day, false);
        let r100 = decay(&Z, &A, &x, 100.0 * day, false);
        assert!(r1.total > 0.0);
        assert!(r1.total > r10.total);
        assert!(r10.total > r100.total);
    }

    #[test]
    fn test_gamma_fraction_bounded_and_high_early() {
        let x = [1.0, 0.0, 0.0];
        let r = decay(&Z, &A, &x, 1.0 * pc::DAY_TO_SEC, false);
        // early heating is nickel-dominated, which is all gamma
        assert!(r.gamma_frac > 0.99 && r.gamma_frac <= 1.0);
        let r_late = decay(&Z, &A, &x, 200.0 * pc::DAY_TO_SEC, false);
        assert!(r_late.gamma_frac > 0.9 && r_late.gamma_frac < 1.0);
    }

    #[test]
    fn test_no_radioisotopes_no_heating() {
        let z = [1usize, 2];
        let a = [1usize, 4];
        let r = decay(&z, &a, &[0.7, 0.3], 1.0e5, false);
        assert_eq!(r.total, 0.0);
        assert_eq!(r.gamma_frac, 0.0);
    }

    #[test]
    fn test_rprocess_override_power_law() {
        let t1 = 1.0 * pc::DAY_TO_SEC;
        let t2 = 2.0 * pc::DAY_TO_SEC;
        let r1 = decay(&Z, &A, &[0.0; 3], t1, true);
        let r2 = decay(&Z, &A, &[0.0; 3], t2, true);
        let ratio = r1.total / r2.total;
        assert!((ratio - 2.0f64.powf(1.3)).abs() < 1e-10);
        assert_eq!(r1.gamma_frac, 0.0);
    }

    #[test]
    fn test_composition_decay_conserves_mass() {
        let mut x = [0.5, 0.1, 0.2];
        let sum0: f64 = x.iter().sum();
        decay_composition(&Z, &A, &mut x, 50.0 * pc::DAY_TO_SEC);
        let sum1: f64 = x.iter().sum();
        assert!((sum0 - sum1).abs() < 1e-12);
        assert!(x[0] < 0.5); // nickel decayed
        assert!(x[2] > 0.2); // iron grew
    }

    #[test]
    fn test_composition_decay_half_life() {
        let mut x = [1.0, 0.0, 0.0];
        decay_composition(&Z, &A, &mut x, 6.075 * pc::DAY_TO_SEC);
        assert!((x[0] - 0.5).abs() < 1e-4);
    }
}
