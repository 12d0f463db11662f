// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Physical constants in cgs units.

/// Speed of light (cm/s)
pub const C_LIGHT: f64 = 2.99792458e10;

/// Planck constant (erg s)
pub const H_PLANCK: f64 = 6.6260755e-27;

/// Boltzmann constant (erg/K)
pub const K_BOLTZ: f64 = 1.380658e-16;

/// Boltzmann constant (eV/K), exactly K_BOLTZ / EV_TO_ERG so detailed
/// balance closes between the erg and eV bases
pub const K_BOLTZ_EV: f64 = K_BOLTZ / EV_TO_ERG;

/// Electron mass (g)
pub const M_ELECTRON: f64 = 9.1093897e-28;

/// Electron rest energy (MeV)
pub const M_ELECTRON_MEV: f64 = 0.510998;

/// Proton mass (g)
pub const M_PROTON: f64 = 1.6726231e-24;

/// Thomson cross-section (cm^2)
pub const SIGMA_THOMSON: f64 = 6.6523e-25;

/// Integrated classical oscillator line cross-section, pi e^2 / (m_e c) (cm^2 Hz)
pub const SIGMA_LINE_TOT: f64 = 0.02654;

/// Stefan-Boltzmann constant (erg cm^-2 s^-1 K^-4)
pub const SIGMA_SB: f64 = 5.6705e-5;

/// Radiation constant a = 4 sigma / c (erg cm^-3 K^-4)
pub const RAD_CONST: f64 = 7.5657e-15;

/// Fine structure constant
pub const ALPHA_FS: f64 = 7.297352569e-3;

/// Electron volt (erg)
pub const EV_TO_ERG: f64 = 1.60217733e-12;

/// Seconds per day
pub const DAY_TO_SEC: f64 = 86400.0;

/// pi
pub const PI: f64 = std::f64::consts::PI;
