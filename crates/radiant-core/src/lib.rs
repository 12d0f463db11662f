// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Radiant Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Time-dependent Monte Carlo radiation transport for radiating flows.
//!
//! The engine propagates energy packets through a zone grid, tallies
//! radiation moments, couples to the gas-state solver for opacities and
//! emissivities, and bins escaping packets into observer-frame spectra.

pub mod ddmc;
pub mod emission;
pub mod frames;
pub mod grid;
pub mod opacity;
pub mod particle;
pub mod propagate;
pub mod rank;
pub mod rng;
pub mod spectrum;
pub mod temperature;
pub mod transport;

pub use particle::{Particle, ParticleFate, ParticleType, ZoneIndex};
pub use transport::{StepDiagnostics, Transport};
