// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Particle
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Radiation energy packets.

use radiant_types::error::{TransportError, TransportResult};

/// What a packet represents. Gamma-ray packets store the photon energy
/// in MeV in the frequency slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleType {
    Photon,
    GammaRay,
}

/// Where a packet currently sits: a grid zone, or one of the two
/// terminal states (absorbed at the inner boundary, escaped the outer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneIndex {
    Zone(usize),
    Absorbed,
    Escaped,
}

impl ZoneIndex {
    pub fn zone(self) -> Option<usize> {
        match self {
            ZoneIndex::Zone(i) => Some(i),
            _ => None,
        }
    }
}

/// Outcome of propagating a packet within one time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleFate {
    Moving,
    Stopped,
    Escaped,
    Absorbed,
}

/// A Monte Carlo energy packet in the lab frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position (cm).
    pub x: [f64; 3],
    /// Direction cosines, unit norm.
    pub d: [f64; 3],
    /// Lab-frame frequency (Hz), or photon energy in MeV for gamma-rays.
    pub nu: f64,
    /// Lab-frame packet energy (erg).
    pub e: f64,
    /// Absolute time (s).
    pub t: f64,
    pub ind: ZoneIndex,
    pub kind: ParticleType,
    /// Position of the last interaction, for observer-time binning.
    pub x_interact: [f64; 3],
}

impl Particle {
    /// Radius from the grid center.
    pub fn r(&self) -> f64 {
        (self.x[0] * self.x[0] + self.x[1] * self.x[1] + self.x[2] * self.x[2]).sqrt()
    }

    /// Projection of the position on the flight direction.
    pub fn x_dot_d(&self) -> f64 {
        self.x[0] * self.d[0] + self.x[1] * self.d[1] + self.x[2] * self.d[2]
    }

    /// Verify the packet invariants; violations abort the step.
    pub fn check_invariants(&self, n_zones: usize) -> TransportResult<()> {
        let norm2 = self.d[0] * self.d[0] + self.d[1] * self.d[1] + self.d[2] * self.d[2];
        if (norm2 - 1.0).abs() > 1e-6 {
            return Err(TransportError::InvariantViolation(format!(
                "particle direction norm {} deviates from 1",
                norm2.sqrt()
            )));
        }
        if !(self.nu > 0.0) {
            return Err(TransportError::InvariantViolation(format!(
                "particle frequency {} must be positive",
                self.nu
            )));
        }
        if !(self.e > 0.0) || !self.e.is_finite() {
            return Err(TransportError::InvariantViolation(format!(
                "particle energy {} must be positive and finite",
                self.e
            )));
        }
        if let ZoneIndex::Zone(i) = self.ind {
            if i >= n_zones {
                return Err(TransportError::ZoneOutOfBounds {
                    zone: i,
                    n_zones,
                });
            }
        }
        Ok(())
    }
}
