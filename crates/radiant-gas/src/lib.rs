// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Radiant Gas
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Gas microphysics: atomic data model, NLTE level populations,
//! radioactive decay, and the per-zone opacity/emissivity assembler.

pub mod atomic;
pub mod decay;
pub mod gas;
pub mod nlte;
