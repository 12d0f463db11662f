// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Atomic Data
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! In-memory atomic data model.
//!
//! Levels, ionization stages and bound-bound lines for each species.
//! Parsing external data files is a collaborator concern; the structures
//! here are constructed programmatically and trimmed by the `atom_data`
//! config caps before use.

use radiant_math::table::LookupTable;
use radiant_types::constants as pc;

/// One bound level of a species.
#[derive(Debug, Clone)]
pub struct AtomicLevel {
    /// Excitation energy above the ion ground state (eV).
    pub e_ev: f64,
    /// Statistical weight.
    pub g: usize,
    /// Ionization stage this level belongs to.
    pub ion: usize,
    /// Level index of the continuum state reached by ionization, if any.
    pub ic: Option<usize>,
    /// Photoionization cross-section vs photon energy (eV -> cm^2).
    pub photo_cs: LookupTable,
    /// Radiative recombination coefficient vs temperature (K -> cm^3/s).
    /// Empty tables fall back to detailed balance against the
    /// photoionization integral.
    pub a_rec: LookupTable,
}

/// One ionization stage.
#[derive(Debug, Clone)]
pub struct AtomicIon {
    pub stage: usize,
    /// Ionization potential from this stage's ground (eV).
    pub chi_ev: f64,
}

/// A bound-bound line with its Einstein coefficients.
#[derive(Debug, Clone)]
pub struct AtomicLine {
    pub ll: usize,
    pub lu: usize,
    /// Rest frequency (Hz).
    pub nu: f64,
    pub f_lu: f64,
    pub a_ul: f64,
    pub b_ul: f64,
    pub b_lu: f64,
}

impl AtomicLine {
    /// Build a line from its oscillator strength via the Einstein relations.
    pub fn from_oscillator(ll: usize, lu: usize, nu: f64, f_lu: f64, g_l: usize, g_u: usize) -> Self {
        // A_ul = 8 pi sigma_tot nu^2 / c^2 * (g_l / g_u) * f_lu
        let a_ul = 8.0 * pc::PI * pc::SIGMA_LINE_TOT * nu * nu
            / (pc::C_LIGHT * pc::C_LIGHT)
            * (g_l as f64 / g_u as f64)
            * f_lu;
        // B in intensity units: B_ul = A_ul c^2 / (2 h nu^3)
        let b_ul = a_ul * pc::C_LIGHT * pc::C_LIGHT / (2.0 * pc::H_PLANCK * nu * nu * nu);
        let b_lu = b_ul * g_u as f64 / g_l as f64;
        AtomicLine {
            ll,
            lu,
            nu,
            f_lu,
            a_ul,
            b_ul,
            b_lu,
        }
    }
}

/// All data for one species.
#[derive(Debug, Clone)]
pub struct AtomSpecies {
    /// Atomic number.
    pub z: usize,
    pub levels: Vec<AtomicLevel>,
    pub ions: Vec<AtomicIon>,
    pub lines: Vec<AtomicLine>,
}

impl AtomSpecies {
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn n_ions(&self) -> usize {
        self.ions.len()
    }

    pub fn n_lines(&self) -> usize {
        self.lines.len()
    }

    /// Drop ionization stages above `max_ion_stage` and excess levels per
    /// ion beyond `max_n_levels`, along with lines touching dropped levels.
    /// A cap of 0 keeps everything.
    pub fn trim(&mut self, max_ion_stage: usize, max_n_levels: usize) {
        let mut keep = vec![true; self.levels.len()];
        let mut per_ion_count = vec![0usize; self.ions.len()];
        for (i, lev) in self.levels.iter().enumerate() {
            if max_ion_stage > 0 && lev.ion > max_ion_stage {
                keep[i] = false;
                continue;
            }
            per_ion_count[lev.ion] += 1;
            if max_n_levels > 0 && per_ion_count[lev.ion] > max_n_levels {
                keep[i] = false;
            }
        }
        // remap surviving level indices
        let mut remap = vec![usize::MAX; self.levels.len()];
        let mut next = 0usize;
        for (i, &k) in keep.iter().enumerate() {
            if k {
                remap[i] = next;
                next += 1;
            }
        }
        let old_levels = std::mem::take(&mut self.levels);
        for (i, mut lev) in old_levels.into_iter().enumerate() {
            if !keep[i] {
                continue;
            }
            lev.ic = lev.ic.and_then(|c| {
                if keep[c] {
                    Some(remap[c])
                } else {
                    None
                }
            });
            self.levels.push(lev);
        }
        let old_lines = std::mem::take(&mut self.lines);
        for mut line in old_lines {
            if keep[line.ll] && keep[line.lu] {
                line.ll = remap[line.ll];
                line.lu = remap[line.lu];
                self.lines.push(line);
            }
        }
        if max_ion_stage > 0 && self.ions.len() > max_ion_stage + 1 {
            self.ions.truncate(max_ion_stage + 1);
        }
    }

    /// Minimal hydrogen model: H I ground + n=2, H II continuum, and
    /// Lyman-alpha. Reference species for the Saha/Boltzmann and
    /// equilibrium scenarios.
    pub fn hydrogen() -> Self {
        let chi_h = 13.598;
        let nu_lya = 10.199 * pc::EV_TO_ERG / pc::H_PLANCK;

        // hydrogenic ground-state photoionization, sigma ~ nu^-3
        let photo_ground = LookupTable::new(
            vec![chi_h, 2.0 * chi_h, 4.0 * chi_h, 8.0 * chi_h, 16.0 * chi_h],
            vec![
                6.30e-18,
                6.30e-18 / 8.0,
                6.30e-18 / 64.0,
                6.30e-18 / 512.0,
                6.30e-18 / 4096.0,
            ],
        );
        let chi_n2 = chi_h - 10.199;
        let photo_n2 = LookupTable::new(
            vec![chi_n2, 2.0 * chi_n2, 4.0 * chi_n2, 8.0 * chi_n2],
            vec![
                1.40e-17,
                1.40e-17 / 8.0,
                1.40e-17 / 64.0,
                1.40e-17 / 512.0,
            ],
        );

        let levels = vec![
            AtomicLevel {
                e_ev: 0.0,
                g: 2,
                ion: 0,
                ic: Some(2),
                photo_cs: photo_ground,
                a_rec: LookupTable::default(),
            },
            AtomicLevel {
                e_ev: 10.199,
                g: 8,
                ion: 0,
                ic: Some(2),
                photo_cs: photo_n2,
                a_rec: LookupTable::default(),
            },
            AtomicLevel {
                e_ev: 0.0,
                g: 1,
                ion: 1,
                ic: None,
                photo_cs: LookupTable::default(),
                a_rec: LookupTable::default(),
            },
        ];
        let ions = vec![
            AtomicIon {
                stage: 0,
                chi_ev: chi_h,
            },
            AtomicIon {
                stage: 1,
                chi_ev: 0.0,
            },
        ];
        let lines = vec![AtomicLine::from_oscillator(0, 1, nu_lya, 0.4164, 2, 8)];

        AtomSpecies {
            z: 1,
            levels,
            ions,
            lines,
        }
    }
}

/// The full atomic data set, one species slot per element in the model.
#[derive(Debug, Clone, Default)]
pub struct AtomicData {
    pub species: Vec<AtomSpecies>,
}

impl AtomicData {
    pub fn new(species: Vec<AtomSpecies>) -> Self {
        AtomicData { species }
    }

    pub fn for_element(&self, z: usize) -> Option<&AtomSpecies> {
        self.species.iter().find(|s| s.z == z)
    }

    pub fn trim(&mut self, max_ion_stage: usize, max_n_levels: usize) {
        for s in &mut self.species {
            s.trim(max_ion_stage, max_n_levels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hydrogen_model_shape() {
        let h = AtomSpecies::hydrogen();
        assert_eq!(h.n_levels(), 3);
        assert_eq!(h.n_ions(), 2);
        assert_eq!(h.n_lines(), 1);
        assert_eq!(h.levels[0].ic, Some(2));
        assert!(h.lines[0].a_ul > 0.0);
    }

    #[test]
    fn test_einstein_relations() {
        let h = AtomSpecies::hydrogen();
        let line = &h.lines[0];
        // B_lu g_l = B_ul g_u
        let lhs = line.b_lu * h.levels[line.ll].g as f64;
        let rhs = line.b_ul * h.levels[line.lu].g as f64;
        assert!(((lhs - rhs) / rhs).abs() < 1e-12);
        // A/B = 2 h nu^3 / c^2
        let ratio = line.a_ul / line.b_ul;
        let expected = 2.0 * pc::H_PLANCK * line.nu.powi(3) / (pc::C_LIGHT * pc::C_LIGHT);
        assert!(((ratio - expected) / expected).abs() < 1e-12);
    }

    #[test]
    fn test_trim_levels_and_lines() {
        let mut h = AtomSpecies::hydrogen();
        h.trim(0, 1);
        // one level per ion survives and the continuum index is remapped
        assert_eq!(h.n_levels(), 2);
        assert_eq!(h.levels[0].ic, Some(1));
        assert_eq!(h.n_lines(), 0);
        assert_eq!(h.n_ions(), 2);
    }

    #[test]
    fn test_trim_ion_stage_cap() {
        let mut h = AtomSpecies::hydrogen();
        h.trim(1, 0);
        assert_eq!(h.n_levels(), 3);
        assert_eq!(h.n_lines(), 1);
        // a tighter model with no continuum stage would drop the line
        let mut he_like = AtomSpecies::hydrogen();
        for lev in &mut he_like.levels {
            if lev.ion == 1 {
                lev.ion = 2;
            }
        }
        he_like.trim(1, 0);
        assert_eq!(he_like.n_levels(), 2);
        assert_eq!(he_like.levels[0].ic, None);
    }

    #[test]
    fn test_trim_zero_caps_keep_everything() {
        let mut h = AtomSpecies::hydrogen();
        h.trim(0, 0);
        assert_eq!(h.n_levels(), 3);
        assert_eq!(h.n_lines(), 1);
    }
}
