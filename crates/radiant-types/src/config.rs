// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Runtime configuration for the transport core.
//!
//! One JSON document maps onto the nested sections below. All keys carry
//! defaults so partial configs load; `validate()` rejects contradictory
//! toggle combinations before the engine is built.

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Which diffusion acceleration runs in optically thick zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiffusionMethod {
    #[default]
    Off,
    Ddmc,
    RandomWalk,
}

/// Frequency grid specification: [start, stop, step] in Hz, with
/// logarithmic spacing when `log` is set (step is then d(ln nu)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyGridSpec {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    #[serde(default)]
    pub log: bool,
}

impl Default for FrequencyGridSpec {
    fn default() -> Self {
        FrequencyGridSpec {
            start: 1e14,
            stop: 1e16,
            step: 1e14,
            log: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Number of steady-state iterations; 0 means time-dependent evolution.
    pub steady_iterate: u32,
    pub radiative_equilibrium: bool,
    pub fleck_alpha: f64,
    pub solve_tgas_with_updated_opacities: bool,
    pub fix_tgas_during_transport: bool,
    pub set_tgas_to_trad: bool,
    pub fix_rng_seed: bool,
    pub rng_seed: u64,
    pub use_ddmc: DiffusionMethod,
    pub ddmc_tau_threshold: f64,
    pub nu_grid: FrequencyGridSpec,
    pub boundary_in_reflect: bool,
    pub boundary_out_reflect: bool,
    pub store_jnu: bool,
}

impl Default for TransportSection {
    fn default() -> Self {
        TransportSection {
            steady_iterate: 0,
            radiative_equilibrium: false,
            fleck_alpha: 1.0,
            solve_tgas_with_updated_opacities: false,
            fix_tgas_during_transport: false,
            set_tgas_to_trad: false,
            fix_rng_seed: false,
            rng_seed: 0,
            use_ddmc: DiffusionMethod::Off,
            ddmc_tau_threshold: 10.0,
            nu_grid: FrequencyGridSpec::default(),
            boundary_in_reflect: false,
            boundary_out_reflect: false,
            store_jnu: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSection {
    pub max_total: usize,
    pub n_initialize: usize,
    pub n_emit_thermal: usize,
    pub n_emit_radioactive: usize,
    pub n_emit_pointsources: usize,
    /// Multiplier on emission counts applied on the flagged last iteration.
    pub last_iter_pump: usize,
    /// Monochromatic initialization frequency; 0 selects blackbody shape.
    pub init_photon_frequency: f64,
    pub pointsource_file: Option<String>,
    pub multiply_n_emit_by_dt_over_dtmax: bool,
}

impl Default for ParticleSection {
    fn default() -> Self {
        ParticleSection {
            max_total: 1_000_000,
            n_initialize: 0,
            n_emit_thermal: 0,
            n_emit_radioactive: 0,
            n_emit_pointsources: 0,
            last_iter_pump: 0,
            init_photon_frequency: 0.0,
            pointsource_file: None,
            multiply_n_emit_by_dt_over_dtmax: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSection {
    pub n_emit: usize,
    /// Photosphere radius (cm); 0 emits from a point.
    pub radius: f64,
    /// Blackbody temperature (K); derived from L and R when 0.
    pub temperature: f64,
    /// Fixed emission line frequency (Hz); 0 samples the core spectrum.
    pub photon_frequency: f64,
    pub luminosity: f64,
    /// E-folding timescale (s) for the luminosity; 0 keeps it constant.
    pub timescale: f64,
    pub fix_luminosity: bool,
    pub spectrum_file: Option<String>,
}

impl Default for CoreSection {
    fn default() -> Self {
        CoreSection {
            n_emit: 0,
            radius: 0.0,
            temperature: 0.0,
            photon_frequency: 0.0,
            luminosity: 0.0,
            timescale: 0.0,
            fix_luminosity: false,
            spectrum_file: None,
        }
    }
}

impl CoreSection {
    /// Core luminosity at absolute time `t`.
    pub fn luminosity_at(&self, t: f64) -> f64 {
        if self.timescale > 0.0 {
            self.luminosity * (-t / self.timescale).exp()
        } else {
            self.luminosity
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpacitySection {
    pub electron_scattering: bool,
    pub line_expansion: bool,
    pub fuzz_expansion: bool,
    pub bound_free: bool,
    pub bound_bound: bool,
    pub free_free: bool,
    /// Bulk grey opacity (cm^2/g); 0 disables the grey override.
    pub grey_opacity: f64,
    pub zone_specific_grey_opacity: bool,
    /// Absorption fraction assigned to line interactions.
    pub epsilon: f64,
    pub minimum_extinction: f64,
    /// Cap on extinction as `maximum_opacity * rho`; 0 disables the cap.
    pub maximum_opacity: f64,
    pub use_nlte: bool,
    pub atoms_in_nlte: Vec<usize>,
    pub use_collisions_nlte: bool,
    pub no_ground_recomb: bool,
    pub compton_scatter_photons: bool,
    pub no_scattering: bool,
    pub line_velocity_width: f64,
}

impl Default for OpacitySection {
    fn default() -> Self {
        OpacitySection {
            electron_scattering: true,
            line_expansion: false,
            fuzz_expansion: false,
            bound_free: false,
            bound_bound: false,
            free_free: false,
            grey_opacity: 0.0,
            zone_specific_grey_opacity: false,
            epsilon: 1.0,
            minimum_extinction: 0.0,
            maximum_opacity: 0.0,
            use_nlte: false,
            atoms_in_nlte: Vec::new(),
            use_collisions_nlte: false,
            no_ground_recomb: false,
            compton_scatter_photons: false,
            no_scattering: false,
            line_velocity_width: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSection {
    pub temp_min: f64,
    pub temp_max: f64,
}

impl Default for LimitSection {
    fn default() -> Self {
        LimitSection {
            temp_min: 1.0e3,
            temp_max: 1.0e8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumSection {
    /// Observer time grid: [start, stop, step] in seconds.
    pub time_grid: [f64; 3],
    pub nu_grid: FrequencyGridSpec,
    pub gamma_nu_grid: FrequencyGridSpec,
    pub n_mu: usize,
    pub n_phi: usize,
    /// Cap on escaped packets retained for the particle-list output;
    /// 0 disables retention.
    pub particle_list_maxn: usize,
}

impl Default for SpectrumSection {
    fn default() -> Self {
        SpectrumSection {
            time_grid: [0.0, 1.0, 1.0],
            nu_grid: FrequencyGridSpec::default(),
            gamma_nu_grid: FrequencyGridSpec::default(),
            n_mu: 1,
            n_phi: 1,
            particle_list_maxn: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStepSection {
    pub max_dt: f64,
}

impl Default for TimeStepSection {
    fn default() -> Self {
        TimeStepSection { max_dt: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AtomDataSection {
    /// Highest ionization stage kept; 0 keeps everything.
    pub max_ion_stage: usize,
    /// Level count cap per ion; 0 keeps everything.
    pub max_n_levels: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RadioactiveSection {
    pub force_rprocess_heating: bool,
    pub dont_decay_composition: bool,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TransportConfig {
    pub transport: TransportSection,
    pub particles: ParticleSection,
    pub core: CoreSection,
    pub opacity: OpacitySection,
    pub limits: LimitSection,
    pub spectrum: SpectrumSection,
    pub tstep: TimeStepSection,
    pub atom_data: AtomDataSection,
    pub radioactive: RadioactiveSection,
}

impl TransportConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> TransportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject contradictory toggle combinations and malformed grids.
    pub fn validate(&self) -> TransportResult<()> {
        let t = &self.transport;
        if t.radiative_equilibrium && t.set_tgas_to_trad {
            return Err(TransportError::ConfigError(
                "radiative_equilibrium cannot be combined with set_tgas_to_trad".to_string(),
            ));
        }
        if t.solve_tgas_with_updated_opacities && t.fix_tgas_during_transport {
            return Err(TransportError::ConfigError(
                "solve_tgas_with_updated_opacities cannot be combined with fix_tgas_during_transport"
                    .to_string(),
            ));
        }
        if t.fix_tgas_during_transport && t.set_tgas_to_trad {
            return Err(TransportError::ConfigError(
                "fix_tgas_during_transport cannot be combined with set_tgas_to_trad".to_string(),
            ));
        }
        validate_grid_spec(&t.nu_grid, "transport.nu_grid")?;
        validate_grid_spec(&self.spectrum.nu_grid, "spectrum.nu_grid")?;
        validate_grid_spec(&self.spectrum.gamma_nu_grid, "spectrum.gamma_nu_grid")?;
        let [t0, t1, dt] = self.spectrum.time_grid;
        if !(t1 > t0) || !(dt > 0.0) {
            return Err(TransportError::ConfigError(format!(
                "spectrum.time_grid must satisfy stop > start and step > 0, got [{t0}, {t1}, {dt}]"
            )));
        }
        if self.limits.temp_max <= self.limits.temp_min {
            return Err(TransportError::ConfigError(format!(
                "limits.temp_max must exceed limits.temp_min, got [{}, {}]",
                self.limits.temp_min, self.limits.temp_max
            )));
        }
        if !(self.opacity.epsilon >= 0.0 && self.opacity.epsilon <= 1.0) {
            return Err(TransportError::ConfigError(format!(
                "opacity.epsilon must lie in [0, 1], got {}",
                self.opacity.epsilon
            )));
        }
        Ok(())
    }

    pub fn steady_state(&self) -> bool {
        self.transport.steady_iterate > 0
    }
}

fn validate_grid_spec(spec: &FrequencyGridSpec, label: &str) -> TransportResult<()> {
    if !(spec.start > 0.0) || !(spec.stop > spec.start) || !(spec.step > 0.0) {
        return Err(TransportError::ConfigError(format!(
            "{label} must satisfy 0 < start < stop and step > 0, got [{}, {}, {}]",
            spec.start, spec.stop, spec.step
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let cfg = TransportConfig::default();
        cfg.validate().expect("defaults must be consistent");
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = TransportConfig::default();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2: TransportConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.particles.max_total, cfg2.particles.max_total);
        assert_eq!(cfg.transport.use_ddmc, cfg2.transport.use_ddmc);
    }

    #[test]
    fn test_partial_config_loads_with_defaults() {
        let json = r#"{ "transport": { "radiative_equilibrium": true } }"#;
        let cfg: TransportConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.transport.radiative_equilibrium);
        assert_eq!(cfg.transport.fleck_alpha, 1.0);
        assert_eq!(cfg.particles.max_total, 1_000_000);
    }

    #[test]
    fn test_contradictory_temperature_toggles_rejected() {
        let mut cfg = TransportConfig::default();
        cfg.transport.radiative_equilibrium = true;
        cfg.transport.set_tgas_to_trad = true;
        assert!(cfg.validate().is_err());

        let mut cfg = TransportConfig::default();
        cfg.transport.solve_tgas_with_updated_opacities = true;
        cfg.transport.fix_tgas_during_transport = true;
        assert!(cfg.validate().is_err());

        let mut cfg = TransportConfig::default();
        cfg.transport.fix_tgas_during_transport = true;
        cfg.transport.set_tgas_to_trad = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_malformed_nu_grid_rejected() {
        let mut cfg = TransportConfig::default();
        cfg.transport.nu_grid.stop = cfg.transport.nu_grid.start;
        let err = cfg.validate().unwrap_err();
        match err {
            TransportError::ConfigError(msg) => assert!(msg.contains("nu_grid")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_core_luminosity_decay_law() {
        let mut core = CoreSection {
            luminosity: 2.0e43,
            ..CoreSection::default()
        };
        assert_eq!(core.luminosity_at(0.0), 2.0e43);
        assert_eq!(core.luminosity_at(1.0e6), 2.0e43);
        core.timescale = 1.0e6;
        let l = core.luminosity_at(1.0e6);
        assert!((l - 2.0e43 * (-1.0f64).exp()).abs() / l < 1e-12);
    }
}
