// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Transport Context
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The transport context: particle buffer, per-zone opacity tables,
//! spectra and the time-step driver. Owned by the run driver and passed
//! into every operation; there are no process-wide singletons.

use std::sync::Arc;

use ndarray::Array2;
use radiant_gas::atomic::AtomicData;
use radiant_gas::gas::{GasState, SolveReport};
use radiant_math::cdf::CdfArray;
use radiant_math::freq::FrequencyGrid;
use radiant_types::config::{DiffusionMethod, TransportConfig};
use radiant_types::constants as pc;
use radiant_types::error::TransportResult;
use radiant_types::state::Zone;

use crate::ddmc::DdmcState;
use crate::emission::PointSource;
use crate::grid::TransportGrid;
use crate::particle::{Particle, ParticleFate};
use crate::rank::RankLayout;
use crate::rng::TransportRng;
use crate::spectrum::SpectrumArray;

/// Warning counters and bookkeeping from one transport step. Numerical
/// warnings are absorbed here; only invariant violations abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepDiagnostics {
    pub n_active: usize,
    pub n_escaped: usize,
    pub n_absorbed: usize,
    pub escaped_fraction: f64,
    pub gas_report: SolveReport,
    pub temp_root_errors: usize,
    pub temp_iter_errors: usize,
    pub nonpositive_distance: usize,
    /// Emission calls declined because the particle buffer was full.
    pub emission_declined: usize,
}

/// The coupled Monte Carlo radiation transport engine.
pub struct Transport<G: TransportGrid> {
    pub grid: G,
    pub config: TransportConfig,
    pub zones: Vec<Zone>,
    pub t_now: f64,

    pub(crate) nu_grid: Arc<FrequencyGrid>,
    pub(crate) rng: TransportRng,
    pub(crate) layout: RankLayout,
    pub(crate) gas_proto: GasState,

    pub(crate) particles: Vec<Particle>,
    pub(crate) particles_escaped: Vec<Particle>,

    pub(crate) abs_opacity: Array2<f64>,
    pub(crate) scat_opacity: Array2<f64>,
    pub(crate) emissivity: Vec<CdfArray>,
    pub(crate) emissivity_weight: Vec<f64>,
    pub(crate) planck_mean: Vec<f64>,
    pub(crate) rosseland_mean: Vec<f64>,
    pub(crate) compton_opac: Vec<f64>,
    pub(crate) photoion_opac: Vec<f64>,
    pub(crate) j_nu: Array2<f64>,

    pub(crate) zone_emission_cdf: CdfArray,
    pub(crate) core_emission_spectrum: CdfArray,
    pub(crate) l_core: f64,
    pub(crate) t_core: f64,

    pub(crate) point_sources: Vec<PointSource>,
    pub(crate) pointsource_cdf: CdfArray,
    pub(crate) pointsource_spectrum: CdfArray,
    pub(crate) pointsources_l_tot: f64,

    pub(crate) mb_cdf: CdfArray,
    pub(crate) mb_dv: f64,

    pub(crate) ddmc: Option<DdmcState>,

    pub optical_spectrum: SpectrumArray,
    pub gamma_spectrum: SpectrumArray,

    pub(crate) first_step: bool,
    pub(crate) last_iteration: bool,
}

impl<G: TransportGrid> Transport<G> {
    /// Build the engine: frequency grid, rank layout, opacity tables,
    /// emission setup and initial particles.
    pub fn new(
        config: TransportConfig,
        grid: G,
        mut atomic: AtomicData,
        zones: Vec<Zone>,
        rank: usize,
        nranks: usize,
    ) -> TransportResult<Self> {
        config.validate()?;
        let n_zones = grid.n_zones();
        assert_eq!(zones.len(), n_zones, "zone array does not match the grid");

        let spec = &config.transport.nu_grid;
        let nu_grid = Arc::new(if spec.log {
            FrequencyGrid::logarithmic(spec.start, spec.stop, spec.step)
        } else {
            FrequencyGrid::linear(spec.start, spec.stop, spec.step)
        });
        let ng = nu_grid.len();

        atomic.trim(config.atom_data.max_ion_stage, config.atom_data.max_n_levels);
        let gas_proto = GasState::new(
            Arc::new(atomic),
            grid.elems_z().to_vec(),
            grid.elems_a().to_vec(),
            Arc::clone(&nu_grid),
            config.opacity.clone(),
        );

        let rng = TransportRng::new(
            config.transport.fix_rng_seed,
            config.transport.rng_seed,
            rank,
        );
        let layout = RankLayout::new(rank, nranks, n_zones);

        // uniform emissivity weights, normalized to unit mean
        let emissivity_weight = vec![1.0; ng];

        let optical_spectrum = SpectrumArray::new(&config.spectrum, &config.spectrum.nu_grid);
        let gamma_spectrum = SpectrumArray::new(&config.spectrum, &config.spectrum.gamma_nu_grid);

        let ddmc = match config.transport.use_ddmc {
            DiffusionMethod::Off => None,
            method => Some(DdmcState::new(n_zones, method)),
        };

        let t_now = grid.t_now();

        let mut engine = Transport {
            grid,
            config,
            zones,
            t_now,
            nu_grid,
            rng,
            layout,
            gas_proto,
            particles: Vec::new(),
            particles_escaped: Vec::new(),
            abs_opacity: Array2::zeros((n_zones, ng)),
            scat_opacity: Array2::zeros((n_zones, ng)),
            emissivity: (0..n_zones).map(|_| CdfArray::new(ng)).collect(),
            emissivity_weight,
            planck_mean: vec![0.0; n_zones],
            rosseland_mean: vec![0.0; n_zones],
            compton_opac: vec![0.0; n_zones],
            photoion_opac: vec![0.0; n_zones],
            j_nu: Array2::zeros((n_zones, ng)),
            zone_emission_cdf: CdfArray::new(n_zones),
            core_emission_spectrum: CdfArray::new(ng),
            l_core: 0.0,
            t_core: 0.0,
            point_sources: Vec::new(),
            pointsource_cdf: CdfArray::default(),
            pointsource_spectrum: CdfArray::default(),
            pointsources_l_tot: 0.0,
            mb_cdf: CdfArray::default(),
            mb_dv: 0.0,
            ddmc,
            optical_spectrum,
            gamma_spectrum,
            first_step: true,
            last_iteration: false,
        };

        engine.setup_core_emission()?;
        engine.setup_pointsource_emission()?;
        if engine.config.opacity.compton_scatter_photons {
            engine.setup_mb_cdf(0.0, 5.0, 512);
        }
        let n_init = engine.config.particles.n_initialize;
        if n_init > 0 {
            engine.initialize_particles(n_init);
        }
        Ok(engine)
    }

    pub fn n_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn n_particles_escaped(&self) -> usize {
        self.particles_escaped.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_escaped(&self) -> &[Particle] {
        &self.particles_escaped
    }

    /// Push a packet onto the buffer directly, for driver-injected
    /// initial conditions.
    pub fn inject_particle(&mut self, p: Particle) {
        self.particles.push(p);
    }

    pub fn set_last_iteration_flag(&mut self) {
        self.last_iteration = true;
    }

    pub fn wipe_spectra(&mut self) {
        self.optical_spectrum.wipe();
        self.gamma_spectrum.wipe();
    }

    pub fn clear_escaped_particles(&mut self) {
        self.particles_escaped.clear();
    }

    /// Run one transport time step.
    pub fn step(&mut self, dt: f64) -> TransportResult<StepDiagnostics> {
        // nominal time for the steady-state iteration
        let dt = if self.config.steady_state() { 1.0 } else { dt };
        let mut diag = StepDiagnostics::default();

        self.set_opacity(dt, &mut diag)?;
        if self.ddmc.is_some() {
            self.compute_diffusion_probabilities(dt);
        }
        self.wipe_radiation();
        self.emit_particles(dt, &mut diag);

        // propagate every active packet; escaped and absorbed packets
        // are compacted out of the buffer
        let tstop = self.t_now + dt;
        let mut active = std::mem::take(&mut self.particles);
        diag.n_active = active.len();
        let mut retained = Vec::with_capacity(active.len());
        for mut p in active.drain(..) {
            let fate = self.propagate(&mut p, tstop, &mut diag)?;
            match fate {
                ParticleFate::Escaped => diag.n_escaped += 1,
                ParticleFate::Absorbed => diag.n_absorbed += 1,
                _ => retained.push(p),
            }
        }
        self.particles = retained;

        if diag.n_active > 0 {
            diag.escaped_fraction = diag.n_escaped as f64 / diag.n_active as f64;
        }
        if self.config.steady_state() && diag.escaped_fraction > 0.0 {
            self.optical_spectrum
                .rescale(1.0 / diag.escaped_fraction);
        }

        self.reduce_radiation(dt);

        if self.config.transport.radiative_equilibrium {
            self.solve_eq_temperature(&mut diag)?;
        } else if self.config.transport.set_tgas_to_trad {
            self.set_tgas_to_trad();
        }

        if !self.config.steady_state() {
            self.t_now += dt;
        }
        self.first_step = false;
        Ok(diag)
    }

    /// Zero all per-zone radiation tallies.
    pub fn wipe_radiation(&mut self) {
        for z in &mut self.zones {
            z.wipe_radiation();
        }
        self.j_nu.fill(0.0);
    }

    /// Normalize tallies into densities and rates and combine them
    /// across ranks.
    pub fn reduce_radiation(&mut self, dt: f64) {
        for i in 0..self.zones.len() {
            let vol = self.grid.zone_volume(i);
            let z = &mut self.zones[i];
            z.e_rad /= vol * dt * pc::C_LIGHT;
            z.e_abs /= vol * dt;
            // deposited decay energy becomes a rate for the next
            // gas-state pass
            z.l_radio_dep /= dt;
            for j in 0..self.nu_grid.len() {
                self.j_nu[[i, j]] /= vol * dt * self.nu_grid.delta(j) * 4.0 * pc::PI;
            }
        }

        let mut buf: Vec<f64> = self.zones.iter().map(|z| z.e_rad).collect();
        self.layout.allreduce_sum(&mut buf);
        for (z, v) in self.zones.iter_mut().zip(buf.iter()) {
            z.e_rad = *v;
        }
        let mut buf: Vec<f64> = self.zones.iter().map(|z| z.e_abs).collect();
        self.layout.allreduce_sum(&mut buf);
        for (z, v) in self.zones.iter_mut().zip(buf.iter()) {
            z.e_abs = *v;
        }
        let mut buf: Vec<f64> = self.zones.iter().map(|z| z.l_radio_dep).collect();
        self.layout.allreduce_sum(&mut buf);
        for (z, v) in self.zones.iter_mut().zip(buf.iter()) {
            z.l_radio_dep = *v;
        }
        if let Some(row) = self.j_nu.as_slice_mut() {
            self.layout.allreduce_sum(row);
        }
    }

    /// Force the gas temperature onto the radiation temperature.
    fn set_tgas_to_trad(&mut self) {
        if self.config.transport.fix_tgas_during_transport {
            return;
        }
        let lim = &self.config.limits;
        for z in &mut self.zones {
            let t_rad = (z.e_rad / pc::RAD_CONST).max(0.0).powf(0.25);
            z.t_gas = t_rad.clamp(lim.temp_min, lim.temp_max);
        }
    }
}
