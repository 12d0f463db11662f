// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Transport Step Benchmarks
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use radiant_core::grid::SphericalShellGrid;
use radiant_core::particle::{Particle, ParticleType, ZoneIndex};
use radiant_core::transport::Transport;
use radiant_gas::atomic::AtomicData;
use radiant_types::config::{FrequencyGridSpec, TransportConfig};
use radiant_types::state::Zone;

/// Ten grey scattering shells with a deterministic seed, loaded with
/// radially injected packets.
fn scattering_engine(n_particles: usize) -> Transport<SphericalShellGrid> {
    let mut cfg = TransportConfig::default();
    cfg.transport.fix_rng_seed = true;
    cfg.transport.rng_seed = 5;
    cfg.transport.nu_grid = FrequencyGridSpec {
        start: 1.0e14,
        stop: 2.0e15,
        step: 1.0e14,
        log: false,
    };
    cfg.spectrum.time_grid = [0.0, 100.0, 10.0];
    cfg.spectrum.nu_grid = cfg.transport.nu_grid.clone();
    cfg.spectrum.gamma_nu_grid = FrequencyGridSpec {
        start: 0.1,
        stop: 5.0,
        step: 0.1,
        log: false,
    };
    cfg.opacity.epsilon = 0.3;

    let n_zones = 10;
    let r_out: Vec<f64> = (1..=n_zones).map(|i| 1.0e9 * i as f64).collect();
    let grid = SphericalShellGrid::new(0.0, r_out, vec![1], vec![1], 0.0);

    let zones: Vec<Zone> = (0..n_zones)
        .map(|_| {
            let mut z = Zone::new(1);
            z.rho = 1.0;
            z.total_grey_opacity = 2.0e-10;
            z
        })
        .collect();

    let mut eng = Transport::new(cfg, grid, AtomicData::default(), zones, 0, 1).unwrap();
    for k in 0..n_particles {
        let mu = 1.0 - 2.0 * ((k as f64 + 0.5) / n_particles as f64);
        let smu = (1.0 - mu * mu).sqrt();
        eng.inject_particle(Particle {
            x: [0.0; 3],
            d: [smu, 0.0, mu],
            nu: 1.0e15,
            e: 1.0,
            t: 0.0,
            ind: ZoneIndex::Zone(0),
            kind: ParticleType::Photon,
            x_interact: [0.0; 3],
        });
    }
    eng
}

fn bench_transport_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport_step");
    group.sample_size(10);

    group.bench_function("grey_scatter_10k_packets", |b| {
        b.iter_batched(
            || scattering_engine(10_000),
            |mut eng| {
                let diag = eng.step(10.0).expect("transport step should succeed");
                black_box(diag.n_escaped);
            },
            criterion::BatchSize::LargeInput,
        )
    });

    group.bench_function("opacity_pass_only", |b| {
        b.iter_batched(
            || scattering_engine(0),
            |mut eng| {
                let mut diag = radiant_core::transport::StepDiagnostics::default();
                eng.set_opacity(10.0, &mut diag)
                    .expect("opacity pass should succeed");
                black_box(diag.gas_report.root_errors);
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_transport_step);
criterion_main!(benches);
