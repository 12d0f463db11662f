// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — RNG
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-rank random stream.
//!
//! One independent stream per rank; deterministic when the seed is
//! fixed, entropy-seeded otherwise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct TransportRng {
    rng: StdRng,
}

impl TransportRng {
    pub fn new(fix_seed: bool, seed: u64, rank: usize) -> Self {
        let rng = if fix_seed {
            // decorrelate ranks with a splitmix-style scramble
            let s = seed
                .wrapping_add(rank as u64)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            StdRng::seed_from_u64(s)
        } else {
            StdRng::from_entropy()
        };
        TransportRng { rng }
    }

    /// Standard uniform in [0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform in (0, 1], safe as a logarithm argument.
    pub fn open_uniform(&mut self) -> f64 {
        1.0 - self.rng.gen::<f64>()
    }

    pub fn uniform3(&mut self) -> [f64; 3] {
        [self.uniform(), self.uniform(), self.uniform()]
    }

    pub fn inner(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
