// ─────────────────────────────────────────────────────────────────────
// SCPN Radiant Core — Brent
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Brent root finder.
//!
//! Mixes inverse-quadratic/secant steps with bisection fallbacks.
//! The residual is any `FnMut(f64) -> f64`; callers needing extra
//! parameters capture them in the closure.

use radiant_types::error::{TransportError, TransportResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrentResult {
    pub root: f64,
    pub iterations: usize,
}

/// Find the root of `f` on `[a, b]`, assuming `f(a) * f(b) < 0`.
///
/// Terminates when `f` hits zero or the bracket width drops below
/// `eps * min(|a|, |b|)`. A non-bracketing interval or exhausting
/// `max_iter` returns `SolverDiverged`; callers count those as
/// numerical warnings rather than aborting the step.
pub fn brent_solve<F>(
    mut f: F,
    aa: f64,
    bb: f64,
    eps: f64,
    max_iter: usize,
) -> TransportResult<BrentResult>
where
    F: FnMut(f64) -> f64,
{
    let mut a = aa;
    let mut b = bb;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa * fb >= 0.0 {
        return Err(TransportError::SolverDiverged {
            iteration: 0,
            message: format!("root not bracketed on [{aa}, {bb}]"),
        });
    }
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut iterations = 0usize;

    loop {
        // inverse quadratic interpolation when the three residuals are
        // distinct, secant otherwise
        let mut s = if fa != fc && fb != fc {
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fc * fa / ((fb - fc) * (fb - fa))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            b - fb * (b - a) / (fb - fa)
        };

        // bisection fallback when the candidate leaves the bracket
        if (s - a) * (s - b) >= 0.0 {
            s = 0.5 * (a + b);
        }

        let fs = f(s);
        c = b;
        fc = fb;

        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }

        iterations += 1;
        if fb == 0.0 || fs == 0.0 || (b - a).abs() < eps * a.abs().min(b.abs()) {
            return Ok(BrentResult {
                root: b,
                iterations,
            });
        }
        if iterations >= max_iter {
            return Err(TransportError::SolverDiverged {
                iteration: iterations,
                message: format!("bracket [{a}, {b}] not converged"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_cubic_root() {
        let r = brent_solve(|x| x * x * x - 2.0, 0.0, 2.0, 1e-12, 200).unwrap();
        assert!((r.root - 2.0f64.cbrt()).abs() < 1e-10);
    }

    #[test]
    fn test_finds_transcendental_root() {
        let r = brent_solve(|x| x.exp() - 3.0, 0.5, 2.0, 1e-12, 200).unwrap();
        assert!((r.root - 3.0f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_unbracketed_interval_is_reported() {
        let err = brent_solve(|x| x * x + 1.0, -1.0, 1.0, 1e-10, 100).unwrap_err();
        match err {
            TransportError::SolverDiverged { iteration, message } => {
                assert_eq!(iteration, 0);
                assert!(message.contains("not bracketed"));
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_residual_small_at_root() {
        let f = |t: f64| t.powi(4) - 7.3e13;
        let r = brent_solve(f, 1.0, 1.0e5, 1e-12, 200).unwrap();
        assert!(f(r.root).abs() / 7.3e13 < 1e-10);
    }

    #[test]
    fn test_max_iterations_reported() {
        let err = brent_solve(|x| x * x - 2.0, 0.0, 2.0, 1e-300, 3).unwrap_err();
        match err {
            TransportError::SolverDiverged { iteration, .. } => assert_eq!(iteration, 3),
            other => panic!("Unexpected error: {other:?}"),
        }
    }
}
