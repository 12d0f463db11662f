//! Dense LU decomposition with partial pivoting.
//!
//! Sized for the NLTE rate matrices (tens to low hundreds of levels),
//! where a direct factorization beats anything iterative.

use ndarray::{Array1, Array2};
use radiant_types::error::{TransportError, TransportResult};

/// In-place LU factorization of `a` with partial pivoting.
///
/// On return `a` holds L (unit diagonal, below) and U (on and above),
/// and the returned permutation maps factored rows to original rows.
pub fn lu_decompose(a: &mut Array2<f64>, pivot_floor: f64) -> TransportResult<Vec<usize>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(TransportError::LinAlg(format!(
            "LU needs a square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        // pivot search on column k
        let mut p = k;
        let mut pmax = a[[k, k]].abs();
        for i in (k + 1)..n {
            let v = a[[i, k]].abs();
            if v > pmax {
                pmax = v;
                p = i;
            }
        }
        if pmax <= pivot_floor {
            return Err(TransportError::LinAlg(format!(
                "singular matrix: pivot {pmax:e} at column {k}"
            )));
        }
        if p != k {
            perm.swap(p, k);
            for j in 0..n {
                let tmp = a[[p, j]];
                a[[p, j]] = a[[k, j]];
                a[[k, j]] = tmp;
            }
        }
        let pivot = a[[k, k]];
        for i in (k + 1)..n {
            let m = a[[i, k]] / pivot;
            a[[i, k]] = m;
            for j in (k + 1)..n {
                a[[i, j]] -= m * a[[k, j]];
            }
        }
    }
    Ok(perm)
}

/// Forward/back substitution against a factored matrix.
pub fn lu_substitute(a: &Array2<f64>, perm: &[usize], b: &Array1<f64>) -> Array1<f64> {
    let n = a.nrows();
    let mut x = Array1::zeros(n);
    // Ly = Pb
    for i in 0..n {
        let mut s = b[perm[i]];
        for j in 0..i {
            s -= a[[i, j]] * x[j];
        }
        x[i] = s;
    }
    // Ux = y
    for i in (0..n).rev() {
        let mut s = x[i];
        for j in (i + 1)..n {
            s -= a[[i, j]] * x[j];
        }
        x[i] = s / a[[i, i]];
    }
    x
}

/// Solve `A x = b`, consuming the matrix.
pub fn lu_solve(mut a: Array2<f64>, b: &Array1<f64>) -> TransportResult<Array1<f64>> {
    let perm = lu_decompose(&mut a, 0.0)?;
    Ok(lu_substitute(&a, &perm, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn residual(a: &Array2<f64>, x: &Array1<f64>, b: &Array1<f64>) -> f64 {
        let ax = a.dot(x);
        ax.iter()
            .zip(b.iter())
            .map(|(u, v)| (u - v).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_solve_small_system() {
        let a = array![[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let b = array![1.0, 2.0, 3.0];
        let x = lu_solve(a.clone(), &b).unwrap();
        assert!(residual(&a, &x, &b) < 1e-12);
    }

    #[test]
    fn test_pivoting_handles_zero_leading_entry() {
        let a = array![[0.0, 2.0], [3.0, 1.0]];
        let b = array![4.0, 5.0];
        let x = lu_solve(a.clone(), &b).unwrap();
        assert!(residual(&a, &x, &b) < 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        let err = lu_solve(a, &b).unwrap_err();
        match err {
            TransportError::LinAlg(msg) => assert!(msg.contains("singular")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rate_matrix_shape_with_conservation_row() {
        // a rank-deficient rate matrix fixed by a number-conservation row
        let mut a = array![
            [-2.0, 1.0, 0.5],
            [2.0, -1.5, 0.5],
            [0.0, 0.5, -1.0],
        ];
        // columns sum to zero: replace the last row with populations
        for j in 0..3 {
            a[[2, j]] = 1.0;
        }
        let b = array![0.0, 0.0, 1.0];
        let x = lu_solve(a.clone(), &b).unwrap();
        let sum: f64 = x.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}
