//! Eigen-decomposition of the curvature matrix of Psi with respect to the
//! molar concentrations.

use crate::error::{CriticalError, CriticalResult};
use crate::isochoric::psir_hessian;
use crate::traits::ResidualModel;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

#[derive(Debug, Clone, PartialEq)]
pub struct EigenData {
    /// Ascending. Has N - 1 entries at infinite dilution, N otherwise.
    pub eigenvalues: DVector<f64>,
    /// Eigenvectors as columns, in the order of `eigenvalues`.
    pub eigenvectors: DMatrix<f64>,
    pub v0: DVector<f64>,
    pub v1: DVector<f64>,
}

/// Symmetric eigen-decomposition with eigenpairs sorted by ascending eigenvalue.
pub fn sorted_eigen(matrix: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let eig = SymmetricEigen::new(matrix.clone());
    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));

    let values = DVector::from_iterator(order.len(), order.iter().map(|&i| eig.eigenvalues[i]));
    let mut vectors = DMatrix::zeros(matrix.nrows(), order.len());
    for (col, &i) in order.iter().enumerate() {
        vectors.set_column(col, &eig.eigenvectors.column(i));
    }
    (values, vectors)
}

/// Solves the eigenvalue problem of the full curvature matrix
/// H = Hessian(Psi^r) + diag(R T / rho_i) at `(t, rhovec)`.
///
/// Exactly one zero concentration is handled by decomposing the reduced
/// matrix and appending the unit vector of the missing species as the last
/// basis vector. If `alignment_v0` is given and points away from v0, v0 is
/// flipped.
pub fn eigen_problem<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
    alignment_v0: Option<&DVector<f64>>,
) -> CriticalResult<EigenData> {
    let n = rhovec.len();
    if n < 2 {
        return Err(CriticalError::invalid_input(format!(
            "the curvature eigenproblem needs at least two components, got {n}"
        )));
    }

    let mut hessian = psir_hessian(model, t, rhovec.as_slice());
    let rhotot = rhovec.sum();
    let molefrac: Vec<f64> = rhovec.iter().map(|&r| r / rhotot).collect();
    let gas_constant: f64 = model.gas_constant(&molefrac);
    for i in 0..n {
        if rhovec[i] != 0.0 {
            hessian[(i, i)] += gas_constant * t / rhovec[i];
        }
    }
    if hessian.iter().any(|v| !v.is_finite()) {
        return Err(CriticalError::non_finite(format!(
            "curvature matrix at T = {t}, rho = {:?}",
            rhovec.as_slice()
        )));
    }

    let zeros: Vec<usize> = (0..n).filter(|&i| rhovec[i] == 0.0).collect();
    let (eigenvalues, mut eigenvectors) = match zeros.as_slice() {
        [] => {
            let (values, mut vectors) = sorted_eigen(&hessian);
            // Make v0 non-negative at the most dilute species
            let ind = rhovec.imin();
            if vectors[(ind, 0)] < 0.0 {
                vectors.column_mut(0).neg_mut();
            }
            (values, vectors)
        }
        [bad] => {
            let keep: Vec<usize> = (0..n).filter(|i| i != bad).collect();
            let reduced = hessian.select_rows(&keep).select_columns(&keep);
            let (values, reduced_vectors) = sorted_eigen(&reduced);

            let mut vectors = DMatrix::zeros(n, n);
            for k in 0..n - 1 {
                for (row, &i) in keep.iter().enumerate() {
                    vectors[(i, k)] = reduced_vectors[(row, k)];
                }
            }
            vectors[(*bad, n - 1)] = 1.0;
            (values, vectors)
        }
        _ => {
            return Err(CriticalError::invalid_input(
                "more than one zero concentration value found; not currently supported",
            ))
        }
    };

    if let Some(alignment) = alignment_v0 {
        if eigenvectors.column(0).dot(alignment) < 0.0 {
            eigenvectors.column_mut(0).neg_mut();
        }
    }

    Ok(EigenData {
        v0: eigenvectors.column(0).into_owned(),
        v1: eigenvectors.column(1).into_owned(),
        eigenvalues,
        eigenvectors,
    })
}
