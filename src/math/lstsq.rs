//! SVD-based linear least squares.
//!
//! Every model evaluation solves the linear subproblem:
//!
//! ```text
//! minimize ||y - A(α) β||^2   over β
//! ```
//!
//! Implementation choices:
//! - We use the economy SVD `A = U diag(s) Vᵗ` (thin factors only; the full
//!   M×M / N×N factors are never needed downstream).
//! - The pseudo-inverse `A⁺ = V diag(1/s) Uᵗ` gives the minimum-norm solution
//!   even when the design matrix is tall.
//! - Singular values below `s_max · SV_RELATIVE_CUTOFF` are truncated (their
//!   reciprocal is set to zero) so a nearly rank-deficient basis produces the
//!   minimum-norm solution instead of a blown-up one.
//! - The SVD factors are returned to the caller because the VarPro Jacobian
//!   projection reuses them.

use nalgebra::{DMatrix, DVector};

use crate::error::VarProError;

/// Relative cutoff under which a singular value is treated as zero.
pub const SV_RELATIVE_CUTOFF: f64 = 1e-12;

/// Iteration cap for the SVD; exceeding it is a `DecompositionFailure`.
const SVD_MAX_ITER: usize = 1_000;

/// Economy SVD factors of the most recent model matrix.
///
/// `u` is M×r, `s` holds the r singular values in descending order, and `v`
/// is N×r, with `r = min(M, N)`.
#[derive(Debug, Clone)]
pub struct SvdFactors {
    pub u: DMatrix<f64>,
    pub s: DVector<f64>,
    pub v: DMatrix<f64>,
}

impl SvdFactors {
    /// Placeholder factors for a block that has not been updated yet.
    pub fn empty() -> Self {
        Self {
            u: DMatrix::zeros(0, 0),
            s: DVector::zeros(0),
            v: DMatrix::zeros(0, 0),
        }
    }

    /// Reciprocal singular values with the near-zero ones truncated to zero.
    pub fn inverted_singular_values(&self) -> DVector<f64> {
        let s_max = self.s.iter().copied().fold(0.0_f64, f64::max);
        let cutoff = s_max * SV_RELATIVE_CUTOFF;
        self.s
            .map(|s| if s > cutoff { 1.0 / s } else { 0.0 })
    }

    /// Apply the pseudo-inverse `A⁺ = V diag(1/s) Uᵗ` to a vector.
    pub fn pseudo_inverse_apply(&self, rhs: &DVector<f64>) -> DVector<f64> {
        let scaled = self
            .inverted_singular_values()
            .component_mul(&(self.u.transpose() * rhs));
        &self.v * scaled
    }
}

/// Result of the linear subproblem for one trial `α`.
#[derive(Debug, Clone)]
pub struct LinearFit {
    /// Minimum-norm least-squares coefficients.
    pub beta: DVector<f64>,
    /// Fitted values `A β`.
    pub y_hat: DVector<f64>,
    /// Residuals `y - A β`.
    pub residual: DVector<f64>,
    /// SVD factors of `A`, cached for the Jacobian projection.
    pub factors: SvdFactors,
}

/// Solve `min ||y - A β||` by economy SVD.
///
/// Fails with [`VarProError::DecompositionFailure`] if the SVD does not
/// converge; a degenerate `β` is never substituted silently.
pub fn solve_linear(a: &DMatrix<f64>, y: &DVector<f64>) -> Result<LinearFit, VarProError> {
    let svd = a
        .clone()
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITER)
        .ok_or(VarProError::DecompositionFailure)?;

    let u = svd.u.ok_or(VarProError::DecompositionFailure)?;
    let v = svd
        .v_t
        .ok_or(VarProError::DecompositionFailure)?
        .transpose();
    let factors = SvdFactors {
        u,
        s: svd.singular_values,
        v,
    };

    let beta = factors.pseudo_inverse_apply(y);
    let y_hat = a * &beta;
    let residual = y - &y_hat;

    log::debug!(
        "linear solve: A is {}x{}, s = {:?}",
        a.nrows(),
        a.ncols(),
        factors.s.as_slice()
    );

    Ok(LinearFit {
        beta,
        y_hat,
        residual,
        factors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_simple_overdetermined_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let fit = solve_linear(&a, &y).unwrap();
        assert_relative_eq!(fit.beta[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.beta[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn residual_identity_holds() {
        let a = DMatrix::from_row_slice(4, 2, &[1.0, 0.5, 1.0, 1.5, 1.0, 2.5, 1.0, 4.0]);
        let y = DVector::from_row_slice(&[1.0, -2.0, 0.5, 3.0]);

        let fit = solve_linear(&a, &y).unwrap();
        let reconstructed = &fit.y_hat + &fit.residual;
        assert_relative_eq!(reconstructed, y, epsilon = 1e-12);
    }

    #[test]
    fn svd_factors_reconstruct_the_matrix() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let y = DVector::from_row_slice(&[1.0, 1.0, 1.0]);

        let fit = solve_linear(&a, &y).unwrap();
        let f = &fit.factors;
        let rebuilt = &f.u * DMatrix::from_diagonal(&f.s) * f.v.transpose();
        assert_relative_eq!(rebuilt, a, epsilon = 1e-10);
    }

    #[test]
    fn rank_deficient_matrix_gets_minimum_norm_solution() {
        // Two identical columns: infinitely many exact solutions. Truncation
        // must pick the minimum-norm one (equal split) instead of exploding.
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let y = DVector::from_row_slice(&[2.0, 4.0, 6.0]);

        let fit = solve_linear(&a, &y).unwrap();
        assert!(fit.beta.iter().all(|b| b.is_finite()));
        assert_relative_eq!(fit.beta[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(fit.beta[1], 1.0, epsilon = 1e-8);
        assert_relative_eq!(fit.residual.norm(), 0.0, epsilon = 1e-10);
    }
}
