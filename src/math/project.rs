//! VarPro Jacobian projection (Golub–Pereyra).
//!
//! The raw derivative of the model matrix is sparse: for realistic separable
//! models only `K ≪ N·P` of the possible `∂A[:,b]/∂α[p]` terms are
//! structurally nonzero (a rate constant only affects the basis column it
//! multiplies). The model variant therefore supplies one dense column per
//! nonzero term plus an index map, and the projection works column-by-column
//! in `O(M·K)` instead of `O(M·N·P)`.
//!
//! For each nonzero entry `k = (b, p)` the projected Jacobian accumulates
//!
//! ```text
//! J[:,p] += (I - U Uᵗ) mjac[:,k] β[b]  +  U Σ⁻¹ Vᵗ e_b (mjac[:,k]·r)
//! ```
//!
//! The first term is the derivative component orthogonal to the column space
//! of `A`; the second accounts for the implicit dependence of `β` on `α`.
//! With this sign convention `J` is the derivative of the fitted values,
//! which the finite-difference consistency test in `models::block` pins down.

use nalgebra::{DMatrix, DVector};

use crate::math::lstsq::SvdFactors;

/// One structurally nonzero derivative term: `∂A[:,basis]/∂α[param]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JacobianEntry {
    /// Column of the model matrix this term differentiates.
    pub basis: usize,
    /// Nonlinear parameter the derivative is taken with respect to.
    pub param: usize,
}

/// Dense projected Jacobian plus the spread intermediates used to build it.
#[derive(Debug, Clone)]
pub struct ProjectedJacobian {
    /// M×P derivative of the fitted values with respect to `α`.
    pub j: DMatrix<f64>,
    /// M×K weighted-column spread: `mjac[:,k] β[basis(k)]`.
    pub dkc: DMatrix<f64>,
    /// N×K weighted-row spread: `mjac[:,k]·r` scattered to `row basis(k)`.
    pub dkrw: DMatrix<f64>,
}

/// Build the projected Jacobian from the sparse raw Jacobian and the cached
/// SVD factors of the current model matrix.
pub fn project_jacobian(
    mjac: &DMatrix<f64>,
    jidx: &[JacobianEntry],
    beta: &DVector<f64>,
    residual: &DVector<f64>,
    factors: &SvdFactors,
    num_params: usize,
) -> ProjectedJacobian {
    let m = mjac.nrows();
    let n = factors.v.nrows();
    let k_len = jidx.len();

    let mut dkc = DMatrix::zeros(m, k_len);
    let mut dkrw = DMatrix::zeros(n, k_len);
    for (k, entry) in jidx.iter().enumerate() {
        let col = mjac.column(k);
        dkc.column_mut(k).copy_from(&(col * beta[entry.basis]));
        // Accumulate rather than overwrite: several entries may scatter into
        // the same basis row.
        dkrw[(entry.basis, k)] += col.dot(residual);
    }

    // Component of the derivative outside the column space of A.
    let a_term = &dkc - &factors.u * (factors.u.transpose() * &dkc);

    // Correction for the implicit dependence of beta on alpha:
    // (A⁺)ᵗ = U Σ⁻¹ Vᵗ applied to the scattered rows.
    let scaled = DMatrix::from_diagonal(&factors.inverted_singular_values())
        * (factors.v.transpose() * &dkrw);
    let b_term = &factors.u * scaled;

    let mut j = DMatrix::zeros(m, num_params);
    for (k, entry) in jidx.iter().enumerate() {
        let update = a_term.column(k) + b_term.column(k);
        let mut target = j.column_mut(entry.param);
        target += update;
    }

    log::debug!(
        "projected jacobian: {} sparse columns -> {}x{}",
        k_len,
        m,
        num_params
    );

    ProjectedJacobian { j, dkc, dkrw }
}
