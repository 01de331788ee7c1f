//! The separable-model abstraction and the two-stage update algorithm.
//!
//! A [`ResponseBlock`] owns the measured data and the latest fit state.
//! Each `update_model` call runs:
//!
//! 1. variant fills the model matrix `A(α)`
//! 2. SVD solve for the linear coefficients `β`, fitted values and residual
//! 3. (optional) variant fills the sparse raw Jacobian, which is projected
//!    into the dense Jacobian an external optimizer consumes
//!
//! The whole derived state is computed as one [`FitState`] value and
//! committed wholesale, so accessors are always a consistent snapshot of the
//! last call: the SVD factors never refer to an older model matrix, and a
//! Jacobian is only present when the last call asked for one. A block is not
//! safe for concurrent updates from multiple threads; callers needing
//! concurrent fits use separate blocks.

use nalgebra::{DMatrix, DVector};

use crate::error::VarProError;
use crate::math::lstsq::{solve_linear, SvdFactors};
use crate::math::project::{project_jacobian, JacobianEntry};
use crate::report::{fit_report, DofSpec, FitReport};

/// Immutable per-variant configuration.
///
/// Replaces per-class static state: each variant value owns its descriptor
/// and hands out a reference.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Short variant name carried into fit reports.
    pub name: &'static str,
    /// Model degrees of freedom, excluding the intercept term.
    pub model_dof: usize,
    /// Whether the model includes an intercept column.
    pub intercept: bool,
    /// Labels for the combined parameter vector, linear first then nonlinear.
    pub param_labels: Vec<String>,
}

impl ModelDescriptor {
    /// Degrees-of-freedom spec consumed by the statistics engine.
    pub fn dof_spec(&self) -> DofSpec {
        DofSpec {
            model_dof: self.model_dof,
            intercept: self.intercept,
        }
    }
}

/// Capability interface implemented by concrete separable models.
///
/// `evaluate_model` and `evaluate_jacobian` receive pre-sized output
/// matrices (M×N and M×K) and must fill every structurally relevant entry.
/// N, P, K and the index map are fixed for the lifetime of the variant.
pub trait ModelVariant {
    /// Variant configuration (name, dof spec, parameter labels).
    fn descriptor(&self) -> &ModelDescriptor;

    /// Number of samples M implied by the variant's covariate data.
    fn num_samples(&self) -> usize;

    /// Number of basis functions N (columns of the model matrix).
    fn num_basis(&self) -> usize;

    /// Number of nonlinear parameters P.
    fn num_params(&self) -> usize;

    /// The K structurally nonzero derivative terms.
    fn jacobian_map(&self) -> &[JacobianEntry];

    /// Fill the M×N model matrix for the given nonlinear parameters.
    fn evaluate_model(&self, p: &DVector<f64>, a: &mut DMatrix<f64>);

    /// Fill the M×K sparse raw Jacobian, one column per index-map entry.
    fn evaluate_jacobian(&self, p: &DVector<f64>, mjac: &mut DMatrix<f64>);
}

/// Everything derived by one `update_model` call.
///
/// Built as a value and swapped in atomically; a failed update never leaves
/// a half-written state behind. The Jacobian matrices are empty (0-column)
/// when the call did not request a Jacobian update.
#[derive(Debug, Clone)]
pub struct FitState {
    /// Linear coefficients for the current `α`.
    pub beta: DVector<f64>,
    /// Fitted values `A β`.
    pub y_hat: DVector<f64>,
    /// Residuals `y - A β`.
    pub residual: DVector<f64>,
    /// Model matrix `A(α)`.
    pub amat: DMatrix<f64>,
    /// Economy SVD factors of `amat`.
    pub factors: SvdFactors,
    /// Sparse raw Jacobian (M×K).
    pub mjac: DMatrix<f64>,
    /// Projected Jacobian (M×P).
    pub jac: DMatrix<f64>,
    /// Weighted-column spread matrix (M×K).
    pub dkc: DMatrix<f64>,
    /// Weighted-row spread matrix (N×K).
    pub dkrw: DMatrix<f64>,
}

impl FitState {
    fn empty() -> Self {
        Self {
            beta: DVector::zeros(0),
            y_hat: DVector::zeros(0),
            residual: DVector::zeros(0),
            amat: DMatrix::zeros(0, 0),
            factors: SvdFactors::empty(),
            mjac: DMatrix::zeros(0, 0),
            jac: DMatrix::zeros(0, 0),
            dkc: DMatrix::zeros(0, 0),
            dkrw: DMatrix::zeros(0, 0),
        }
    }
}

/// A separable model bound to its measured data.
#[derive(Debug, Clone)]
pub struct ResponseBlock<V: ModelVariant> {
    variant: V,
    y: DVector<f64>,
    alpha: DVector<f64>,
    state: FitState,
    feval: u64,
    jeval: u64,
}

impl<V: ModelVariant> ResponseBlock<V> {
    /// Bind a variant to a measured vector.
    ///
    /// Fails with [`VarProError::SizeMismatch`] when the variant's covariate
    /// data implies a different sample count than `y`.
    pub fn new(variant: V, y: DVector<f64>) -> Result<Self, VarProError> {
        if variant.num_samples() != y.len() {
            return Err(VarProError::SizeMismatch {
                expected: y.len(),
                actual: variant.num_samples(),
            });
        }

        log::debug!(
            "created {} block with {} measurements",
            variant.descriptor().name,
            y.len()
        );

        Ok(Self {
            variant,
            y,
            alpha: DVector::zeros(0),
            state: FitState::empty(),
            feval: 0,
            jeval: 0,
        })
    }

    /// Run the two-stage fit update for a trial parameter vector and return
    /// the committed state.
    ///
    /// Fails with [`VarProError::DecompositionFailure`] if the SVD does not
    /// converge; in that case only `alpha` has been overwritten and the state
    /// still reflects the previous successful update.
    pub fn update_model(
        &mut self,
        p: &DVector<f64>,
        update_jac: bool,
    ) -> Result<&FitState, VarProError> {
        self.alpha = p.clone();

        let m = self.y.len();
        let mut amat = DMatrix::zeros(m, self.variant.num_basis());
        self.variant.evaluate_model(p, &mut amat);
        self.feval += 1;

        let fit = solve_linear(&amat, &self.y)?;
        log::debug!(
            "{}: beta = {:?}, |r| = {:.6e}",
            self.variant.descriptor().name,
            fit.beta.as_slice(),
            fit.residual.norm()
        );

        let mut state = FitState {
            beta: fit.beta,
            y_hat: fit.y_hat,
            residual: fit.residual,
            amat,
            factors: fit.factors,
            mjac: DMatrix::zeros(m, 0),
            jac: DMatrix::zeros(m, 0),
            dkc: DMatrix::zeros(m, 0),
            dkrw: DMatrix::zeros(self.variant.num_basis(), 0),
        };

        if update_jac {
            let jidx = self.variant.jacobian_map();
            let mut mjac = DMatrix::zeros(m, jidx.len());
            self.variant.evaluate_jacobian(p, &mut mjac);
            self.jeval += 1;

            let projected = project_jacobian(
                &mjac,
                jidx,
                &state.beta,
                &state.residual,
                &state.factors,
                self.variant.num_params(),
            );
            state.mjac = mjac;
            state.jac = projected.j;
            state.dkc = projected.dkc;
            state.dkrw = projected.dkrw;
        }

        self.state = state;
        Ok(&self.state)
    }

    /// Post-process the current state into a statistical report.
    ///
    /// Requires that the last call was `update_model(p, true)` so the
    /// projected Jacobian matches the current parameters; fails with
    /// [`VarProError::SizeMismatch`] when the Jacobian is missing.
    pub fn get_fit_report(&self, confidence_level: f64) -> Result<FitReport, VarProError> {
        let (m, n) = self.state.amat.shape();
        let p = self.variant.num_params();
        if self.state.jac.shape() != (m, p) {
            return Err(VarProError::SizeMismatch {
                expected: m * p,
                actual: self.state.jac.nrows() * self.state.jac.ncols(),
            });
        }

        // Augmented design [A | J] and combined parameter vector (β then α).
        let mut h = DMatrix::zeros(m, n + p);
        h.view_mut((0, 0), (m, n)).copy_from(&self.state.amat);
        h.view_mut((0, n), (m, p)).copy_from(&self.state.jac);

        let mut params = DVector::zeros(n + p);
        params.rows_mut(0, n).copy_from(&self.state.beta);
        params.rows_mut(n, p).copy_from(&self.alpha);

        let descriptor = self.variant.descriptor();
        fit_report(
            descriptor.name,
            &descriptor.param_labels,
            descriptor.dof_spec(),
            &h,
            &params,
            &self.state.residual,
            &self.y,
            confidence_level,
        )
    }

    /// The full state committed by the last update.
    pub fn state(&self) -> &FitState {
        &self.state
    }

    /// Fitted values from the last update.
    pub fn fitted(&self) -> &DVector<f64> {
        &self.state.y_hat
    }

    /// Residuals from the last update.
    pub fn residual(&self) -> &DVector<f64> {
        &self.state.residual
    }

    /// Nonlinear and linear parameter vectors from the last update.
    pub fn params(&self) -> (&DVector<f64>, &DVector<f64>) {
        (&self.alpha, &self.state.beta)
    }

    /// The measured vector the block was constructed with.
    pub fn target(&self) -> &DVector<f64> {
        &self.y
    }

    /// Model matrix from the last update.
    pub fn model_matrix(&self) -> &DMatrix<f64> {
        &self.state.amat
    }

    /// Sparse raw Jacobian and its index map.
    pub fn sparse_jacobian(&self) -> (&[JacobianEntry], &DMatrix<f64>) {
        (self.variant.jacobian_map(), &self.state.mjac)
    }

    /// Projected Jacobian from the last jacobian update.
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.state.jac
    }

    /// Spread intermediates used by the projection (diagnostic).
    pub fn spread_matrices(&self) -> (&DMatrix<f64>, &DMatrix<f64>) {
        (&self.state.dkc, &self.state.dkrw)
    }

    /// Economy SVD triple (U, s, V) of the current model matrix.
    pub fn svd(&self) -> (&DMatrix<f64>, &DVector<f64>, &DMatrix<f64>) {
        (
            &self.state.factors.u,
            &self.state.factors.s,
            &self.state.factors.v,
        )
    }

    /// Model / jacobian evaluation counters (diagnostic only).
    pub fn evaluations(&self) -> (u64, u64) {
        (self.feval, self.jeval)
    }

    /// The variant this block drives.
    pub fn variant(&self) -> &V {
        &self.variant
    }
}
