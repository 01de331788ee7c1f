//! Single-exponential decay variant.
//!
//! Model of the form `y(t) = b0 + b1 exp(-k t)`: two linear parameters
//! (intercept + amplitude), one nonlinear rate constant. Only the amplitude
//! column depends on the rate, so the sparse Jacobian has a single entry.

use nalgebra::{DMatrix, DVector};

use crate::math::project::JacobianEntry;
use crate::models::block::{ModelDescriptor, ModelVariant};

/// `y(t) = b0 + b1 exp(-k t)` over a fixed time grid.
#[derive(Debug, Clone)]
pub struct ExpDecayModel {
    t: DVector<f64>,
    descriptor: ModelDescriptor,
    jidx: [JacobianEntry; 1],
}

impl ExpDecayModel {
    /// Build the variant over its independent-variable grid.
    ///
    /// The grid length fixes M; binding the variant to a measured vector of
    /// a different length fails in `ResponseBlock::new`.
    pub fn new(t: DVector<f64>) -> Self {
        Self {
            t,
            descriptor: ModelDescriptor {
                name: "single_exp",
                model_dof: 2,
                intercept: true,
                param_labels: vec![
                    "offset".to_string(),
                    "amplitude".to_string(),
                    "rate".to_string(),
                ],
            },
            jidx: [JacobianEntry { basis: 1, param: 0 }],
        }
    }

    /// The independent-variable grid.
    pub fn t(&self) -> &DVector<f64> {
        &self.t
    }
}

impl ModelVariant for ExpDecayModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn num_samples(&self) -> usize {
        self.t.len()
    }

    fn num_basis(&self) -> usize {
        2
    }

    fn num_params(&self) -> usize {
        1
    }

    fn jacobian_map(&self) -> &[JacobianEntry] {
        &self.jidx
    }

    fn evaluate_model(&self, p: &DVector<f64>, a: &mut DMatrix<f64>) {
        let k = p[0];
        for (m, &t) in self.t.iter().enumerate() {
            a[(m, 0)] = 1.0;
            a[(m, 1)] = (-t * k).exp();
        }
    }

    fn evaluate_jacobian(&self, p: &DVector<f64>, mjac: &mut DMatrix<f64>) {
        let k = p[0];
        for (m, &t) in self.t.iter().enumerate() {
            mjac[(m, 0)] = -t * (-t * k).exp();
        }
    }
}
