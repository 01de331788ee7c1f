//! Post-fit statistics engine.
//!
//! Turns a converged fit into an immutable report: error variance, standard
//! errors, correlation matrix, t-ratios, marginal confidence intervals, and
//! studentized residuals. The inference treats the combined parameter vector
//! (linear coefficients first, then nonlinear parameters) against the
//! augmented design `H = [A | J]`.
//!
//! Report fields are plain `Vec`/scalar types so the value stays lightweight
//! and serializable; how a host renders it is not this crate's concern.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::VarProError;

/// Relative cutoff on the diagonal of R below which the design counts as
/// singular to working precision.
const R_DIAG_CUTOFF: f64 = 1e-13;

/// Degrees-of-freedom spec for a model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofSpec {
    /// Model degrees of freedom, excluding the intercept term.
    pub model_dof: usize,
    /// Whether the model includes an intercept column.
    pub intercept: bool,
}

impl DofSpec {
    /// Total parameters charged against the data.
    fn total(&self) -> usize {
        self.model_dof + usize::from(self.intercept)
    }
}

/// Marginal confidence interval for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterInterval {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Point-in-time statistical summary of a converged fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    /// Variant name the report was built from.
    pub model_name: String,
    /// Confidence level (percent) the intervals were computed at.
    pub confidence: f64,
    /// Model degrees of freedom (excluding intercept).
    pub mdof: usize,
    /// Residual (data) degrees of freedom.
    pub ddof: usize,
    /// Sum of squared residuals.
    pub chisqr: f64,
    /// Residual mean square `chisqr / ddof`.
    pub rms: f64,
    /// Residual mean error `sqrt(rms)`.
    pub rme: f64,
    /// Coefficient of determination.
    pub rsqr: f64,
    /// Condition number of the augmented design.
    pub cond: f64,
    /// Combined parameter vector, linear first then nonlinear.
    pub parameters: Vec<f64>,
    /// Labels matching `parameters`.
    pub labels: Vec<String>,
    /// Standard error per parameter.
    pub standard_errors: Vec<f64>,
    /// `parameter / standard error` per parameter.
    pub t_ratios: Vec<f64>,
    /// Parameter correlation matrix, row-major.
    pub correlation: Vec<Vec<f64>>,
    /// Marginal confidence interval per parameter.
    pub intervals: Vec<ParameterInterval>,
    /// Leverage-adjusted residual per observation.
    pub studentized_residuals: Vec<f64>,
}

/// Build a [`FitReport`] from the augmented design `H = [A | J]`, the
/// combined parameter vector, and the converged residual.
///
/// Fails with [`VarProError::DegenerateFit`] when no residual degrees of
/// freedom remain, [`VarProError::SingularDesign`] when `H` is rank deficient
/// to working precision, and [`VarProError::InvalidConfidence`] when the
/// requested level is outside `(0, 100]`.
pub fn fit_report(
    model_name: &str,
    labels: &[String],
    dof: DofSpec,
    h: &DMatrix<f64>,
    params: &DVector<f64>,
    residual: &DVector<f64>,
    y: &DVector<f64>,
    confidence: f64,
) -> Result<FitReport, VarProError> {
    let m = h.nrows();
    let k = h.ncols();
    if params.len() != k || labels.len() != k || residual.len() != m {
        return Err(VarProError::SizeMismatch {
            expected: k,
            actual: params.len(),
        });
    }

    if m <= dof.total() {
        return Err(VarProError::DegenerateFit {
            samples: m,
            model_dof: dof.total(),
        });
    }
    let ddof = m - dof.total();

    // More parameters than observations: R would not even be square.
    if k > m {
        return Err(VarProError::SingularDesign);
    }

    let chisqr = residual.norm_squared();
    let rms = chisqr / ddof as f64;
    let rme = rms.sqrt();
    let rsqr = coefficient_of_determination(chisqr, y, dof.intercept);

    // Economy QR of the augmented design; the inverse of R carries both the
    // parameter covariance structure and the correlation matrix.
    let qr = h.clone().qr();
    let q = qr.q();
    let r = qr.r();

    let diag_max = (0..k).map(|i| r[(i, i)].abs()).fold(0.0_f64, f64::max);
    if (0..k).any(|i| r[(i, i)].abs() <= diag_max * R_DIAG_CUTOFF) {
        return Err(VarProError::SingularDesign);
    }
    let rinv = r
        .solve_upper_triangular(&DMatrix::identity(k, k))
        .ok_or(VarProError::SingularDesign)?;

    // H and R share singular values, so the condition number comes from the
    // small k×k factor.
    let sv = r
        .clone()
        .try_svd(false, false, f64::EPSILON, 1_000)
        .ok_or(VarProError::SingularDesign)?
        .singular_values;
    let s_min = sv.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = sv.iter().copied().fold(0.0_f64, f64::max);
    let cond = if s_min > 0.0 { s_max / s_min } else { f64::INFINITY };

    let row_norms: Vec<f64> = (0..k).map(|i| rinv.row(i).norm()).collect();

    let mut normalized = rinv.clone();
    for (i, &norm) in row_norms.iter().enumerate() {
        if norm > 0.0 {
            normalized.row_mut(i).scale_mut(1.0 / norm);
        }
    }
    let cor = &normalized * normalized.transpose();
    let correlation: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| cor[(i, j)]).collect())
        .collect();

    let standard_errors: Vec<f64> = row_norms.iter().map(|norm| rme * norm).collect();
    let t_ratios: Vec<f64> = params
        .iter()
        .zip(&standard_errors)
        .map(|(p, se)| p / se)
        .collect();

    if !(confidence > 0.0 && confidence <= 100.0) {
        return Err(VarProError::InvalidConfidence(confidence));
    }
    let tail = (1.0 - confidence / 100.0) / 2.0;
    let student = StudentsT::new(0.0, 1.0, ddof as f64).map_err(|_| {
        VarProError::DegenerateFit {
            samples: m,
            model_dof: dof.total(),
        }
    })?;
    let t_crit = student.inverse_cdf(1.0 - tail);

    let intervals: Vec<ParameterInterval> = params
        .iter()
        .zip(&standard_errors)
        .map(|(&p, &se)| {
            let half = t_crit * se;
            ParameterInterval {
                estimate: p,
                lower: p - half,
                upper: p + half,
            }
        })
        .collect();

    let studentized_residuals: Vec<f64> = (0..m)
        .map(|i| {
            let leverage = q.row(i).norm_squared();
            residual[i] * rme * (1.0 - leverage).max(0.0).sqrt()
        })
        .collect();

    log::debug!(
        "fit report for {model_name}: ddof = {ddof}, rme = {rme:.6e}, cond = {cond:.3e}"
    );

    Ok(FitReport {
        model_name: model_name.to_string(),
        confidence,
        mdof: dof.model_dof,
        ddof,
        chisqr,
        rms,
        rme,
        rsqr,
        cond,
        parameters: params.iter().copied().collect(),
        labels: labels.to_vec(),
        standard_errors,
        t_ratios,
        correlation,
        intervals,
        studentized_residuals,
    })
}

fn coefficient_of_determination(chisqr: f64, y: &DVector<f64>, intercept: bool) -> f64 {
    let tss = if intercept {
        let mean = y.mean();
        y.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
    } else {
        y.norm_squared()
    };
    if tss > 0.0 { 1.0 - chisqr / tss } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::solve_linear;
    use approx::assert_relative_eq;

    /// Straight-line fit with a closed-form covariance to pin the standard
    /// errors and t-ratios against textbook formulas.
    fn line_fixture() -> (DMatrix<f64>, DVector<f64>, DVector<f64>, DVector<f64>) {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = DVector::from_row_slice(&[0.1, 0.9, 2.2, 2.8, 4.1, 4.9]);
        let mut h = DMatrix::zeros(6, 2);
        for (i, &xi) in x.iter().enumerate() {
            h[(i, 0)] = 1.0;
            h[(i, 1)] = xi;
        }
        let fit = solve_linear(&h, &y).unwrap();
        (h, fit.beta, fit.residual, y)
    }

    fn line_labels() -> Vec<String> {
        vec!["intercept".to_string(), "slope".to_string()]
    }

    fn line_dof() -> DofSpec {
        DofSpec {
            model_dof: 1,
            intercept: true,
        }
    }

    #[test]
    fn standard_errors_match_textbook_ols() {
        let (h, beta, residual, y) = line_fixture();
        let report = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &beta,
            &residual,
            &y,
            95.0,
        )
        .unwrap();

        let n = 6.0;
        let x_mean = 2.5;
        let sxx: f64 = (0..6).map(|i| (i as f64 - x_mean).powi(2)).sum();
        let s2 = residual.norm_squared() / (n - 2.0);

        let se_slope = (s2 / sxx).sqrt();
        let se_intercept = (s2 * (1.0 / n + x_mean * x_mean / sxx)).sqrt();

        assert_relative_eq!(report.standard_errors[0], se_intercept, max_relative = 1e-10);
        assert_relative_eq!(report.standard_errors[1], se_slope, max_relative = 1e-10);
        assert_relative_eq!(
            report.t_ratios[1],
            beta[1] / se_slope,
            max_relative = 1e-10
        );
        assert_eq!(report.ddof, 4);
        assert!(report.rsqr > 0.99);
    }

    #[test]
    fn correlation_matrix_has_unit_diagonal() {
        let (h, beta, residual, y) = line_fixture();
        let report = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &beta,
            &residual,
            &y,
            95.0,
        )
        .unwrap();

        for i in 0..2 {
            assert_relative_eq!(report.correlation[i][i], 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(
            report.correlation[0][1],
            report.correlation[1][0],
            epsilon = 1e-12
        );
    }

    #[test]
    fn intervals_are_symmetric_about_the_estimate() {
        let (h, beta, residual, y) = line_fixture();
        let report = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &beta,
            &residual,
            &y,
            95.0,
        )
        .unwrap();

        for ci in &report.intervals {
            assert_relative_eq!(
                ci.upper - ci.estimate,
                ci.estimate - ci.lower,
                epsilon = 1e-12
            );
            assert!(ci.upper > ci.lower);
        }
    }

    #[test]
    fn tighter_confidence_gives_narrower_intervals() {
        let (h, beta, residual, y) = line_fixture();
        let wide = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &beta,
            &residual,
            &y,
            99.0,
        )
        .unwrap();
        let narrow = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &beta,
            &residual,
            &y,
            80.0,
        )
        .unwrap();

        for (w, n) in wide.intervals.iter().zip(&narrow.intervals) {
            assert!(w.upper - w.lower > n.upper - n.lower);
        }
    }

    #[test]
    fn degenerate_dof_is_rejected() {
        let h = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let params = DVector::from_row_slice(&[0.0, 1.0]);
        let residual = DVector::zeros(2);
        let y = DVector::from_row_slice(&[0.0, 1.0]);
        let err = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &params,
            &residual,
            &y,
            95.0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            VarProError::DegenerateFit {
                samples: 2,
                model_dof: 2
            }
        );
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let (h, beta, residual, y) = line_fixture();
        for &level in &[0.0, -5.0, 120.0] {
            let err = fit_report(
                "line",
                &line_labels(),
                line_dof(),
                &h,
                &beta,
                &residual,
                &y,
                level,
            )
            .unwrap_err();
            assert_eq!(err, VarProError::InvalidConfidence(level));
        }
    }

    #[test]
    fn collinear_design_is_rejected() {
        let mut h = DMatrix::zeros(5, 2);
        for i in 0..5 {
            h[(i, 0)] = 1.0;
            h[(i, 1)] = 2.0; // exact multiple of the first column
        }
        let params = DVector::from_row_slice(&[1.0, 1.0]);
        let residual = DVector::from_row_slice(&[0.1, -0.1, 0.05, -0.05, 0.0]);
        let y = DVector::from_row_slice(&[3.0, 3.1, 2.9, 3.0, 3.05]);
        let err = fit_report(
            "line",
            &line_labels(),
            line_dof(),
            &h,
            &params,
            &residual,
            &y,
            95.0,
        )
        .unwrap_err();
        assert_eq!(err, VarProError::SingularDesign);
    }
}
