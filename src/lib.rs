//! `varpro-blocks` library crate.
//!
//! Variable Projection (VarPro) evaluation engine for separable nonlinear
//! regression models of the form `y ≈ A(α)·β`, where `α` is a small vector of
//! nonlinear parameters and `β` is a vector of linear coefficients.
//!
//! For any trial `α` the linear coefficients are solved exactly by SVD-based
//! least squares, and a projected Jacobian with respect to `α` alone
//! (Golub–Pereyra) is built so an external nonlinear optimizer can drive `α`
//! without ever forming derivatives with respect to `β`.
//!
//! The crate deliberately stops at the evaluation boundary so that:
//!
//! - core logic stays testable without an optimizer in the loop
//! - any Levenberg–Marquardt / gradient backend can consume the
//!   residual + Jacobian pair produced here
//! - a converged fit can be post-processed into a [`report::FitReport`]

pub mod data;
pub mod error;
pub mod math;
pub mod models;
pub mod report;
