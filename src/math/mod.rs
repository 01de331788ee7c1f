//! Numerical kernels: the SVD-based linear solver and the Jacobian projector.

pub mod lstsq;
pub mod project;

pub use lstsq::*;
pub use project::*;
