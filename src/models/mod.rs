//! Separable model variants and the response block that drives them.
//!
//! A variant only knows how to fill its model matrix and the sparse columns
//! of its raw Jacobian; the [`block::ResponseBlock`] orchestrates the SVD
//! solve and the VarPro projection and is variant-agnostic.

pub mod block;
pub mod exp;

pub use block::*;
pub use exp::*;
