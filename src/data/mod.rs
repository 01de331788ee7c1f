//! Synthetic measurement generation for tests and quick experiments.

pub mod synth;

pub use synth::*;
