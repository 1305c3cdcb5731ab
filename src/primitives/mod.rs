//! Core compute primitives.
//!
//! Observations enter the crate, and responsibilities leave it, as a
//! row-major [`Matrix`].

mod matrix;

pub use matrix::Matrix;
