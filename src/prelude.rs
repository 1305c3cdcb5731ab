//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use mixgrad::prelude::*;
//! ```

pub use crate::autograd::{clear_graph, no_grad, Tensor};
pub use crate::error::MixgradError;
pub use crate::mixture::{GradientMode, MixtureConfig, MixtureModel};
pub use crate::optim::{Adam, Optimizer, SGD};
pub use crate::primitives::Matrix;
pub use crate::train::{FitReport, Trainer};
