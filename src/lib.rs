//! Mixgrad: Gaussian mixture models fitted by gradient descent.
//!
//! A mixture of multivariate Gaussians is fitted by minimizing its negative
//! expected complete-data log-likelihood with a tape-based reverse-mode
//! autodiff engine instead of closed-form EM updates. Covariances are
//! parameterized through lower-triangular factors with a log-diagonal,
//! mixing weights through a softmax, and responsibilities are normalized in
//! log space.
//!
//! # Quick Start
//!
//! ```
//! use mixgrad::prelude::*;
//!
//! let x = Matrix::from_vec(6, 1, vec![-3.1, -2.9, -3.0, 2.9, 3.2, 3.0])
//!     .expect("valid matrix");
//!
//! let mut model = MixtureModel::from_config(&MixtureConfig::new(2, 1).with_seed(3))?;
//! let mut adam = Adam::new(0.05)?;
//!
//! let report = Trainer::new().with_max_iter(200).fit(&mut model, &x, &mut adam)?;
//! assert!(report.final_loss.is_finite());
//!
//! let resp = model.predict(&x)?;
//! assert_eq!(resp.shape(), (6, 2));
//! # Ok::<(), mixgrad::MixgradError>(())
//! ```
//!
//! The default [`GradientMode::Detached`] follows the exact likelihood
//! gradient. [`GradientMode::Joint`] also differentiates through the
//! responsibilities and optimizes a different, entropy-penalized objective.
//!
//! # Modules
//!
//! - [`mixture`]: The mixture model, its configuration and gradient modes
//! - [`autograd`]: Tape-based reverse-mode automatic differentiation
//! - [`optim`]: Gradient-based optimizers (SGD, Adam)
//! - [`train`]: Training loop with convergence reporting
//! - [`init`]: Seeded parameter initialization
//! - [`primitives`]: Row-major `Matrix` for observations and results
//! - [`error`]: Error taxonomy and `Result` alias

pub mod autograd;
pub mod error;
pub mod init;
pub mod mixture;
pub mod optim;
pub mod prelude;
pub mod primitives;
pub mod train;

pub use error::{MixgradError, Result};
pub use mixture::{GradientMode, MixtureConfig, MixtureModel};
pub use primitives::Matrix;
pub use train::{FitReport, Trainer};
