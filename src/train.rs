//! Training loop for [`MixtureModel`].
//!
//! The model only exposes a differentiable objective; this driver owns the
//! loop around it. Every iteration clears the tape, evaluates
//! [`MixtureModel::forward`], backpropagates and lets the injected
//! [`Optimizer`] update the parameters in place.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::autograd::clear_graph;
use crate::error::{MixgradError, Result};
use crate::mixture::MixtureModel;
use crate::optim::Optimizer;
use crate::primitives::Matrix;

/// Iteration budget and stopping rule for [`Trainer::fit`].
///
/// # Examples
///
/// ```
/// use mixgrad::prelude::*;
///
/// let x = Matrix::from_vec(6, 1, vec![-3.2, -2.9, -3.0, 3.1, 2.8, 3.0])
///     .expect("valid matrix");
/// let mut model = MixtureModel::from_config(&MixtureConfig::new(2, 1).with_seed(1))
///     .expect("valid shape");
/// let mut adam = Adam::new(0.05).expect("valid learning rate");
///
/// let report = Trainer::new()
///     .with_max_iter(50)
///     .fit(&mut model, &x, &mut adam)
///     .expect("finite training run");
/// assert!(report.n_iter <= 50);
/// assert!(report.final_loss.is_finite());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trainer {
    /// Maximum number of optimizer steps.
    max_iter: usize,
    /// Stop once successive losses differ by less than this (0 disables).
    tol: f32,
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Number of optimizer steps taken.
    pub n_iter: usize,
    /// Whether the tolerance criterion stopped training.
    pub converged: bool,
    /// Loss evaluated before the last step.
    pub final_loss: f32,
    /// Loss history, one entry per step.
    pub losses: Vec<f32>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-6,
        }
    }
}

impl Trainer {
    /// Create a trainer with 1000 iterations and tolerance `1e-6`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of optimizer steps.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance; `0.0` always runs `max_iter` steps.
    #[must_use]
    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Maximum number of optimizer steps.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Convergence tolerance.
    #[must_use]
    pub fn tol(&self) -> f32 {
        self.tol
    }

    fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(MixgradError::hyperparameter("max_iter", 0, "> 0"));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(MixgradError::hyperparameter("tol", self.tol, "finite and >= 0"));
        }
        Ok(())
    }

    /// Minimize [`MixtureModel::forward`] on `x` with `optimizer`.
    ///
    /// `optimizer` is stepped over `model.parameters_mut()` after every
    /// backward pass. The tape is left empty when this returns, successfully
    /// or not. `max_iter` is only an upper bound, so `usize::MAX` together
    /// with a positive `tol` runs until convergence.
    ///
    /// # Errors
    ///
    /// - [`MixgradError::InvalidHyperparameter`] for `max_iter == 0` or a
    ///   negative / non-finite tolerance
    /// - any error from [`MixtureModel::forward`]
    /// - [`MixgradError::NumericalDegeneracy`] if the loss stops being finite
    pub fn fit<O>(
        &self,
        model: &mut MixtureModel,
        x: &Matrix<f32>,
        optimizer: &mut O,
    ) -> Result<FitReport>
    where
        O: Optimizer + ?Sized,
    {
        self.validate()?;

        debug!(
            max_iter = self.max_iter,
            tol = self.tol,
            lr = optimizer.lr(),
            "mixture fit started"
        );
        let mut losses: Vec<f32> = Vec::new();
        let mut converged = false;

        for iter in 0..self.max_iter {
            let loss = match Self::step(model, x, optimizer, iter) {
                Ok(loss) => loss,
                Err(err) => {
                    clear_graph();
                    return Err(err);
                }
            };
            debug!(iter, loss, "training step");

            let previous = losses.last().copied();
            losses.push(loss);

            if let Some(previous) = previous {
                if self.tol > 0.0 && (previous - loss).abs() < self.tol {
                    converged = true;
                    break;
                }
            }
        }
        clear_graph();

        let final_loss = losses.last().copied().unwrap_or(f32::NAN);
        info!(
            n_iter = losses.len(),
            converged, final_loss, "mixture fit finished"
        );

        Ok(FitReport {
            n_iter: losses.len(),
            converged,
            final_loss,
            losses,
        })
    }

    fn step<O>(
        model: &mut MixtureModel,
        x: &Matrix<f32>,
        optimizer: &mut O,
        iter: usize,
    ) -> Result<f32>
    where
        O: Optimizer + ?Sized,
    {
        clear_graph();
        let loss = model.forward(x)?;
        let value = loss.item();
        if !value.is_finite() {
            warn!(iter, "loss became non-finite");
            return Err(MixgradError::degenerate(
                "fit",
                format!("loss is {value} at iteration {iter}"),
            ));
        }

        loss.backward();
        optimizer.step(&mut model.parameters_mut());
        Ok(value)
    }
}
