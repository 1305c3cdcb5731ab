//! Optimizers that update mixture parameters in place.
//!
//! [`Trainer`](crate::train::Trainer) hands an optimizer the tensors from
//! [`MixtureModel::parameters_mut`](crate::mixture::MixtureModel::parameters_mut)
//! after every backward pass. Gradients are read from the thread-local tape
//! and per-parameter state is keyed by [`TensorId`], which in-place updates
//! never change.
//!
//! # Example
//!
//! ```
//! use mixgrad::autograd::{clear_graph, Tensor};
//! use mixgrad::optim::{Optimizer, SGD};
//!
//! let mut param = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
//! let mut sgd = SGD::new(0.1)?;
//!
//! for _ in 0..10 {
//!     clear_graph();
//!     param.mul(&param).sum().backward();
//!     sgd.step(&mut [&mut param]);
//! }
//! assert!(param.data()[0].abs() < 0.2);
//! # Ok::<(), mixgrad::MixgradError>(())
//! ```
//!
//! # References
//!
//! - Polyak, B. T. (1964). Some methods of speeding up the convergence of iteration methods.
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic optimization. ICLR.

use std::collections::HashMap;

use crate::autograd::{get_grad, Tensor, TensorId};
use crate::error::{MixgradError, Result};

/// A first-order update rule.
pub trait Optimizer {
    /// Update every tensor in `params` that has a gradient on the tape.
    ///
    /// Tensors without a gradient are left untouched and keep their state.
    fn step(&mut self, params: &mut [&mut Tensor]);

    /// Step size.
    fn lr(&self) -> f32;
}

fn check_lr(lr: f32) -> Result<f32> {
    if lr.is_finite() && lr > 0.0 {
        Ok(lr)
    } else {
        Err(MixgradError::hyperparameter("lr", lr, "finite and > 0"))
    }
}

/// Gradient descent with optional heavy-ball momentum.
///
/// ```text
/// v ← μ·v + g
/// θ ← θ - lr·v
/// ```
///
/// With `μ = 0` this is plain gradient descent.
#[derive(Debug, Clone)]
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocity: HashMap<TensorId, Vec<f32>>,
}

impl SGD {
    /// Plain gradient descent.
    ///
    /// # Errors
    ///
    /// [`MixgradError::InvalidHyperparameter`] unless `lr` is finite and positive.
    pub fn new(lr: f32) -> Result<Self> {
        Self::with_momentum(lr, 0.0)
    }

    /// Gradient descent with momentum `μ ∈ [0, 1)`.
    ///
    /// # Errors
    ///
    /// [`MixgradError::InvalidHyperparameter`] for a bad `lr` or `momentum`.
    pub fn with_momentum(lr: f32, momentum: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&momentum) {
            return Err(MixgradError::hyperparameter("momentum", momentum, "in [0, 1)"));
        }
        Ok(Self {
            lr: check_lr(lr)?,
            momentum,
            velocity: HashMap::new(),
        })
    }

    /// Momentum coefficient.
    #[must_use]
    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [&mut Tensor]) {
        for param in params.iter_mut() {
            let Some(grad) = get_grad(param.id()) else {
                continue;
            };
            let velocity = self
                .velocity
                .entry(param.id())
                .or_insert_with(|| vec![0.0; grad.numel()]);

            for ((theta, v), &g) in param
                .data_mut()
                .iter_mut()
                .zip(velocity.iter_mut())
                .zip(grad.data())
            {
                *v = self.momentum * *v + g;
                *theta -= self.lr * *v;
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }
}

/// First and second moment estimates of one parameter.
#[derive(Debug, Clone)]
struct Moments {
    first: Vec<f32>,
    second: Vec<f32>,
}

/// Adam with bias correction (β₁ = 0.9, β₂ = 0.999, ε = 1e-8).
///
/// ```text
/// m ← β₁·m + (1 - β₁)·g
/// s ← β₂·s + (1 - β₂)·g²
/// θ ← θ - lr·(m / (1 - β₁ᵗ)) / (√(s / (1 - β₂ᵗ)) + ε)
/// ```
///
/// The step count `t` advances once per [`step`](Optimizer::step), so every
/// mixture parameter shares the same bias correction.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    t: i32,
    moments: HashMap<TensorId, Moments>,
}

impl Adam {
    const BETA1: f32 = 0.9;
    const BETA2: f32 = 0.999;
    const EPS: f32 = 1e-8;

    /// # Errors
    ///
    /// [`MixgradError::InvalidHyperparameter`] unless `lr` is finite and positive.
    pub fn new(lr: f32) -> Result<Self> {
        Ok(Self {
            lr: check_lr(lr)?,
            t: 0,
            moments: HashMap::new(),
        })
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Tensor]) {
        self.t = self.t.saturating_add(1);
        let correction1 = 1.0 - Self::BETA1.powi(self.t);
        let correction2 = 1.0 - Self::BETA2.powi(self.t);

        for param in params.iter_mut() {
            let Some(grad) = get_grad(param.id()) else {
                continue;
            };
            let n = grad.numel();
            let Moments { first, second } =
                self.moments.entry(param.id()).or_insert_with(|| Moments {
                    first: vec![0.0; n],
                    second: vec![0.0; n],
                });

            for (i, (theta, &g)) in param.data_mut().iter_mut().zip(grad.data()).enumerate() {
                first[i] = Self::BETA1 * first[i] + (1.0 - Self::BETA1) * g;
                second[i] = Self::BETA2 * second[i] + (1.0 - Self::BETA2) * g * g;
                let m_hat = first[i] / correction1;
                let s_hat = second[i] / correction2;
                *theta -= self.lr * m_hat / (s_hat.sqrt() + Self::EPS);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }
}
