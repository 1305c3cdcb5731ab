//! Gaussian mixture model fitted by gradient descent.
//!
//! Instead of closed-form EM updates, the model exposes a differentiable
//! objective ([`MixtureModel::forward`]) that an external optimizer
//! minimizes. Three parameter tensors are trained:
//!
//! - `means` `[K, D]`
//! - `raw_scale` `[K, D, D]`: unconstrained storage of the lower-triangular
//!   covariance factors. Strictly-lower entries are used as-is, the diagonal
//!   is stored as a logarithm and the upper triangle is ignored, so every
//!   finite value yields `Σ_k = L_k L_kᵀ` symmetric positive definite.
//! - `log_mixing_weights` `[K]`: logits of the mixing weights.
//!
//! Responsibilities are normalized in log space (row-wise log-sum-exp), so
//! an observation far from every mean still gets a well-defined assignment.
//!
//! # References
//!
//! - Dempster, A. P., Laird, N. M., & Rubin, D. B. (1977). Maximum likelihood
//!   from incomplete data via the EM algorithm. JRSS-B.
//! - Bishop, C. M. (2006). Pattern Recognition and Machine Learning, ch. 9.

mod config;

pub use config::{GradientMode, MixtureConfig};

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::autograd::{no_grad, Tensor};
use crate::error::{MixgradError, Result};
use crate::init::{uniform, zeros};
use crate::primitives::Matrix;

/// Gaussian mixture with Cholesky-factored covariances and softmax weights.
///
/// # Examples
///
/// ```
/// use mixgrad::mixture::MixtureModel;
/// use mixgrad::primitives::Matrix;
///
/// let model = MixtureModel::new(2, 1).expect("valid shape");
/// assert_eq!(model.mixing_weights(), vec![0.5, 0.5]);
///
/// let x = Matrix::from_vec(3, 1, vec![-3.0, 0.0, 3.0]).expect("valid matrix");
/// let resp = model.predict(&x).expect("finite input");
/// assert_eq!(resp.shape(), (3, 2));
/// for i in 0..3 {
///     let total: f32 = resp.row(i).iter().sum();
///     assert!((total - 1.0).abs() < 1e-5);
/// }
/// ```
///
/// # Performance
///
/// - Time complexity: O(nkd²) per evaluation (one triangular solve per sample and component)
/// - Space complexity: O(nk + kd²)
#[derive(Debug, Clone)]
pub struct MixtureModel {
    component_count: usize,
    feature_dim: usize,
    gradient_mode: GradientMode,
    means: Tensor,
    raw_scale: Tensor,
    log_mixing_weights: Tensor,
}

impl MixtureModel {
    /// Absolute tolerance when checking covariances for symmetry.
    const SYMMETRY_TOL: f32 = 1e-5;

    /// Create a model with means drawn uniformly from `[-4, 4]`.
    ///
    /// # Errors
    ///
    /// Returns [`MixgradError::InvalidShape`] if either count is zero.
    pub fn new(component_count: usize, feature_dim: usize) -> Result<Self> {
        Self::from_config(&MixtureConfig::new(component_count, feature_dim))
    }

    /// Create a model with means drawn uniformly from `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`MixgradError::InvalidShape`] if either count is zero and
    /// [`MixgradError::InvalidHyperparameter`] if the bounds are not finite
    /// or `low >= high`.
    pub fn with_bounds(
        component_count: usize,
        feature_dim: usize,
        low: f32,
        high: f32,
    ) -> Result<Self> {
        Self::from_config(&MixtureConfig::new(component_count, feature_dim).with_bounds(low, high))
    }

    /// Create a model from a full configuration.
    ///
    /// Scale factors start at the identity and mixing weights at uniform.
    ///
    /// # Errors
    ///
    /// Same as [`with_bounds`](Self::with_bounds).
    pub fn from_config(config: &MixtureConfig) -> Result<Self> {
        let (k, d) = (config.component_count, config.feature_dim);
        if k == 0 {
            return Err(MixgradError::non_positive("component_count", k));
        }
        if d == 0 {
            return Err(MixgradError::non_positive("feature_dim", d));
        }
        if !config.low.is_finite() || !config.high.is_finite() || config.low >= config.high {
            return Err(MixgradError::hyperparameter(
                "low/high",
                format!("[{}, {}]", config.low, config.high),
                "finite bounds with low < high",
            ));
        }

        let means = uniform(&[k, d], config.low, config.high, config.seed).requires_grad();
        // raw diagonal 0 -> exp(0) = 1, i.e. identity factors
        let raw_scale = zeros(&[k, d, d]).requires_grad();
        let log_mixing_weights = zeros(&[k]).requires_grad();

        debug!(
            component_count = k,
            feature_dim = d,
            mode = ?config.gradient_mode,
            "initialized mixture model"
        );

        Ok(Self {
            component_count: k,
            feature_dim: d,
            gradient_mode: config.gradient_mode,
            means,
            raw_scale,
            log_mixing_weights,
        })
    }

    /// Number of mixture components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Dimensionality of each observation.
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Gradient semantics used by [`forward`](Self::forward).
    #[must_use]
    pub fn gradient_mode(&self) -> GradientMode {
        self.gradient_mode
    }

    /// Component means as a `K × D` matrix.
    #[must_use]
    pub fn means(&self) -> Matrix<f32> {
        self.means.to_matrix()
    }

    /// Assembled lower-triangular scale factors, one `D × D` matrix per component.
    #[must_use]
    pub fn scale_factors(&self) -> Vec<Matrix<f32>> {
        let d = self.feature_dim;
        let factors = no_grad(|| self.raw_scale.tril_exp_diag());
        factors
            .data()
            .chunks(d * d)
            .map(|block| {
                let mut m = Matrix::zeros(d, d);
                for a in 0..d {
                    for b in 0..=a {
                        m.set(a, b, block[a * d + b]);
                    }
                }
                m
            })
            .collect()
    }

    /// Covariances `Σ_k = L_k L_kᵀ`.
    ///
    /// Entry `(a, b)` and `(b, a)` are computed by the same dot product, so
    /// the result is exactly symmetric.
    #[must_use]
    pub fn covariances(&self) -> Vec<Matrix<f32>> {
        let d = self.feature_dim;
        self.scale_factors()
            .iter()
            .map(|l| {
                let mut cov = Matrix::zeros(d, d);
                for a in 0..d {
                    for b in 0..=a {
                        let v: f32 = (0..=b).map(|c| l.get(a, c) * l.get(b, c)).sum();
                        cov.set(a, b, v);
                        cov.set(b, a, v);
                    }
                }
                cov
            })
            .collect()
    }

    /// Unnormalized mixing logits.
    #[must_use]
    pub fn log_mixing_weights(&self) -> Vec<f32> {
        self.log_mixing_weights.data().to_vec()
    }

    /// Mixing weights `softmax(log_mixing_weights)`.
    #[must_use]
    pub fn mixing_weights(&self) -> Vec<f32> {
        let k = self.component_count;
        no_grad(|| self.log_mixing_weights.view(&[1, k]).softmax())
            .data()
            .to_vec()
    }

    /// Trainable tensors: `[means, raw_scale, log_mixing_weights]`.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.means, &self.raw_scale, &self.log_mixing_weights]
    }

    /// Mutable trainable tensors, in the same order as [`parameters`](Self::parameters).
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![
            &mut self.means,
            &mut self.raw_scale,
            &mut self.log_mixing_weights,
        ]
    }

    /// Overwrite the component means, e.g. to warm-start training.
    ///
    /// The parameter keeps its identity, so an optimizer already stepping
    /// this model carries on with its state.
    ///
    /// # Errors
    ///
    /// - [`MixgradError::DimensionMismatch`] unless `means` is `K × D`
    /// - [`MixgradError::NumericalDegeneracy`] for a non-finite entry
    pub fn set_means(&mut self, means: &Matrix<f32>) -> Result<()> {
        let (k, d) = (self.component_count, self.feature_dim);
        if means.n_rows() != k {
            return Err(MixgradError::dimension_mismatch("component_count", k, means.n_rows()));
        }
        if means.n_cols() != d {
            return Err(MixgradError::dimension_mismatch("feature_dim", d, means.n_cols()));
        }
        if means.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(MixgradError::degenerate("set_means", "non-finite mean"));
        }
        self.means.data_mut().copy_from_slice(means.as_slice());
        Ok(())
    }

    /// Set `Σ_k` directly by storing the Cholesky factor of each matrix.
    ///
    /// Either every component is updated or, on error, none is.
    ///
    /// # Errors
    ///
    /// - [`MixgradError::DimensionMismatch`] unless there are `K` matrices of
    ///   shape `D × D`
    /// - [`MixgradError::NumericalDegeneracy`] if a matrix is not finite,
    ///   not symmetric or not positive definite
    pub fn set_covariances(&mut self, covariances: &[Matrix<f32>]) -> Result<()> {
        let (k, d) = (self.component_count, self.feature_dim);
        if covariances.len() != k {
            return Err(MixgradError::dimension_mismatch(
                "component_count",
                k,
                covariances.len(),
            ));
        }

        let mut raw = Vec::with_capacity(k * d * d);
        for (idx, cov) in covariances.iter().enumerate() {
            if cov.shape() != (d, d) {
                return Err(MixgradError::DimensionMismatch {
                    expected: format!("{d}x{d} covariance"),
                    actual: format!("{}x{}", cov.n_rows(), cov.n_cols()),
                });
            }
            let finite = cov.as_slice().iter().all(|v| v.is_finite());
            if !finite || !cov.is_symmetric(Self::SYMMETRY_TOL) {
                return Err(MixgradError::degenerate(
                    "set_covariances",
                    format!("component {idx} is not a finite symmetric matrix"),
                ));
            }
            let l = cov.cholesky().map_err(|reason| {
                MixgradError::degenerate("set_covariances", format!("component {idx}: {reason}"))
            })?;

            for a in 0..d {
                for b in 0..d {
                    raw.push(match a.cmp(&b) {
                        Ordering::Greater => l.get(a, b),
                        Ordering::Equal => l.get(a, a).ln(),
                        Ordering::Less => 0.0,
                    });
                }
            }
        }

        self.raw_scale.data_mut().copy_from_slice(&raw);
        Ok(())
    }

    /// Posterior responsibilities, an `n × K` row-stochastic tensor (E-step).
    ///
    /// Recorded on the tape unless the model uses [`GradientMode::Detached`].
    ///
    /// # Errors
    ///
    /// - [`MixgradError::InvalidShape`] if `x` has no rows
    /// - [`MixgradError::DimensionMismatch`] if `x` has the wrong number of columns
    /// - [`MixgradError::NumericalDegeneracy`] on non-finite inputs or parameters
    pub fn responsibilities(&self, x: &Matrix<f32>) -> Result<Tensor> {
        let log_joint = self.log_joint(x)?;
        Ok(self.gate(normalize_rows(&log_joint)))
    }

    /// Average negative expected complete-data log-likelihood (M-step).
    ///
    /// `-(1/n) Σ_i Σ_k r_ik (log π_k + log N(x_i; μ_k, Σ_k))`
    ///
    /// `responsibilities` may be any `n × K` weighting. Gradients flow into it
    /// only if it is itself on the tape.
    ///
    /// # Errors
    ///
    /// Same as [`responsibilities`](Self::responsibilities), plus
    /// [`MixgradError::DimensionMismatch`] if `responsibilities` is not `n × K`
    /// and [`MixgradError::NumericalDegeneracy`] if it holds non-finite values.
    pub fn loss(&self, x: &Matrix<f32>, responsibilities: &Tensor) -> Result<Tensor> {
        let log_joint = self.log_joint(x)?;

        let expected = [x.n_rows(), self.component_count];
        if responsibilities.shape() != expected {
            return Err(MixgradError::DimensionMismatch {
                expected: format!("responsibilities={expected:?}"),
                actual: format!("{:?}", responsibilities.shape()),
            });
        }
        if responsibilities.data().iter().any(|v| !v.is_finite()) {
            warn!("non-finite responsibility weights");
            return Err(MixgradError::degenerate(
                "loss",
                "responsibilities contain non-finite values",
            ));
        }

        Ok(expected_nll(responsibilities, &log_joint))
    }

    /// Training objective: responsibilities followed by the loss.
    ///
    /// The log-joint densities are evaluated once and shared by both steps.
    ///
    /// Every call appends its operations to the thread-local tape. A loop
    /// that drives `forward` directly must call
    /// [`clear_graph`](crate::autograd::clear_graph) between iterations or
    /// the tape keeps growing; [`Trainer::fit`](crate::train::Trainer::fit)
    /// does this for you.
    ///
    /// # Errors
    ///
    /// Same as [`responsibilities`](Self::responsibilities).
    pub fn forward(&self, x: &Matrix<f32>) -> Result<Tensor> {
        let log_joint = self.log_joint(x)?;
        let resp = self.gate(normalize_rows(&log_joint));
        Ok(expected_nll(&resp, &log_joint))
    }

    /// Current responsibilities as a plain matrix, without touching the tape.
    ///
    /// Callable at any time, including before training.
    ///
    /// # Errors
    ///
    /// Same as [`responsibilities`](Self::responsibilities).
    pub fn predict(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        no_grad(|| self.responsibilities(x)).map(|r| r.to_matrix())
    }

    /// Most responsible component per observation (first on ties).
    ///
    /// # Errors
    ///
    /// Same as [`responsibilities`](Self::responsibilities).
    pub fn predict_labels(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        let resp = self.predict(x)?;
        Ok((0..resp.n_rows())
            .map(|i| {
                resp.row(i)
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (k, &p)| {
                        if p > best.1 {
                            (k, p)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect())
    }

    /// Average log-likelihood `(1/n) Σ_i log Σ_k π_k N(x_i; μ_k, Σ_k)`.
    ///
    /// # Errors
    ///
    /// Same as [`responsibilities`](Self::responsibilities).
    pub fn score(&self, x: &Matrix<f32>) -> Result<f32> {
        no_grad(|| -> Result<f32> {
            let log_joint = self.log_joint(x)?;
            Ok(log_joint.logsumexp_rows().mean().item())
        })
    }

    /// `log π_k + log N(x_i; μ_k, Σ_k)` as an `n × K` tensor.
    fn log_joint(&self, x: &Matrix<f32>) -> Result<Tensor> {
        self.check_observations(x)?;
        let factors = self.factors()?;
        let log_priors = self.log_priors()?;

        if self.means.data().iter().any(|v| !v.is_finite()) {
            warn!("non-finite component mean");
            return Err(MixgradError::degenerate("means", "contain non-finite values"));
        }

        let log_joint =
            Tensor::gaussian_log_density(x, &self.means, &factors).broadcast_add(&log_priors);

        let k = self.component_count;
        if let Some(row) = log_joint
            .data()
            .chunks(k)
            .position(|r| r.iter().any(|v| !v.is_finite()))
        {
            warn!(row, "responsibility normalizer is not finite");
            return Err(MixgradError::degenerate(
                "responsibilities",
                format!("row {row} has a non-finite log-density"),
            ));
        }

        Ok(log_joint)
    }

    fn check_observations(&self, x: &Matrix<f32>) -> Result<()> {
        if x.n_rows() == 0 {
            return Err(MixgradError::InvalidShape {
                param: "observations".to_string(),
                reason: "must contain at least one row".to_string(),
            });
        }
        if x.n_cols() != self.feature_dim {
            return Err(MixgradError::dimension_mismatch(
                "feature_dim",
                self.feature_dim,
                x.n_cols(),
            ));
        }
        if let Some(pos) = x.as_slice().iter().position(|v| !v.is_finite()) {
            let (row, col) = (pos / self.feature_dim, pos % self.feature_dim);
            warn!(row, col, "non-finite observation");
            return Err(MixgradError::degenerate(
                "observations",
                format!("non-finite value at row {row}, column {col}"),
            ));
        }
        Ok(())
    }

    /// Assembled factors; rejects diagonals that under- or overflowed.
    fn factors(&self) -> Result<Tensor> {
        let d = self.feature_dim;
        let factors = self.raw_scale.tril_exp_diag();

        for (k, block) in factors.data().chunks(d * d).enumerate() {
            if let Some(pos) = block.iter().position(|v| !v.is_finite()) {
                warn!(component = k, pos, "non-finite scale factor entry");
                return Err(MixgradError::degenerate(
                    "scale_factors",
                    format!("component {k} has a non-finite entry"),
                ));
            }
            if let Some(a) = (0..d).find(|&a| block[a * d + a] <= 0.0) {
                warn!(component = k, index = a, "scale factor diagonal collapsed to zero");
                return Err(MixgradError::degenerate(
                    "scale_factors",
                    format!("component {k} has a non-positive diagonal entry at index {a}"),
                ));
            }
        }

        Ok(factors)
    }

    /// `log_softmax(log_mixing_weights)` as a `[K]` tensor.
    fn log_priors(&self) -> Result<Tensor> {
        let k = self.component_count;
        if self.log_mixing_weights.data().iter().any(|v| !v.is_finite()) {
            warn!("non-finite mixing logit");
            return Err(MixgradError::degenerate(
                "log_mixing_weights",
                "contain non-finite values",
            ));
        }
        Ok(self
            .log_mixing_weights
            .view(&[1, k])
            .log_softmax()
            .view(&[k]))
    }

    fn gate(&self, responsibilities: Tensor) -> Tensor {
        match self.gradient_mode {
            GradientMode::Joint => responsibilities,
            GradientMode::Detached => responsibilities.detach(),
        }
    }
}

/// Row-wise `exp(log_softmax)`; rows are finite by the time this runs.
fn normalize_rows(log_joint: &Tensor) -> Tensor {
    log_joint.log_softmax().exp()
}

fn expected_nll(responsibilities: &Tensor, log_joint: &Tensor) -> Tensor {
    responsibilities.mul(log_joint).sum_rows().mean().neg()
}


#[cfg(test)]
mod tests_mixture_contract;
