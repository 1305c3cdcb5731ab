//! Differentiable Gaussian building blocks.
//!
//! Covariances are never formed or inverted here: densities are evaluated
//! through a triangular solve against the lower factor `L` of `Σ = L Lᵀ`, and
//! `log |Σ| = 2 Σ_a log L_aa`.

use std::sync::Arc;

use super::record_op;
use crate::autograd::grad_fn::{forward_substitute, GaussianLogDensityBackward, TrilExpDiagBackward};
use crate::autograd::tensor::Tensor;
use crate::primitives::Matrix;

/// `ln(2π)`
const LN_2PI: f32 = 1.837_877_1;

impl Tensor {
    /// Assemble lower-triangular factors from unconstrained storage.
    ///
    /// For each trailing `d × d` block: entries below the diagonal are
    /// copied, the diagonal becomes `exp(raw)` and the upper triangle is
    /// zeroed. Every finite input therefore yields a factor with a strictly
    /// positive diagonal, and upper entries never receive gradient.
    ///
    /// # Shape
    ///
    /// - self: `[d, d]` or `[k, d, d]`
    /// - output: same as input
    ///
    /// # Example
    ///
    /// ```
    /// use mixgrad::autograd::Tensor;
    ///
    /// let raw = Tensor::new(&[0.0, 9.0, 0.5, 0.0], &[2, 2]);
    /// let l = raw.tril_exp_diag();
    /// assert_eq!(l.data(), &[1.0, 0.0, 0.5, 1.0]);
    /// ```
    #[must_use]
    pub fn tril_exp_diag(&self) -> Tensor {
        let ndim = self.ndim();
        assert!(
            ndim == 2 || ndim == 3,
            "tril_exp_diag requires [d, d] or [k, d, d], got {:?}",
            self.shape()
        );
        let d = self.shape()[ndim - 1];
        assert_eq!(self.shape()[ndim - 2], d, "tril_exp_diag requires square blocks");

        let mut data = vec![0.0; self.numel()];
        for (raw, dst) in self.data().chunks(d * d).zip(data.chunks_mut(d * d)) {
            for a in 0..d {
                dst[a * d..a * d + a].copy_from_slice(&raw[a * d..a * d + a]);
                dst[a * d + a] = raw[a * d + a].exp();
            }
        }

        let mut result = Tensor::from_vec(data, self.shape());
        let grad_fn = Arc::new(TrilExpDiagBackward {
            output: result.detach(),
            dim: d,
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }

    /// Log-density of every observation under every Gaussian component.
    ///
    /// `out[i, k] = log N(x_i; μ_k, L_k L_kᵀ)`
    ///
    /// Gradients flow to `means` and `factors`; observations are constants.
    /// Factors must be lower-triangular with a positive diagonal (as produced
    /// by [`tril_exp_diag`](Tensor::tril_exp_diag)); entries above the
    /// diagonal are ignored.
    ///
    /// # Shape
    ///
    /// - x: `[n, d]`
    /// - means: `[k, d]`
    /// - factors: `[k, d, d]`
    /// - output: `[n, k]`
    #[must_use]
    pub fn gaussian_log_density(x: &Matrix<f32>, means: &Tensor, factors: &Tensor) -> Tensor {
        assert_eq!(means.ndim(), 2, "means must be [k, d]");
        let (k_total, d) = (means.shape()[0], means.shape()[1]);
        assert_eq!(
            factors.shape(),
            &[k_total, d, d],
            "factors must be [k, d, d] matching means"
        );
        assert_eq!(x.n_cols(), d, "observations must have {d} columns");

        let n = x.n_rows();
        let norm = 0.5 * d as f32 * LN_2PI;
        let mut out = vec![0.0; n * k_total];
        let mut z = vec![0.0; d];

        for k in 0..k_total {
            let mean = &means.data()[k * d..(k + 1) * d];
            let l = &factors.data()[k * d * d..(k + 1) * d * d];
            let log_det_half: f32 = (0..d).map(|a| l[a * d + a].ln()).sum();

            for i in 0..n {
                forward_substitute(l, d, x.row(i), mean, &mut z);
                let maha: f32 = z.iter().map(|v| v * v).sum();
                out[i * k_total + k] = -0.5 * maha - log_det_half - norm;
            }
        }

        let mut result = Tensor::from_vec(out, &[n, k_total]);
        let grad_fn = Arc::new(GaussianLogDensityBackward {
            x: x.as_slice().to_vec(),
            means: means.detach(),
            factors: factors.detach(),
        });
        record_op(&mut result, grad_fn, &[means, factors]);
        result
    }
}
