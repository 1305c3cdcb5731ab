//! Gradient function trait and implementations.
//!
//! Each differentiable operation implements `GradFn` to define
//! how gradients flow backward through the operation.

use super::tensor::Tensor;

/// Trait for functions that compute gradients during backward pass.
///
/// Each differentiable operation creates a `GradFn` implementation
/// that captures the necessary context for gradient computation.
///
/// # Example Implementation
///
/// For element-wise multiplication z = x * y:
/// - ∂z/∂x = y
/// - ∂z/∂y = x
///
/// So `backward(grad_output)` returns [`grad_output * y`, `grad_output * x`].
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs.
    ///
    /// # Arguments
    ///
    /// * `grad_output` - Gradient flowing back from downstream operations
    ///
    /// # Returns
    ///
    /// Vector of gradients, one for each input tensor.
    /// The order must match the input order used during forward pass.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Element-wise Operations
// ============================================================================

/// Gradient function for multiplication: z = x * y
pub(crate) struct MulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x*y)/∂x = y, ∂(x*y)/∂y = x
        let grad_x: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.y.data())
            .map(|(&g, &y)| g * y)
            .collect();
        let grad_y: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data())
            .map(|(&g, &x)| g * x)
            .collect();

        vec![
            Tensor::from_vec(grad_x, self.x.shape()),
            Tensor::from_vec(grad_y, self.y.shape()),
        ]
    }

    fn name(&self) -> &'static str {
        "MulBackward"
    }
}

/// Gradient function for negation: z = -x
pub(crate) struct NegBackward;

impl GradFn for NegBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(-x)/∂x = -1
        let grad_data: Vec<f32> = grad_output.data().iter().map(|&g| -g).collect();
        vec![Tensor::from_vec(grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "NegBackward"
    }
}

/// Gradient function for exp: z = exp(x)
pub(crate) struct ExpBackward {
    pub(crate) output: Tensor, // exp(x) - we save the output, not input
}

impl GradFn for ExpBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂exp(x)/∂x = exp(x)
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.output.data())
            .map(|(&g, &exp_x)| g * exp_x)
            .collect();
        vec![Tensor::from_vec(grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "ExpBackward"
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

/// Gradient function for sum: z = sum(x)
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂sum(x)/∂x_i = 1 for all i
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        vec![Tensor::from_vec(vec![g; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}

/// Gradient function for mean: z = mean(x)
pub(crate) struct MeanBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for MeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂mean(x)/∂x_i = 1/n for all i
        let numel: usize = self.input_shape.iter().product();
        let grad_val = grad_output.item() / numel as f32;
        vec![Tensor::from_vec(vec![grad_val; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "MeanBackward"
    }
}

/// Gradient function for a row sum of a 2D tensor: `z_i = Σ_j x_ij`
pub(crate) struct SumRowsBackward {
    pub(crate) cols: usize,
}

impl GradFn for SumRowsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let rows = grad_output.numel();
        let grad: Vec<f32> = grad_output
            .data()
            .iter()
            .flat_map(|&g| std::iter::repeat(g).take(self.cols))
            .collect();
        vec![Tensor::from_vec(grad, &[rows, self.cols])]
    }

    fn name(&self) -> &'static str {
        "SumRowsBackward"
    }
}

/// Gradient function for row-wise log-sum-exp of a 2D tensor.
///
/// ∂`lse(x_i)`/∂`x_ij` = softmax(`x_i`)_j
pub(crate) struct LogSumExpBackward {
    pub(crate) softmax: Tensor,
}

impl GradFn for LogSumExpBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let cols = self.softmax.shape()[1];
        let grad: Vec<f32> = self
            .softmax
            .data()
            .chunks(cols)
            .zip(grad_output.data())
            .flat_map(|(row, &g)| row.iter().map(move |&p| g * p))
            .collect();
        vec![Tensor::from_vec(grad, self.softmax.shape())]
    }

    fn name(&self) -> &'static str {
        "LogSumExpBackward"
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

/// Gradient function for Softmax over last dimension of 2D tensor
/// For y = softmax(x), the gradient is:
/// ∂`L/∂x_i` = `y_i` * (`g_i` - `Σ_j` `g_j` * `y_j`)
pub(crate) struct SoftmaxBackward {
    pub(crate) output: Tensor, // softmax output (needed for gradient)
}

impl GradFn for SoftmaxBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let features = self.output.shape()[1];
        let mut grad_input = vec![0.0; self.output.numel()];

        for ((out, g), dst) in self
            .output
            .data()
            .chunks(features)
            .zip(grad_output.data().chunks(features))
            .zip(grad_input.chunks_mut(features))
        {
            let dot: f32 = out.iter().zip(g).map(|(y, g)| y * g).sum();
            for j in 0..features {
                dst[j] = out[j] * (g[j] - dot);
            }
        }

        vec![Tensor::from_vec(grad_input, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "SoftmaxBackward"
    }
}

/// Gradient function for row-wise log-softmax of a 2D tensor.
///
/// For y = `log_softmax(x)`: ∂`L/∂x_i` = `g_i` - `exp(y_i)` * `Σ_j g_j`
pub(crate) struct LogSoftmaxBackward {
    pub(crate) output: Tensor,
}

impl GradFn for LogSoftmaxBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let features = self.output.shape()[1];
        let mut grad_input = vec![0.0; self.output.numel()];

        for ((out, g), dst) in self
            .output
            .data()
            .chunks(features)
            .zip(grad_output.data().chunks(features))
            .zip(grad_input.chunks_mut(features))
        {
            let g_sum: f32 = g.iter().sum();
            for j in 0..features {
                dst[j] = g[j] - out[j].exp() * g_sum;
            }
        }

        vec![Tensor::from_vec(grad_input, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "LogSoftmaxBackward"
    }
}

// ============================================================================
// Shape Operations
// ============================================================================

/// Gradient function for broadcast addition: z = matrix + vector (over rows)
pub(crate) struct BroadcastAddBackward {
    pub(crate) x_shape: Vec<usize>,
    pub(crate) y_shape: Vec<usize>,
}

impl GradFn for BroadcastAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // The matrix receives the gradient as-is; the vector sums it over rows.
        let cols = self.y_shape[0];
        let mut grad_y = vec![0.0; cols];
        for row in grad_output.data().chunks(cols) {
            for (acc, &g) in grad_y.iter_mut().zip(row) {
                *acc += g;
            }
        }

        vec![
            Tensor::new(grad_output.data(), &self.x_shape),
            Tensor::from_vec(grad_y, &self.y_shape),
        ]
    }

    fn name(&self) -> &'static str {
        "BroadcastAddBackward"
    }
}

/// Gradient function for view/reshape
pub(crate) struct ViewBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for ViewBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![Tensor::new(grad_output.data(), &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "ViewBackward"
    }
}

// ============================================================================
// Gaussian Operations
// ============================================================================

/// Gradient function for assembling lower-triangular factors from raw storage.
///
/// Strictly-lower entries pass through, the diagonal is `exp(raw)` and the
/// upper triangle is zero, so its gradient is zero as well.
pub(crate) struct TrilExpDiagBackward {
    pub(crate) output: Tensor,
    pub(crate) dim: usize,
}

impl GradFn for TrilExpDiagBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let d = self.dim;
        let mut grad = vec![0.0; grad_output.numel()];

        for ((g, out), dst) in grad_output
            .data()
            .chunks(d * d)
            .zip(self.output.data().chunks(d * d))
            .zip(grad.chunks_mut(d * d))
        {
            for a in 0..d {
                for b in 0..a {
                    dst[a * d + b] = g[a * d + b];
                }
                dst[a * d + a] = g[a * d + a] * out[a * d + a];
            }
        }

        vec![Tensor::from_vec(grad, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "TrilExpDiagBackward"
    }
}

/// Gradient function for per-component Gaussian log-densities.
///
/// With `z = L⁻¹(x - μ)` and `w = L⁻ᵀ z`:
/// - ∂ log N / ∂μ = w
/// - ∂ log N / ∂`L_ab` = `w_a` `z_b` (a ≥ b), minus `1/L_aa` on the diagonal
pub(crate) struct GaussianLogDensityBackward {
    pub(crate) x: Vec<f32>,
    pub(crate) means: Tensor,
    pub(crate) factors: Tensor,
}

impl GradFn for GaussianLogDensityBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let k_total = self.means.shape()[0];
        let d = self.means.shape()[1];
        let n = grad_output.shape()[0];

        let mut grad_means = vec![0.0; k_total * d];
        let mut grad_factors = vec![0.0; k_total * d * d];
        let mut z = vec![0.0; d];
        let mut w = vec![0.0; d];

        for k in 0..k_total {
            let mean = &self.means.data()[k * d..(k + 1) * d];
            let l = &self.factors.data()[k * d * d..(k + 1) * d * d];
            let gm = &mut grad_means[k * d..(k + 1) * d];
            let gl = &mut grad_factors[k * d * d..(k + 1) * d * d];

            let mut g_total = 0.0;
            for i in 0..n {
                let g = grad_output.data()[i * k_total + k];
                if g == 0.0 {
                    continue;
                }
                g_total += g;

                let sample = &self.x[i * d..(i + 1) * d];
                forward_substitute(l, d, sample, mean, &mut z);
                back_substitute(l, d, &z, &mut w);

                for a in 0..d {
                    gm[a] += g * w[a];
                    for b in 0..=a {
                        gl[a * d + b] += g * w[a] * z[b];
                    }
                }
            }

            for a in 0..d {
                gl[a * d + a] -= g_total / l[a * d + a];
            }
        }

        vec![
            Tensor::from_vec(grad_means, self.means.shape()),
            Tensor::from_vec(grad_factors, self.factors.shape()),
        ]
    }

    fn name(&self) -> &'static str {
        "GaussianLogDensityBackward"
    }
}

/// Solve `L z = x - μ` for lower-triangular `L` (row-major `d × d`).
pub(crate) fn forward_substitute(l: &[f32], d: usize, x: &[f32], mean: &[f32], z: &mut [f32]) {
    for i in 0..d {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[i * d + j] * z[j];
        }
        z[i] = (x[i] - mean[i] - sum) / l[i * d + i];
    }
}

/// Solve `Lᵀ w = z` for lower-triangular `L` (row-major `d × d`).
pub(crate) fn back_substitute(l: &[f32], d: usize, z: &[f32], w: &mut [f32]) {
    for i in (0..d).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..d {
            sum += l[j * d + i] * w[j];
        }
        w[i] = (z[i] - sum) / l[i * d + i];
    }
}
