//! Differentiable operations for tensors.
//!
//! Each operation:
//! 1. Computes the forward result
//! 2. Records a `GradFn` to the computation graph (if gradient tracking is enabled)

mod gaussian;

use std::sync::Arc;

use super::grad_fn::{
    BroadcastAddBackward, ExpBackward, GradFn, LogSoftmaxBackward, LogSumExpBackward,
    MeanBackward, MulBackward, NegBackward, SoftmaxBackward, SumBackward, SumRowsBackward,
    ViewBackward,
};
use super::tensor::Tensor;
use super::{is_grad_enabled, with_graph};

/// Attach `grad_fn` to `result` and record it on the tape when any input
/// participates in gradient tracking.
pub(super) fn record_op(result: &mut Tensor, grad_fn: Arc<dyn GradFn>, inputs: &[&Tensor]) {
    if !is_grad_enabled() || !inputs.iter().any(|t| t.requires_grad_enabled()) {
        return;
    }

    result.mark_recorded(grad_fn.clone());

    with_graph(|graph| {
        for input in inputs {
            graph.register_tensor((*input).clone());
        }
        graph.record(result.id(), grad_fn, inputs.iter().map(|t| t.id()).collect());
    });
}

/// Row-wise maximum and `log Σ exp(x - max)` for a row.
fn row_log_normalizer(row: &[f32]) -> f32 {
    let max_val = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    if !max_val.is_finite() {
        return max_val;
    }
    let sum: f32 = row.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

// ============================================================================
// Element-wise Operations
// ============================================================================

impl Tensor {
    /// Element-wise multiplication: z = self * other
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    #[must_use]
    pub fn mul(&self, other: &Tensor) -> Tensor {
        assert_eq!(
            self.shape(),
            other.shape(),
            "mul requires equal shapes: {:?} vs {:?}",
            self.shape(),
            other.shape()
        );

        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| a * b)
            .collect();

        let mut result = Tensor::from_vec(data, self.shape());
        let grad_fn = Arc::new(MulBackward {
            x: self.clone(),
            y: other.clone(),
        });
        record_op(&mut result, grad_fn, &[self, other]);
        result
    }

    /// Element-wise negation: z = -self
    #[must_use]
    pub fn neg(&self) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&a| -a).collect();
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, Arc::new(NegBackward), &[self]);
        result
    }

    /// Element-wise exponential: z = exp(self)
    #[must_use]
    pub fn exp(&self) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&a| a.exp()).collect();
        let mut result = Tensor::from_vec(data, self.shape());
        let grad_fn = Arc::new(ExpBackward {
            output: result.detach(),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

impl Tensor {
    /// Sum all elements: z = sum(self)
    #[must_use]
    pub fn sum(&self) -> Tensor {
        let sum: f32 = self.data().iter().sum();
        let mut result = Tensor::scalar(sum);
        let grad_fn = Arc::new(SumBackward {
            input_shape: self.shape().to_vec(),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }

    /// Mean of all elements: z = mean(self)
    #[must_use]
    pub fn mean(&self) -> Tensor {
        let sum: f32 = self.data().iter().sum();
        let mean = sum / self.numel() as f32;
        let mut result = Tensor::scalar(mean);
        let grad_fn = Arc::new(MeanBackward {
            input_shape: self.shape().to_vec(),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }

    /// Sum each row of a 2D tensor: `[N, M] -> [N]`.
    #[must_use]
    pub fn sum_rows(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "sum_rows requires a 2D tensor");
        let (rows, cols) = (self.shape()[0], self.shape()[1]);

        let data: Vec<f32> = if cols == 0 {
            vec![0.0; rows]
        } else {
            self.data().chunks(cols).map(|r| r.iter().sum()).collect()
        };

        let mut result = Tensor::from_vec(data, &[rows]);
        record_op(&mut result, Arc::new(SumRowsBackward { cols }), &[self]);
        result
    }

    /// Row-wise log-sum-exp of a 2D tensor: `[N, M] -> [N]`.
    ///
    /// Computed as `max + log Σ exp(x - max)` so large magnitudes neither
    /// overflow nor underflow.
    #[must_use]
    pub fn logsumexp_rows(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "logsumexp_rows requires a 2D tensor");
        let cols = self.shape()[1];

        let normalizers: Vec<f32> = self.data().chunks(cols).map(row_log_normalizer).collect();
        let softmax: Vec<f32> = self
            .data()
            .chunks(cols)
            .zip(&normalizers)
            .flat_map(|(row, &lse)| row.iter().map(move |&v| (v - lse).exp()))
            .collect();

        let mut result = Tensor::from_vec(normalizers, &[self.shape()[0]]);
        let grad_fn = Arc::new(LogSumExpBackward {
            softmax: Tensor::from_vec(softmax, self.shape()),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }
}

// ============================================================================
// Normalization
// ============================================================================

impl Tensor {
    /// Softmax over the last dimension of a 2D tensor.
    ///
    /// softmax(x)_i = `exp(x_i)` / `Σ_j` `exp(x_j)`
    ///
    /// Uses numerically stable computation with max subtraction.
    #[must_use]
    pub fn softmax(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "softmax currently only supports 2D tensors");
        let features = self.shape()[1];
        let mut output = vec![0.0; self.numel()];

        for (row, dst) in self.data().chunks(features).zip(output.chunks_mut(features)) {
            let max_val = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

            let mut sum = 0.0;
            for (o, &v) in dst.iter_mut().zip(row) {
                *o = (v - max_val).exp();
                sum += *o;
            }
            for o in dst.iter_mut() {
                *o /= sum;
            }
        }

        let mut result = Tensor::from_vec(output, self.shape());
        let grad_fn = Arc::new(SoftmaxBackward {
            output: result.detach(),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }

    /// Log-softmax over the last dimension of a 2D tensor.
    ///
    /// `log_softmax(x)_i = x_i - log Σ_j exp(x_j)`, evaluated with the
    /// log-sum-exp shift so rows of very negative values stay finite.
    #[must_use]
    pub fn log_softmax(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "log_softmax requires a 2D tensor");
        let features = self.shape()[1];

        let output: Vec<f32> = self
            .data()
            .chunks(features)
            .flat_map(|row| {
                let lse = row_log_normalizer(row);
                row.iter().map(move |&v| v - lse)
            })
            .collect();

        let mut result = Tensor::from_vec(output, self.shape());
        let grad_fn = Arc::new(LogSoftmaxBackward {
            output: result.detach(),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }
}

// ============================================================================
// Shape Operations
// ============================================================================

impl Tensor {
    /// Broadcast addition: z = matrix + vector (broadcasts over rows).
    ///
    /// # Shape
    ///
    /// - self: `[N, M]` (2D matrix)
    /// - other: `[M]` (1D vector)
    /// - output: `[N, M]`
    ///
    /// # Example
    ///
    /// ```
    /// use mixgrad::autograd::Tensor;
    ///
    /// let matrix = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
    /// let bias = Tensor::new(&[10.0, 20.0], &[2]);
    /// let result = matrix.broadcast_add(&bias);
    /// assert_eq!(result.data(), &[11.0, 22.0, 13.0, 24.0]);
    /// ```
    #[must_use]
    pub fn broadcast_add(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "broadcast_add requires 2D matrix");
        assert_eq!(other.ndim(), 1, "broadcast_add requires 1D vector");
        assert_eq!(
            self.shape()[1],
            other.shape()[0],
            "Matrix columns {} must match vector length {}",
            self.shape()[1],
            other.shape()[0]
        );

        let cols = self.shape()[1];
        let data: Vec<f32> = self
            .data()
            .chunks(cols)
            .flat_map(|row| row.iter().zip(other.data()).map(|(&a, &b)| a + b))
            .collect();

        let mut result = Tensor::from_vec(data, self.shape());
        let grad_fn = Arc::new(BroadcastAddBackward {
            x_shape: self.shape().to_vec(),
            y_shape: other.shape().to_vec(),
        });
        record_op(&mut result, grad_fn, &[self, other]);
        result
    }

    /// Reshape tensor to a new shape (view).
    ///
    /// The total number of elements must remain the same.
    #[must_use]
    pub fn view(&self, new_shape: &[usize]) -> Tensor {
        let new_numel: usize = new_shape.iter().product();
        assert_eq!(
            self.numel(),
            new_numel,
            "view: number of elements must match ({} vs {new_numel})",
            self.numel()
        );

        let mut result = Tensor::new(self.data(), new_shape);
        let grad_fn = Arc::new(ViewBackward {
            input_shape: self.shape().to_vec(),
        });
        record_op(&mut result, grad_fn, &[self]);
        result
    }
}
