//! Dense `f32` tensor that can take part in the tape.
//!
//! A tensor is a leaf until an op records it as an output. Leaves that
//! request gradients are the trainable parameters; their accumulated
//! gradient lives on the tape's copy and is read back through
//! [`get_grad`](super::get_grad).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::primitives::Matrix;

use super::grad_fn::GradFn;
use super::with_graph;

/// Identity of a tensor on the tape.
///
/// Clones and in-place data edits keep the id; [`Tensor::detach`] and every
/// op output get a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(u64);

impl TensorId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        TensorId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Row-major tensor with optional gradient tracking.
#[derive(Clone)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    requires_grad: bool,
    /// Set when an op produced this tensor while recording.
    grad_fn: Option<Arc<dyn GradFn>>,
    /// Accumulated gradient, same length as `data`.
    grad: Option<Vec<f32>>,
    id: TensorId,
}

impl Tensor {
    /// Copy `data` into a tensor of the given shape.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not the product of `shape`.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Take ownership of `data` as a tensor of the given shape.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not the product of `shape`.
    #[must_use]
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Self {
        let numel: usize = shape.iter().product();
        assert!(
            data.len() == numel,
            "{} values cannot fill shape {shape:?}",
            data.len()
        );
        Self {
            data,
            shape: shape.to_vec(),
            requires_grad: false,
            grad_fn: None,
            grad: None,
            id: TensorId::next(),
        }
    }

    /// 1-D tensor over `data`.
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Single-element tensor of shape `[1]`.
    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self::from_vec(vec![value], &[1])
    }

    /// Mark this tensor as a trainable leaf.
    #[must_use]
    pub fn requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    /// Whether gradients flow into or through this tensor.
    #[must_use]
    pub fn requires_grad_enabled(&self) -> bool {
        self.requires_grad
    }

    /// `true` unless an op recorded this tensor as its output.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.grad_fn.is_none()
    }

    #[must_use]
    pub fn id(&self) -> TensorId {
        self.id
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable view of the values; the id is unchanged.
    ///
    /// Optimizers update parameters through this, so state keyed by id
    /// stays attached across steps.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Copy a `[rows, cols]` tensor into a [`Matrix`].
    ///
    /// # Panics
    ///
    /// Panics if the tensor is not 2-D.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix<f32> {
        match self.shape[..] {
            [rows, cols] => Matrix::from_vec(rows, cols, self.data.clone())
                .unwrap_or_else(|_| unreachable!("tensor length matches its shape")),
            _ => panic!("to_matrix needs a 2-D tensor, got {:?}", self.shape),
        }
    }

    /// Same values, fresh id, cut off from the tape.
    #[must_use]
    pub fn detach(&self) -> Tensor {
        Self::from_vec(self.data.clone(), &self.shape)
    }

    /// The value of a single-element tensor.
    ///
    /// # Panics
    ///
    /// Panics if the tensor holds more than one value.
    #[must_use]
    pub fn item(&self) -> f32 {
        match self.data[..] {
            [value] => value,
            _ => panic!("item() needs exactly one element, got {}", self.data.len()),
        }
    }

    /// Backpropagate from this scalar through the thread's tape.
    ///
    /// # Panics
    ///
    /// Panics if the tensor holds more than one value.
    pub fn backward(&self) {
        assert!(
            self.data.len() == 1,
            "backward() needs a scalar, got shape {:?}",
            self.shape
        );
        let seed = Tensor::from_vec(vec![1.0], &self.shape);
        with_graph(|graph| graph.backward(self.id, seed));
    }

    /// Attach the op that produced this tensor.
    pub(crate) fn mark_recorded(&mut self, grad_fn: Arc<dyn GradFn>) {
        self.requires_grad = true;
        self.grad_fn = Some(grad_fn);
    }

    pub(crate) fn grad(&self) -> Option<&[f32]> {
        self.grad.as_deref()
    }

    pub(crate) fn accumulate_grad(&mut self, incoming: &[f32]) {
        match &mut self.grad {
            Some(acc) => acc.iter_mut().zip(incoming).for_each(|(a, b)| *a += b),
            None => self.grad = Some(incoming.to_vec()),
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("op", &self.grad_fn.as_ref().map(|g| g.name()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tensor_tests.rs"]
mod tests;
