//! Parameter initialization.
//!
//! All samplers take an optional seed; `None` draws from OS entropy.

use crate::autograd::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Uniform distribution initialization.
///
/// Samples every element independently from U[low, high].
///
/// # Panics
///
/// Panics if `low > high`.
///
/// # Example
///
/// ```
/// use mixgrad::init::uniform;
///
/// let t = uniform(&[3, 2], -4.0, 4.0, Some(42));
/// assert!(t.data().iter().all(|v| (-4.0..=4.0).contains(v)));
/// ```
#[must_use]
pub fn uniform(shape: &[usize], low: f32, high: f32, seed: Option<u64>) -> Tensor {
    let numel: usize = shape.iter().product();
    let mut rng = rng_from(seed);

    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..=high)).collect();

    Tensor::from_vec(data, shape)
}

/// Constant initialization.
#[must_use]
pub fn constant(shape: &[usize], value: f32) -> Tensor {
    let numel: usize = shape.iter().product();
    Tensor::from_vec(vec![value; numel], shape)
}

/// Zeros initialization.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    constant(shape, 0.0)
}
