//! Construction-time configuration for [`MixtureModel`](super::MixtureModel).

use serde::{Deserialize, Serialize};

/// How gradients treat the responsibilities inside
/// [`MixtureModel::forward`](super::MixtureModel::forward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientMode {
    /// Differentiate through the E-step and the M-step together.
    ///
    /// Since `Σ_k r_ik log p_ik = log p(x_i) - H(r_i)`, this minimizes the
    /// negative log-likelihood plus the mean responsibility entropy, which
    /// favours confident assignments. It has no monotone-improvement
    /// guarantee, and from an arbitrary initialization it is not expected to
    /// recover well-separated clusters: one component can settle between
    /// them and claim every point.
    Joint,
    /// Treat responsibilities as constants in the loss (classical EM).
    ///
    /// The resulting gradient is exactly the gradient of the average
    /// negative log-likelihood at the current parameters.
    #[default]
    Detached,
}

/// Configuration for a [`MixtureModel`](super::MixtureModel).
///
/// # Examples
///
/// ```
/// use mixgrad::mixture::{GradientMode, MixtureConfig};
///
/// let config = MixtureConfig::new(3, 2)
///     .with_bounds(-1.0, 1.0)
///     .with_seed(7)
///     .with_gradient_mode(GradientMode::Joint);
/// assert_eq!(config.component_count, 3);
/// assert_eq!(config.seed, Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixtureConfig {
    /// Number of mixture components (K).
    pub component_count: usize,
    /// Dimensionality of each observation (D).
    pub feature_dim: usize,
    /// Lower bound of the uniform mean initialization.
    pub low: f32,
    /// Upper bound of the uniform mean initialization.
    pub high: f32,
    /// Seed for mean initialization; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Gradient semantics of `forward`.
    pub gradient_mode: GradientMode,
}

impl MixtureConfig {
    /// Default lower initialization bound.
    pub const DEFAULT_LOW: f32 = -4.0;
    /// Default upper initialization bound.
    pub const DEFAULT_HIGH: f32 = 4.0;

    /// Configuration with default bounds, no seed and detached gradients.
    #[must_use]
    pub fn new(component_count: usize, feature_dim: usize) -> Self {
        Self {
            component_count,
            feature_dim,
            low: Self::DEFAULT_LOW,
            high: Self::DEFAULT_HIGH,
            seed: None,
            gradient_mode: GradientMode::Detached,
        }
    }

    /// Set the uniform initialization range for the means.
    #[must_use]
    pub fn with_bounds(mut self, low: f32, high: f32) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Set random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set gradient semantics.
    #[must_use]
    pub fn with_gradient_mode(mut self, mode: GradientMode) -> Self {
        self.gradient_mode = mode;
        self
    }
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self::new(2, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MixtureConfig::default();
        assert_eq!(config.component_count, 2);
        assert_eq!(config.feature_dim, 1);
        assert_eq!(config.low, -4.0);
        assert_eq!(config.high, 4.0);
        assert_eq!(config.seed, None);
        assert_eq!(config.gradient_mode, GradientMode::Detached);
    }

    #[test]
    fn test_new_uses_default_gradient_mode() {
        assert_eq!(
            MixtureConfig::new(3, 2).gradient_mode,
            GradientMode::default()
        );
        assert_eq!(GradientMode::default(), GradientMode::Detached);
    }

    #[test]
    fn test_builder_chain() {
        let config = MixtureConfig::new(4, 3)
            .with_bounds(0.0, 2.0)
            .with_gradient_mode(GradientMode::Joint);
        assert_eq!((config.low, config.high), (0.0, 2.0));
        assert_eq!(config.gradient_mode, GradientMode::Joint);
    }
}
