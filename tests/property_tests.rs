//! Property-based tests using proptest.
//!
//! These tests verify invariants of the mixture model that must hold for
//! any parameter values and any finite input.

use mixgrad::prelude::*;
use proptest::prelude::*;

// Strategy for generating observation matrices
fn matrix_strategy(rows: usize, cols: usize) -> impl Strategy<Value = Matrix<f32>> {
    proptest::collection::vec(-50.0f32..50.0, rows * cols).prop_map(move |data| {
        Matrix::from_vec(rows, cols, data).expect("Test data should be valid")
    })
}

// Strategy for generating mixing logits of any length 1..=6
fn logits_strategy(range: std::ops::Range<f32>) -> impl Strategy<Value = Vec<f32>> {
    (1usize..=6).prop_flat_map(move |k| proptest::collection::vec(range.clone(), k))
}

fn model_with(k: usize, d: usize, seed: u64, raw_scale: &[f32]) -> MixtureModel {
    let mut model =
        MixtureModel::from_config(&MixtureConfig::new(k, d).with_seed(seed)).expect("valid shape");
    model.parameters_mut()[1]
        .data_mut()
        .copy_from_slice(raw_scale);
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn mixing_weights_in_open_unit_interval(logits in logits_strategy(-5.0..5.0)) {
        let k = logits.len();
        let mut model = MixtureModel::new(k, 1).expect("valid shape");
        model.parameters_mut()[2].data_mut().copy_from_slice(&logits);

        let weights = model.mixing_weights();
        let sum: f32 = weights.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-5);
        if k > 1 {
            prop_assert!(weights.iter().all(|&w| w > 0.0 && w < 1.0));
        }
    }

    #[test]
    fn mixing_weights_normalized_for_wide_logits(logits in logits_strategy(-500.0..500.0)) {
        let mut model = MixtureModel::new(logits.len(), 1).expect("valid shape");
        model.parameters_mut()[2].data_mut().copy_from_slice(&logits);

        let weights = model.mixing_weights();
        let sum: f32 = weights.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-5);
        prop_assert!(weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }

    #[test]
    fn covariances_symmetric_positive_definite(
        raw in proptest::collection::vec(-2.0f32..2.0, 2 * 3 * 3),
        seed in 0u64..1000,
    ) {
        let model = model_with(2, 3, seed, &raw);
        for cov in model.covariances() {
            prop_assert!(cov.is_symmetric(0.0));
            prop_assert!(cov.cholesky().is_ok());
        }
    }

    #[test]
    fn set_covariances_round_trips(entries in proptest::collection::vec(-2.0f32..2.0, 2 * 3 * 3)) {
        // Σ_k = A_k A_kᵀ + 0.5 I
        let covs: Vec<Matrix<f32>> = entries
            .chunks(9)
            .map(|a| {
                let mut cov = Matrix::zeros(3, 3);
                for i in 0..3 {
                    for j in 0..3 {
                        let dot: f32 = (0..3).map(|c| a[i * 3 + c] * a[j * 3 + c]).sum();
                        cov.set(i, j, dot + if i == j { 0.5 } else { 0.0 });
                    }
                }
                cov
            })
            .collect();

        let mut model = MixtureModel::new(2, 3).expect("valid shape");
        model.set_covariances(&covs).expect("positive definite");
        for (got, want) in model.covariances().iter().zip(&covs) {
            for (x, y) in got.as_slice().iter().zip(want.as_slice()) {
                prop_assert!((x - y).abs() <= 1e-3 * (1.0 + y.abs()), "{} vs {}", x, y);
            }
        }
    }

    #[test]
    fn scale_factors_lower_triangular_with_positive_diagonal(
        raw in proptest::collection::vec(-3.0f32..3.0, 3 * 2 * 2),
    ) {
        let model = model_with(3, 2, 0, &raw);
        for l in model.scale_factors() {
            prop_assert_eq!(l.get(0, 1), 0.0);
            prop_assert!(l.get(0, 0) > 0.0);
            prop_assert!(l.get(1, 1) > 0.0);
        }
    }

    #[test]
    fn responsibility_rows_sum_to_one(x in matrix_strategy(8, 2), seed in 0u64..1000) {
        let model = MixtureModel::from_config(&MixtureConfig::new(3, 2).with_seed(seed))
            .expect("valid shape");
        let resp = model.predict(&x).expect("finite input");

        for i in 0..resp.n_rows() {
            let row = resp.row(i);
            let sum: f32 = row.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-4);
            prop_assert!(row.iter().all(|&r| (0.0..=1.0).contains(&r)));
        }
    }

    #[test]
    fn predict_is_idempotent(x in matrix_strategy(5, 1), seed in 0u64..1000) {
        let model = MixtureModel::from_config(&MixtureConfig::new(2, 1).with_seed(seed))
            .expect("valid shape");
        let first = model.predict(&x).expect("finite input");
        let second = model.predict(&x).expect("finite input");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn single_component_takes_all_responsibility(x in matrix_strategy(6, 3), seed in 0u64..1000) {
        let model = MixtureModel::from_config(&MixtureConfig::new(1, 3).with_seed(seed))
            .expect("valid shape");
        let resp = model.predict(&x).expect("finite input");
        prop_assert!(resp.as_slice().iter().all(|&r| r == 1.0));
    }

    #[test]
    fn labels_point_at_row_maximum(x in matrix_strategy(6, 2), seed in 0u64..1000) {
        let model = MixtureModel::from_config(&MixtureConfig::new(3, 2).with_seed(seed))
            .expect("valid shape");
        let resp = model.predict(&x).expect("finite input");
        let labels = model.predict_labels(&x).expect("finite input");

        for (i, &label) in labels.iter().enumerate() {
            let row = resp.row(i);
            prop_assert!(row.iter().all(|&r| r <= row[label]));
        }
    }

    #[test]
    fn score_is_finite(x in matrix_strategy(4, 2), seed in 0u64..1000) {
        let model = MixtureModel::from_config(&MixtureConfig::new(2, 2).with_seed(seed))
            .expect("valid shape");
        let score = model.score(&x).expect("finite input");
        prop_assert!(score.is_finite());
    }
}
