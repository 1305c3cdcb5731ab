// =========================================================================
// FALSIFY-MX: gradient-trained Gaussian mixture contract
//
// Each test tries to break one structural guarantee of MixtureModel:
// valid covariances, normalized weights, row-stochastic responsibilities,
// side-effect-free inference and shape validation.
//
// References:
//   - Bishop (2006) "Pattern Recognition and Machine Learning", §9.2
//   - Pinheiro & Bates (1996) "Unconstrained parametrizations for
//     variance-covariance matrices"
// =========================================================================

use super::*;

fn perturbed_model(k: usize, d: usize, seed: u64) -> MixtureModel {
    let mut model =
        MixtureModel::from_config(&MixtureConfig::new(k, d).with_seed(seed)).expect("valid shape");
    let noise = uniform(&[k, d, d], -1.5, 1.5, Some(seed + 1));
    model.parameters_mut()[1]
        .data_mut()
        .copy_from_slice(noise.data());
    let logits = uniform(&[k], -3.0, 3.0, Some(seed + 2));
    model.parameters_mut()[2]
        .data_mut()
        .copy_from_slice(logits.data());
    model
}

/// FALSIFY-MX-001: Covariances are symmetric
#[test]
fn falsify_mx_001_covariances_symmetric() {
    let model = perturbed_model(4, 3, 42);
    for (k, cov) in model.covariances().iter().enumerate() {
        assert!(
            cov.is_symmetric(0.0),
            "FALSIFIED MX-001: covariance {k} is not symmetric"
        );
    }
}

/// FALSIFY-MX-002: Covariances are positive definite for any raw storage
#[test]
fn falsify_mx_002_covariances_positive_definite() {
    for seed in 0..10 {
        let model = perturbed_model(3, 3, seed);
        for (k, cov) in model.covariances().iter().enumerate() {
            assert!(
                cov.cholesky().is_ok(),
                "FALSIFIED MX-002: covariance {k} (seed {seed}) is not positive definite"
            );
        }
    }
}

/// FALSIFY-MX-003: Mixing weights sum to 1.0 and lie in (0, 1)
#[test]
fn falsify_mx_003_weights_normalized() {
    let model = perturbed_model(5, 1, 7);
    let weights = model.mixing_weights();
    let sum: f32 = weights.iter().sum();

    assert!(
        (sum - 1.0).abs() < 1e-5,
        "FALSIFIED MX-003: weights sum={sum}, expected 1.0"
    );
    assert!(
        weights.iter().all(|&w| w > 0.0 && w < 1.0),
        "FALSIFIED MX-003: weights {weights:?} outside (0, 1)"
    );
}

/// FALSIFY-MX-004: Responsibility rows sum to 1.0
#[test]
fn falsify_mx_004_responsibility_rows_sum_to_one() {
    let model = perturbed_model(3, 2, 13);
    let x = Matrix::from_vec(
        5,
        2,
        vec![0.0, 0.0, 1.0, 2.0, -3.0, 0.5, 7.0, -7.0, 0.25, 0.25],
    )
    .expect("valid matrix");

    let resp = model.predict(&x).expect("finite input");
    for i in 0..resp.n_rows() {
        let sum: f32 = resp.row(i).iter().sum();
        assert!(
            (sum - 1.0).abs() < 1e-5,
            "FALSIFIED MX-004: row {i} sums to {sum}"
        );
    }
}

/// FALSIFY-MX-005: predict is idempotent
#[test]
fn falsify_mx_005_predict_idempotent() {
    let model = perturbed_model(3, 2, 99);
    let x = Matrix::from_vec(3, 2, vec![0.5, -0.5, 2.0, 1.0, -1.0, -4.0]).expect("valid matrix");

    let first = model.predict(&x).expect("finite input");
    let second = model.predict(&x).expect("finite input");
    assert_eq!(first, second, "FALSIFIED MX-005: predict changed between calls");
}

/// FALSIFY-MX-006: Default initialization (K=2, D=1)
#[test]
fn falsify_mx_006_default_initialization() {
    let model = MixtureModel::new(2, 1).expect("valid shape");
    let identity = Matrix::from_vec(1, 1, vec![1.0]).expect("valid matrix");

    for (k, l) in model.scale_factors().iter().enumerate() {
        assert_eq!(
            l, &identity,
            "FALSIFIED MX-006: scale factor {k} is not [[1.0]]"
        );
    }
    assert_eq!(
        model.log_mixing_weights(),
        vec![0.0, 0.0],
        "FALSIFIED MX-006: log mixing weights not zero"
    );
    assert_eq!(
        model.mixing_weights(),
        vec![0.5, 0.5],
        "FALSIFIED MX-006: mixing weights not uniform"
    );
    assert!(
        model.means().as_slice().iter().all(|m| (-4.0..=4.0).contains(m)),
        "FALSIFIED MX-006: means outside [-4, 4]"
    );
}

/// FALSIFY-MX-007: A single component takes full responsibility
#[test]
fn falsify_mx_007_single_component_all_ones() {
    let model = perturbed_model(1, 2, 5);
    let x = Matrix::from_vec(4, 2, vec![0.0, 0.0, 100.0, -100.0, 3.0, 1.0, -2.0, 8.0])
        .expect("valid matrix");

    let resp = model.predict(&x).expect("finite input");
    assert_eq!(resp.shape(), (4, 1));
    assert!(
        resp.as_slice().iter().all(|&r| r == 1.0),
        "FALSIFIED MX-007: responsibilities {:?} not all ones",
        resp.as_slice()
    );
}

/// FALSIFY-MX-008: Zero components is an invalid shape
#[test]
fn falsify_mx_008_zero_components_rejected() {
    let result = MixtureModel::new(0, 1);
    assert!(
        matches!(result, Err(MixgradError::InvalidShape { .. })),
        "FALSIFIED MX-008: K=0 accepted"
    );
}

/// FALSIFY-MX-009: Wrong feature dimension is a dimension mismatch
#[test]
fn falsify_mx_009_wrong_dimension_rejected() {
    let model = MixtureModel::new(2, 3).expect("valid shape");
    let x = Matrix::from_vec(2, 2, vec![0.0, 1.0, 2.0, 3.0]).expect("valid matrix");

    let err = model.responsibilities(&x).expect_err("dimension mismatch");
    assert_eq!(
        err,
        MixgradError::dimension_mismatch("feature_dim", 3, 2),
        "FALSIFIED MX-009: unexpected error {err}"
    );
}

/// FALSIFY-MX-010: Extreme outliers keep finite responsibilities
#[test]
fn falsify_mx_010_outlier_row_finite() {
    let mut model = MixtureModel::new(2, 1).expect("valid shape");
    model.parameters_mut()[0]
        .data_mut()
        .copy_from_slice(&[-3.0, 3.0]);
    let x = Matrix::from_vec(2, 1, vec![1.0e6, -3.0]).expect("valid matrix");

    let resp = model.predict(&x).expect("outlier is handled in log space");
    assert!(
        resp.as_slice().iter().all(|r| r.is_finite()),
        "FALSIFIED MX-010: non-finite responsibilities {:?}",
        resp.as_slice()
    );
    assert!(
        resp.get(0, 1) > 0.999,
        "FALSIFIED MX-010: outlier not assigned to the nearest component"
    );
}
