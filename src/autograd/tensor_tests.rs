use super::*;

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]);
    assert_eq!(t.shape(), &[3, 2]);
    assert_eq!(t.numel(), 6);
    assert_eq!(t.ndim(), 2);
    assert!(t.is_leaf());
    assert!(!t.requires_grad_enabled());
}

#[test]
#[should_panic(expected = "cannot fill shape")]
fn test_tensor_shape_mismatch_panics() {
    let _ = Tensor::new(&[1.0, 2.0, 3.0], &[2, 2]);
}

#[test]
fn test_scalar() {
    let s = Tensor::scalar(-1.5);
    assert_eq!(s.shape(), &[1]);
    assert_eq!(s.item(), -1.5);
}

#[test]
#[should_panic(expected = "needs exactly one element")]
fn test_item_rejects_vectors() {
    let _ = Tensor::from_slice(&[1.0, 2.0]).item();
}

#[test]
fn test_to_matrix() {
    let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    let m = t.to_matrix();
    assert_eq!(m.shape(), (2, 3));
    assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
}

#[test]
#[should_panic(expected = "needs a 2-D tensor")]
fn test_to_matrix_rejects_vectors() {
    let _ = Tensor::from_slice(&[1.0]).to_matrix();
}

#[test]
fn test_detach_gets_fresh_identity() {
    let t = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
    let d = t.detach();

    assert!(!d.requires_grad_enabled());
    assert!(d.is_leaf());
    assert_ne!(t.id(), d.id());
    assert_eq!(t.data(), d.data());
}

#[test]
fn test_clone_and_data_mut_keep_identity() {
    let mut t = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
    let id = t.id();
    assert_eq!(t.clone().id(), id);

    t.data_mut()[0] = 5.0;
    assert_eq!(t.id(), id);
    assert_eq!(t.data(), &[5.0, 2.0]);
}

#[test]
fn test_gradient_accumulates() {
    let mut t = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
    assert!(t.grad().is_none());

    t.accumulate_grad(&[0.5, -1.0]);
    t.accumulate_grad(&[0.25, 1.0]);
    assert_eq!(t.grad(), Some(&[0.75, 0.0][..]));
}

#[test]
fn test_recorded_output_is_not_a_leaf() {
    crate::autograd::clear_graph();
    let x = Tensor::from_slice(&[1.0]).requires_grad();
    let y = x.exp();
    assert!(!y.is_leaf());
    assert!(y.requires_grad_enabled());
    assert!(format!("{y:?}").contains("ExpBackward"));
    crate::autograd::clear_graph();
}
