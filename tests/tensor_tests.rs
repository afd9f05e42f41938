use lazygrad::error::ShapeError;
use lazygrad::tensor;
use lazygrad::tensors::{Ten64, Tensor};

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.ndim(), 2);
    assert_eq!(t.len(), 4);
}

#[test]
fn test_tensor_macro() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);

    let cube = tensor!([[[1.0], [2.0]], [[3.0], [4.0]]]);
    assert_eq!(cube.shape, vec![2, 2, 1]);

    let s = tensor!(5.0);
    assert_eq!(s, Ten64::scalar(5.0));
}

#[test]
fn test_try_new_reports_length() {
    assert_eq!(
        Ten64::try_new(vec![2, 3], vec![0.0; 5]),
        Err(ShapeError::DataLength {
            shape: vec![2, 3],
            len: 5
        })
    );
}

#[test]
fn test_scalars_and_conversions() {
    let s = Ten64::from(3.5);
    assert!(s.shape.is_empty());
    assert_eq!(s.item(), Some(3.5));

    let v = Ten64::from([1.0, 2.0, 3.0]);
    assert_eq!(v.shape, vec![3]);
    assert_eq!(v.item(), None);
    assert_eq!(Ten64::from(&[1.0, 2.0][..]).shape, vec![2]);
}

#[test]
fn test_broadcasting_rules() {
    let col = tensor!([[1.0], [2.0]]);
    let row = Ten64::from(vec![10.0, 20.0, 30.0]);
    let grid = col.add(&row).unwrap();

    assert_eq!(grid.shape, vec![2, 3]);
    assert_eq!(grid.data, vec![11.0, 21.0, 31.0, 12.0, 22.0, 32.0]);

    let bad = Ten64::from(vec![1.0, 2.0]);
    assert!(matches!(row.mul(&bad), Err(ShapeError::Broadcast { .. })));
}

#[test]
fn test_sum_to_reverses_broadcast() {
    let grid = Ten64::ones(&[2, 3]);

    assert_eq!(grid.sum_to(&[3]).unwrap().data, vec![2.0, 2.0, 2.0]);
    assert_eq!(grid.sum_to(&[2, 1]).unwrap().data, vec![3.0, 3.0]);
    assert_eq!(grid.sum_to(&[]).unwrap(), Ten64::scalar(6.0));
    assert!(matches!(grid.sum_to(&[4]), Err(ShapeError::Reduce { .. })));
}

#[test]
fn test_matmul_shapes() {
    let a = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = Tensor::new(vec![3, 2], vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
    let out = a.matmul(&b).unwrap();

    assert_eq!(out.shape, vec![2, 2]);
    assert_eq!(out.data, vec![58.0, 64.0, 139.0, 154.0]);

    assert!(matches!(a.matmul(&a), Err(ShapeError::InnerDimension { .. })));
    assert!(matches!(
        Ten64::zeros(&[2, 2, 2]).matmul(&a),
        Err(ShapeError::Rank { .. })
    ));
}

#[test]
fn test_dot_with_scalar_scales() {
    let v = Ten64::from(vec![1.0, 2.0]);
    assert_eq!(Ten64::scalar(2.0).dot(&v).unwrap().data, vec![2.0, 4.0]);
    assert_eq!(v.dot(&v).unwrap(), Ten64::scalar(5.0));
}

#[test]
fn test_transpose_and_reshape() {
    let m = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let t = m.transpose().unwrap();

    assert_eq!(t.shape, vec![3, 2]);
    assert_eq!(t.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    assert_eq!(m.reshape(vec![6]).unwrap().shape, vec![6]);
    assert!(matches!(m.reshape(vec![4]), Err(ShapeError::Reshape { .. })));
}

#[test]
fn test_elementwise_maps() {
    let v = Ten64::from(vec![0.0, 1.0]);
    let e = v.exp();
    assert_eq!(e.data[0], 1.0);
    assert!((e.data[1] - std::f64::consts::E).abs() < 1e-15);
    assert_eq!(v.powf(2.0).data, vec![0.0, 1.0]);
    assert_eq!(v.scale(3.0).data, vec![0.0, 3.0]);
    assert_eq!(v.sum(), Ten64::scalar(1.0));
    assert_eq!(v.zeros_like(), Ten64::zeros(&[2]));
}
